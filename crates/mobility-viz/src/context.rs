//! Visualization context.
//!
//! One explicitly constructed object holds everything the frame loop reads:
//! the live agent set, active view and layout, render objects, guide layers,
//! camera, selection and narrative state. Host-facing changes are plain
//! method calls on this object; the frame loop calls [`VisualizationContext::tick`].

use bevy::math::{Vec2, Vec3};
use mobility_events::{AgentId, AgentSet, AgentSnapshot, NarrativeRequest};

use crate::camera::CameraController;
use crate::config::VizConfig;
use crate::labels::{GuideBackend, SceneLabelBuilder, SceneLayers};
use crate::narrative::{NarrativeError, NarrativeRequests};
use crate::picking::{pick_nearest, PickCamera};
use crate::projection::LayoutMode;
use crate::render_objects::{EntityRenderObjectManager, RenderBackend};
use crate::trajectory::{TrajectoryPlot, TrajectoryPlotRenderer};
use crate::views::{ViewConfig, ViewKey, ViewRegistry};

/// Lifecycle of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Constructed, `init` not called yet
    #[default]
    Created,
    /// Rendering
    Running,
    /// No GPU at startup; permanent
    Unavailable,
    /// Everything released
    TornDown,
}

/// What a pointer press did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOutcome {
    /// An agent was hit and selected; no drag starts
    Selected(AgentId),
    /// Background was hit; selection cleared and a drag started
    DragStarted,
    /// Context is not rendering
    Ignored,
}

/// Single mutable state object shared by the host and the frame loop.
pub struct VisualizationContext<B: RenderBackend, G: GuideBackend> {
    config: VizConfig,
    registry: ViewRegistry,
    active_view: ViewKey,
    layout: LayoutMode,
    agents: AgentSet,
    objects: EntityRenderObjectManager<B>,
    layers: SceneLayers<G>,
    label_builder: SceneLabelBuilder,
    camera: CameraController,
    narrative: NarrativeRequests,
    trajectory: TrajectoryPlotRenderer,
    lifecycle: Lifecycle,
    viewport: Vec2,
    pending_resize: Option<Vec2>,
    clock: f32,
    hovering: bool,
}

impl<B: RenderBackend, G: GuideBackend> VisualizationContext<B, G> {
    pub fn new(config: VizConfig, render_backend: B, guide_backend: G) -> Self {
        Self {
            registry: ViewRegistry::new(&config.views),
            active_view: ViewKey::default(),
            layout: LayoutMode::default(),
            agents: AgentSet::default(),
            objects: EntityRenderObjectManager::new(render_backend, config.motion, config.projection),
            layers: SceneLayers::new(guide_backend),
            label_builder: SceneLabelBuilder::new(config.projection),
            camera: CameraController::new(config.camera),
            narrative: NarrativeRequests::new(config.analysis.min_rounds),
            trajectory: TrajectoryPlotRenderer::default(),
            lifecycle: Lifecycle::Created,
            viewport: Vec2::new(config.window.width, config.window.height),
            pending_resize: None,
            clock: 0.0,
            hovering: false,
            config,
        }
    }

    /// Starts rendering, or enters the permanent unavailable state when no
    /// GPU is present. Calling it again has no effect.
    pub fn init(&mut self, gpu_available: bool) -> Lifecycle {
        if self.lifecycle != Lifecycle::Created {
            return self.lifecycle;
        }
        if !gpu_available {
            tracing::warn!("GPU rendering unavailable; visualization disabled");
            self.lifecycle = Lifecycle::Unavailable;
            return self.lifecycle;
        }

        self.lifecycle = Lifecycle::Running;
        self.rebuild_guides();
        self.reconcile_objects();
        tracing::info!(view = %self.active_view, layout = self.layout.as_str(), "Visualization initialized");
        self.lifecycle
    }

    /// Releases every render object and guide. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if self.lifecycle == Lifecycle::TornDown {
            return;
        }
        let objects = self.objects.dispose_all();
        let guides = self.layers.release();
        self.camera.pointer_up();
        self.hovering = false;
        self.lifecycle = Lifecycle::TornDown;
        tracing::info!(objects, guides, "Visualization torn down");
    }

    // Queries

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_available(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    pub fn config(&self) -> &VizConfig {
        &self.config
    }

    pub fn registry(&self) -> &ViewRegistry {
        &self.registry
    }

    pub fn active_view(&self) -> ViewKey {
        self.active_view
    }

    pub fn active_view_config(&self) -> &ViewConfig {
        self.registry.get(self.active_view)
    }

    pub fn layout_mode(&self) -> LayoutMode {
        self.layout
    }

    pub fn agents(&self) -> &AgentSet {
        &self.agents
    }

    pub fn objects(&self) -> &EntityRenderObjectManager<B> {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut EntityRenderObjectManager<B> {
        &mut self.objects
    }

    pub fn layers(&self) -> &SceneLayers<G> {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut SceneLayers<G> {
        &mut self.layers
    }

    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    pub fn narrative(&self) -> &NarrativeRequests {
        &self.narrative
    }

    pub fn narrative_mut(&mut self) -> &mut NarrativeRequests {
        &mut self.narrative
    }

    /// Current projected position of an agent's render object.
    pub fn position_of(&self, id: AgentId) -> Option<Vec3> {
        self.objects.position_of(id)
    }

    pub fn selection(&self) -> Option<AgentId> {
        self.objects.selected()
    }

    /// Latest snapshot of the selected agent.
    pub fn selected_agent(&self) -> Option<&AgentSnapshot> {
        self.selection().and_then(|id| self.agents.find(id))
    }

    pub fn camera_distance(&self) -> f32 {
        self.camera.distance()
    }

    /// Camera (theta, phi) in radians.
    pub fn camera_angles(&self) -> (f32, f32) {
        self.camera.angles(self.clock)
    }

    pub fn camera_eye(&self) -> Vec3 {
        self.camera.eye(self.clock)
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    /// Whether the pointer is over an agent.
    pub fn hovering(&self) -> bool {
        self.hovering
    }

    pub fn pick_camera(&self) -> PickCamera {
        PickCamera {
            eye: self.camera_eye(),
            target: Vec3::ZERO,
            fov_y: self.config.camera.fov_degrees.to_radians(),
            viewport: self.viewport,
        }
    }

    /// Agent under a pointer position, in pixels from the top-left corner.
    pub fn pick(&self, pointer: Vec2) -> Option<AgentId> {
        if !self.is_available() {
            return None;
        }
        let ray = self.pick_camera().ray(pointer)?;
        pick_nearest(
            &ray,
            self.objects
                .iter()
                .map(|(id, object)| (id, object.position, object.style.radius())),
        )
    }

    /// Chart geometry for the selected agent's history.
    pub fn trajectory_plot(&self) -> Option<TrajectoryPlot> {
        self.selected_agent()
            .map(|agent| self.trajectory.layout(&agent.history))
    }

    // Commands

    /// Replaces the live agent set in one step and reconciles against it.
    pub fn apply_agents(&mut self, agents: AgentSet) {
        self.agents = agents;
        if !self.is_available() {
            return;
        }
        self.reconcile_objects();
    }

    /// Drops every agent, object and selection, as on a simulation start or
    /// reset.
    pub fn clear_agents(&mut self) {
        self.agents = AgentSet::default();
        self.objects.clear();
        self.narrative.on_selection_changed(None);
    }

    pub fn set_active_view(&mut self, key: ViewKey) {
        if self.active_view == key {
            return;
        }
        self.active_view = key;
        tracing::info!(view = %key, "Active view changed");
        if !self.is_available() {
            return;
        }
        self.reconcile_objects();
        self.rebuild_guides();
    }

    pub fn set_layout_mode(&mut self, mode: LayoutMode) {
        if self.layout == mode {
            return;
        }
        self.layout = mode;
        tracing::info!(layout = mode.as_str(), "Layout mode changed");
        if !self.is_available() {
            return;
        }
        let view = self.registry.get(self.active_view);
        self.objects.retarget(&self.agents.agents, view, mode);
    }

    /// Reconciles against the active view. A selection whose object went
    /// away with it is cleared.
    fn reconcile_objects(&mut self) {
        let view = self.registry.get(self.active_view);
        self.objects.reconcile(&self.agents.agents, view, self.layout);
        if let Some(id) = self.selection() {
            if !self.objects.contains(id) {
                self.select(None);
            }
        }
    }

    pub fn select(&mut self, id: Option<AgentId>) {
        self.objects.set_selected(id);
        self.narrative.on_selection_changed(id);
    }

    pub fn set_auto_orbit(&mut self, enabled: bool) {
        self.camera.set_auto_orbit(enabled, self.clock);
    }

    /// Changes camera distance by raw world units.
    pub fn adjust_distance(&mut self, delta: f32) -> f32 {
        self.camera.adjust_distance(delta)
    }

    /// Applies a wheel delta in pixel units.
    pub fn wheel(&mut self, delta: f32) -> f32 {
        self.camera.wheel(delta)
    }

    /// Records a viewport size. Only the latest request before the next
    /// tick is applied.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.pending_resize = Some(Vec2::new(width.max(0.0), height.max(0.0)));
    }

    /// Builds a narrative request for the selected agent.
    pub fn request_narrative(&mut self, round: u32) -> Result<NarrativeRequest, NarrativeError> {
        let agent = self
            .selection()
            .and_then(|id| self.agents.find(id))
            .cloned()
            .ok_or(NarrativeError::NoSelection)?;
        self.narrative.request(&agent, round)
    }

    // Pointer

    pub fn pointer_down(&mut self, position: Vec2) -> PointerOutcome {
        if !self.is_available() {
            return PointerOutcome::Ignored;
        }
        if let Some(id) = self.pick(position) {
            self.select(Some(id));
            return PointerOutcome::Selected(id);
        }
        self.select(None);
        self.camera.pointer_down(position, self.clock);
        PointerOutcome::DragStarted
    }

    pub fn pointer_move(&mut self, position: Vec2) {
        if self.camera.pointer_move(position) {
            self.hovering = false;
            return;
        }
        self.hovering = self.pick(position).is_some();
    }

    pub fn pointer_up(&mut self) {
        self.camera.pointer_up();
    }

    // Frame loop

    /// Advances one frame. Returns the number of objects still moving.
    pub fn tick(&mut self, elapsed: f32) -> usize {
        self.clock = elapsed;
        if let Some(size) = self.pending_resize.take() {
            self.viewport = size;
            tracing::debug!(width = size.x, height = size.y, "Viewport resized");
        }
        if !self.is_available() {
            return 0;
        }
        self.objects.advance()
    }

    fn rebuild_guides(&mut self) {
        let guides = self.label_builder.build(self.registry.get(self.active_view));
        self.layers.rebuild(self.active_view, &guides);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{LabelQueue, SceneQueue};
    use mobility_events::WealthClass;

    type TestContext = VisualizationContext<SceneQueue, LabelQueue>;

    fn context() -> TestContext {
        let mut ctx = VisualizationContext::new(
            VizConfig::default(),
            SceneQueue::default(),
            LabelQueue::default(),
        );
        ctx.init(true);
        ctx
    }

    fn agent(id: AgentId, class: WealthClass, talent: f32, confidence: f32) -> AgentSnapshot {
        let mut a = AgentSnapshot::new(id, format!("agent {id}"), class);
        a.talent = talent;
        a.confidence = confidence;
        a
    }

    #[test]
    fn test_unavailable_context_renders_nothing() {
        let mut ctx = VisualizationContext::new(
            VizConfig::default(),
            SceneQueue::default(),
            LabelQueue::default(),
        );
        assert_eq!(ctx.init(false), Lifecycle::Unavailable);
        assert_eq!(ctx.init(true), Lifecycle::Unavailable);

        ctx.apply_agents(AgentSet::new(vec![agent(1, WealthClass::High, 0.8, 0.6)]));
        assert!(!ctx.is_available());
        assert!(ctx.objects().is_empty());
        assert_eq!(ctx.pointer_down(Vec2::new(10.0, 10.0)), PointerOutcome::Ignored);
        assert_eq!(ctx.agents().agents.len(), 1);
    }

    #[test]
    fn test_agents_applied_before_init_appear_on_init() {
        let mut ctx = VisualizationContext::new(
            VizConfig::default(),
            SceneQueue::default(),
            LabelQueue::default(),
        );
        ctx.apply_agents(AgentSet::new(vec![agent(1, WealthClass::High, 0.8, 0.6)]));
        assert!(ctx.objects().is_empty());
        ctx.init(true);
        assert!(ctx.position_of(1).is_some());
    }

    #[test]
    fn test_resize_is_coalesced_until_tick() {
        let mut ctx = context();
        ctx.resize(800.0, 600.0);
        ctx.resize(1024.0, 768.0);
        assert_eq!(ctx.viewport(), Vec2::new(1280.0, 720.0));
        ctx.tick(0.016);
        assert_eq!(ctx.viewport(), Vec2::new(1024.0, 768.0));
    }

    #[test]
    fn test_view_change_rebuilds_guides_once() {
        let mut ctx = context();
        assert_eq!(ctx.layers().view(), Some(ViewKey::SelfKnowledge));
        ctx.set_active_view(ViewKey::TaskFarming);
        assert_eq!(ctx.layers().view(), Some(ViewKey::TaskFarming));
        assert_eq!(ctx.layers().backend().live_count(), 1 + 18);
    }

    #[test]
    fn test_pointer_down_on_agent_selects_without_drag() {
        let mut ctx = context();
        ctx.apply_agents(AgentSet::new(vec![agent(1, WealthClass::Middle, 0.5, 0.0)]));
        ctx.set_auto_orbit(false);

        // Project the object center into the viewport.
        let center = ctx.position_of(1).unwrap();
        let pixel = project_to_pixel(&ctx.pick_camera(), center);

        assert_eq!(ctx.pointer_down(pixel), PointerOutcome::Selected(1));
        assert_eq!(ctx.selection(), Some(1));
        assert!(!ctx.camera().is_dragging());
    }

    #[test]
    fn test_pointer_down_on_background_clears_and_drags() {
        let mut ctx = context();
        ctx.apply_agents(AgentSet::new(vec![agent(1, WealthClass::Middle, 0.5, 0.0)]));
        ctx.select(Some(1));

        assert_eq!(ctx.pointer_down(Vec2::new(1.0, 1.0)), PointerOutcome::DragStarted);
        assert_eq!(ctx.selection(), None);
        assert!(ctx.camera().is_dragging());
        ctx.pointer_up();
        assert!(!ctx.camera().is_auto_orbiting());
    }

    #[test]
    fn test_teardown_releases_everything_once() {
        let mut ctx = context();
        ctx.apply_agents(AgentSet::new(vec![
            agent(1, WealthClass::Low, 0.2, 0.2),
            agent(2, WealthClass::High, 0.7, 0.9),
        ]));
        ctx.teardown();
        assert!(ctx.objects().is_empty());
        assert_eq!(ctx.objects().backend().live_count(), 0);
        assert_eq!(ctx.layers().backend().live_count(), 0);
        ctx.teardown();
        assert_eq!(ctx.lifecycle(), Lifecycle::TornDown);
    }

    #[test]
    fn test_clear_agents_drops_selection() {
        let mut ctx = context();
        ctx.apply_agents(AgentSet::new(vec![agent(1, WealthClass::Low, 0.2, 0.2)]));
        ctx.select(Some(1));
        ctx.clear_agents();
        assert!(ctx.objects().is_empty());
        assert_eq!(ctx.selection(), None);
        assert!(ctx.selected_agent().is_none());
    }

    #[test]
    fn test_selection_cleared_when_filtered_out() {
        let mut ctx = context();
        ctx.apply_agents(AgentSet::new(vec![
            agent(1, WealthClass::Low, 0.8, 0.2),
            agent(2, WealthClass::High, 0.5, 0.6),
        ]));
        ctx.select(Some(1));

        ctx.set_active_view(ViewKey::ClassEffect);
        assert_eq!(ctx.selection(), None);

        ctx.select(Some(2));
        let mut dead = agent(2, WealthClass::High, 0.5, 0.6);
        dead.alive = false;
        ctx.apply_agents(AgentSet::new(vec![dead]));
        assert_eq!(ctx.selection(), None);
        assert!(ctx.selected_agent().is_none());
    }

    #[test]
    fn test_request_narrative_needs_selection() {
        let mut ctx = context();
        assert_eq!(ctx.request_narrative(20), Err(NarrativeError::NoSelection));
        ctx.apply_agents(AgentSet::new(vec![agent(3, WealthClass::Low, 0.2, 0.2)]));
        ctx.select(Some(3));
        let request = ctx.request_narrative(20).unwrap();
        assert_eq!(request.agent_id, 3);
    }

    fn project_to_pixel(camera: &PickCamera, point: Vec3) -> Vec2 {
        let forward = (camera.target - camera.eye).normalize();
        let right = forward.cross(Vec3::Y).normalize();
        let up = right.cross(forward);
        let rel = point - camera.eye;
        let depth = rel.dot(forward);
        let tan_half = (camera.fov_y * 0.5).tan();
        let aspect = camera.viewport.x / camera.viewport.y;
        let ndc_x = rel.dot(right) / (depth * tan_half * aspect);
        let ndc_y = rel.dot(up) / (depth * tan_half);
        Vec2::new(
            (ndc_x + 1.0) * 0.5 * camera.viewport.x,
            (1.0 - ndc_y) * 0.5 * camera.viewport.y,
        )
    }
}
