//! Render-object lifecycle.
//!
//! [`EntityRenderObjectManager`] owns the map from agent id to render object
//! and is the only code that asks a [`RenderBackend`] to create or dispose
//! anything. Positions follow their targets by exponential damping; only
//! freshly created objects are placed without animation.

use bevy::color::{Color, LinearRgba};
use bevy::math::Vec3;
use mobility_events::{AgentId, AgentSnapshot, WealthClass};
use std::collections::HashMap;

use crate::config::{MotionConfig, ProjectionParams};
use crate::projection::{project, LayoutMode};
use crate::views::ViewConfig;

/// Sphere radius before scaling.
pub const BASE_RADIUS: f32 = 2.0;
/// Largest uniform scale a wealthy agent reaches.
pub const MAX_SCALE: f32 = 2.5;
/// Money per additional unit of scale.
pub const MONEY_PER_SCALE: f32 = 250.0;
pub const SELECTED_OPACITY: f32 = 1.0;
pub const DEFAULT_OPACITY: f32 = 0.85;
pub const SELECTED_EMISSIVE: f32 = 1.2;

/// Base color of a wealth class.
pub fn class_color(class: WealthClass) -> Color {
    match class {
        WealthClass::High => Color::srgb_u8(0x44, 0x44, 0xff),
        WealthClass::Middle => Color::srgb_u8(0x44, 0xff, 0x44),
        WealthClass::Low => Color::srgb_u8(0xff, 0x44, 0x44),
    }
}

/// Visual encoding of one agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStyle {
    pub color: Color,
    pub scale: f32,
    pub selected: bool,
}

impl RenderStyle {
    pub fn for_agent(agent: &AgentSnapshot, selected: bool) -> Self {
        let scale = (1.0 + agent.money_or_baseline() / MONEY_PER_SCALE).clamp(0.0, MAX_SCALE);
        Self {
            color: class_color(agent.class),
            scale,
            selected,
        }
    }

    pub fn opacity(&self) -> f32 {
        if self.selected {
            SELECTED_OPACITY
        } else {
            DEFAULT_OPACITY
        }
    }

    pub fn emissive(&self) -> LinearRgba {
        if self.selected {
            LinearRgba::rgb(SELECTED_EMISSIVE, SELECTED_EMISSIVE, SELECTED_EMISSIVE)
        } else {
            LinearRgba::BLACK
        }
    }

    /// Radius used for picking.
    pub fn radius(&self) -> f32 {
        BASE_RADIUS * self.scale
    }
}

/// Backend that owns the actual GPU-side objects.
pub trait RenderBackend {
    type Handle;

    fn create(&mut self, id: AgentId, position: Vec3, style: &RenderStyle) -> Self::Handle;
    fn set_position(&mut self, handle: &Self::Handle, position: Vec3);
    fn set_style(&mut self, handle: &Self::Handle, style: &RenderStyle);
    fn dispose(&mut self, handle: Self::Handle);
}

/// The persistent visual representation of one visible agent.
#[derive(Debug)]
pub struct RenderObject<H> {
    pub handle: H,
    pub position: Vec3,
    pub target: Vec3,
    pub style: RenderStyle,
    /// Semantic axis values last applied to `target`
    applied: [f32; 3],
}

impl<H> RenderObject<H> {
    pub fn applied_values(&self) -> [f32; 3] {
        self.applied
    }

    pub fn is_settled(&self, settle_distance: f32) -> bool {
        self.position.distance(self.target) <= settle_distance
    }
}

/// Counts from one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub created: usize,
    pub removed: usize,
    pub retargeted: usize,
}

/// Owns every render object and its backend resources.
pub struct EntityRenderObjectManager<B: RenderBackend> {
    backend: B,
    objects: HashMap<AgentId, RenderObject<B::Handle>>,
    selected: Option<AgentId>,
    motion: MotionConfig,
    params: ProjectionParams,
}

impl<B: RenderBackend> EntityRenderObjectManager<B> {
    pub fn new(backend: B, motion: MotionConfig, params: ProjectionParams) -> Self {
        Self {
            backend,
            objects: HashMap::new(),
            selected: None,
            motion,
            params,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn get(&self, id: AgentId) -> Option<&RenderObject<B::Handle>> {
        self.objects.get(&id)
    }

    pub fn position_of(&self, id: AgentId) -> Option<Vec3> {
        self.objects.get(&id).map(|o| o.position)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &RenderObject<B::Handle>)> {
        self.objects.iter().map(|(id, o)| (*id, o))
    }

    pub fn selected(&self) -> Option<AgentId> {
        self.selected
    }

    /// Applies a full replacement of the agent set.
    pub fn reconcile(
        &mut self,
        agents: &[AgentSnapshot],
        view: &ViewConfig,
        mode: LayoutMode,
    ) -> ReconcileSummary {
        self.sync(agents, view, mode, false)
    }

    /// Reconciles and forces every axis to be retargeted, even when its
    /// semantic value is unchanged. Used after a layout-mode change.
    pub fn retarget(
        &mut self,
        agents: &[AgentSnapshot],
        view: &ViewConfig,
        mode: LayoutMode,
    ) -> ReconcileSummary {
        self.sync(agents, view, mode, true)
    }

    fn sync(
        &mut self,
        agents: &[AgentSnapshot],
        view: &ViewConfig,
        mode: LayoutMode,
        force: bool,
    ) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        let mut visible: HashMap<AgentId, &AgentSnapshot> = HashMap::with_capacity(agents.len());
        for agent in agents.iter().filter(|a| view.is_visible(a)) {
            visible.entry(agent.id).or_insert(agent);
        }

        let stale: Vec<AgentId> = self
            .objects
            .keys()
            .filter(|id| !visible.contains_key(id))
            .copied()
            .collect();
        for id in stale {
            if self.remove(id) {
                summary.removed += 1;
            }
        }

        for (&id, agent) in &visible {
            let values = view.sample(agent);
            let point = project(agent, view, mode, &self.params);
            let style = RenderStyle::for_agent(agent, self.selected == Some(id));

            match self.objects.get_mut(&id) {
                Some(object) => {
                    let mut changed = false;
                    for axis in 0..3 {
                        let moved = (values[axis] - object.applied[axis]).abs() > self.motion.epsilon;
                        if force || moved {
                            object.target[axis] = point[axis];
                            object.applied[axis] = values[axis];
                            changed = true;
                        }
                    }
                    if changed {
                        summary.retargeted += 1;
                    }
                    if object.style != style {
                        object.style = style;
                        self.backend.set_style(&object.handle, &style);
                    }
                }
                None => {
                    let handle = self.backend.create(id, point, &style);
                    self.objects.insert(
                        id,
                        RenderObject {
                            handle,
                            position: point,
                            target: point,
                            style,
                            applied: values,
                        },
                    );
                    summary.created += 1;
                }
            }
        }

        tracing::debug!(
            created = summary.created,
            removed = summary.removed,
            retargeted = summary.retargeted,
            live = self.objects.len(),
            "Reconciled render objects"
        );
        summary
    }

    /// Moves every object one damping step toward its target.
    ///
    /// Returns the number of objects still in motion.
    pub fn advance(&mut self) -> usize {
        let mut moving = 0;
        for object in self.objects.values_mut() {
            let remaining = object.target - object.position;
            if remaining == Vec3::ZERO {
                continue;
            }
            if remaining.length() <= self.motion.settle_distance {
                object.position = object.target;
            } else {
                object.position += remaining * self.motion.damping;
                moving += 1;
            }
            self.backend.set_position(&object.handle, object.position);
        }
        moving
    }

    /// Changes the highlighted agent, restyling the previous and new one.
    pub fn set_selected(&mut self, id: Option<AgentId>) {
        if self.selected == id {
            return;
        }
        let previous = std::mem::replace(&mut self.selected, id);
        for (target, selected) in [(previous, false), (id, true)] {
            let Some(object) = target.and_then(|t| self.objects.get_mut(&t)) else {
                continue;
            };
            object.style.selected = selected;
            self.backend.set_style(&object.handle, &object.style);
        }
    }

    /// Disposes one object. Unknown ids are ignored.
    pub fn remove(&mut self, id: AgentId) -> bool {
        match self.objects.remove(&id) {
            Some(object) => {
                self.backend.dispose(object.handle);
                true
            }
            None => false,
        }
    }

    /// Disposes every tracked object and returns how many there were.
    pub fn dispose_all(&mut self) -> usize {
        let count = self.objects.len();
        for (_, object) in self.objects.drain() {
            self.backend.dispose(object.handle);
        }
        count
    }

    /// Drops every object and the selection, as on a simulation start or reset.
    pub fn clear(&mut self) {
        let disposed = self.dispose_all();
        self.selected = None;
        tracing::debug!(disposed, "Cleared render objects");
    }
}
