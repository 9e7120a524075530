//! Main visualization plugin that ties all systems together.

use bevy::app::AppExit;
use bevy::prelude::*;
use bevy::render::renderer::RenderAdapterInfo;
use bevy::window::WindowResized;

use crate::camera::CameraPlugin;
use crate::config::VizConfig;
use crate::context::{Lifecycle, VisualizationContext};
use crate::controls::ControlsPlugin;
use crate::feed::{CommandOutbox, FeedPlugin};
use crate::hud::HudPlugin;
use crate::projection::LayoutMode;
use crate::scene::{flush_guide_queue, flush_scene_queue, LabelQueue, SceneQueue, ScenePlugin};
use crate::views::ViewKey;

/// The context as hosted by the Bevy app.
#[derive(Resource, Deref, DerefMut)]
pub struct VizContext(pub VisualizationContext<SceneQueue, LabelQueue>);

impl VizContext {
    pub fn new(config: VizConfig) -> Self {
        Self(VisualizationContext::new(
            config,
            SceneQueue::default(),
            LabelQueue::default(),
        ))
    }
}

/// Startup choices made on the command line.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct LaunchOptions {
    pub view: ViewKey,
    pub layout: LayoutMode,
    /// Population for the start command
    pub agents: u32,
    /// Rounds for the start command
    pub rounds: u32,
    /// Send a start command once the app is up
    pub auto_start: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            view: ViewKey::default(),
            layout: LayoutMode::default(),
            agents: 100,
            rounds: 50,
            auto_start: false,
        }
    }
}

/// Main plugin for the social-mobility visualizer.
///
/// Sets up the window, builds the visualization context from the
/// configuration and adds all sub-plugins.
pub struct MobilityVizPlugin {
    pub config: VizConfig,
    pub launch: LaunchOptions,
}

impl Plugin for MobilityVizPlugin {
    fn build(&self, app: &mut App) {
        let mut ctx = VizContext::new(self.config.clone());
        ctx.set_active_view(self.launch.view);
        ctx.set_layout_mode(self.launch.layout);

        app.add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: self.config.window.title.clone(),
                resolution: (self.config.window.width, self.config.window.height).into(),
                ..default()
            }),
            ..default()
        }))
        .insert_resource(ctx)
        .insert_resource(CommandOutbox::new(&self.config.feed))
        .insert_resource(self.launch.clone())
        .add_systems(PreStartup, init_context)
        .add_systems(Update, handle_window_resize)
        .add_systems(
            Last,
            (teardown_on_exit, flush_scene_queue, flush_guide_queue).chain(),
        )
        .add_plugins((CameraPlugin, FeedPlugin, ScenePlugin, HudPlugin, ControlsPlugin));
    }
}

/// System to start rendering once the renderer reports its adapter.
fn init_context(mut ctx: ResMut<VizContext>, adapter: Option<Res<RenderAdapterInfo>>) {
    let gpu_available = adapter.is_some();
    if let Some(adapter) = adapter {
        tracing::info!(adapter = %adapter.name, backend = ?adapter.backend, "GPU adapter found");
    }
    if ctx.init(gpu_available) == Lifecycle::Unavailable {
        tracing::error!("3D visualization unavailable");
    }
}

fn handle_window_resize(mut ctx: ResMut<VizContext>, mut resized: EventReader<WindowResized>) {
    for ev in resized.read() {
        ctx.resize(ev.width, ev.height);
    }
}

/// System to release every render object when the app exits.
fn teardown_on_exit(mut ctx: ResMut<VizContext>, mut exit: EventReader<AppExit>) {
    if exit.read().next().is_some() {
        ctx.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_defaults() {
        let launch = LaunchOptions::default();
        assert_eq!(launch.view, ViewKey::SelfKnowledge);
        assert_eq!(launch.layout, LayoutMode::Spiral);
        assert!(!launch.auto_start);
    }

    #[test]
    fn test_context_starts_created() {
        let ctx = VizContext::new(VizConfig::default());
        assert_eq!(ctx.lifecycle(), Lifecycle::Created);
        assert!(ctx.objects().is_empty());
    }
}
