//! Keyboard bindings.
//!
//! Keys map to [`ControlAction`]s; [`apply_action`] carries them out against
//! the context, the feed state and the command outbox.

use bevy::prelude::*;
use mobility_events::{AgentId, SimCommand};
use std::path::PathBuf;

use crate::context::VisualizationContext;
use crate::feed::{CommandOutbox, FeedState, SimulationStatus};
use crate::labels::GuideBackend;
use crate::plugin::{LaunchOptions, VizContext};
use crate::render_objects::RenderBackend;
use crate::trajectory::write_svg;
use crate::views::ViewKey;

/// Plugin for keyboard controls.
pub struct ControlsPlugin;

impl Plugin for ControlsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, auto_start)
            .add_systems(Update, handle_keys);
    }
}

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    SelectView(ViewKey),
    ToggleLayout,
    ToggleAutoOrbit,
    Start,
    TogglePause,
    Reset,
    ExportTrajectory,
    RequestNarrative,
    ClearSelection,
}

/// Binding for a key, if any.
pub fn action_for_key(key: KeyCode) -> Option<ControlAction> {
    let action = match key {
        KeyCode::Digit1 => ControlAction::SelectView(ViewKey::SelfKnowledge),
        KeyCode::Digit2 => ControlAction::SelectView(ViewKey::AspirationOutcomes),
        KeyCode::Digit3 => ControlAction::SelectView(ViewKey::RiskBehavior),
        KeyCode::Digit4 => ControlAction::SelectView(ViewKey::IdentityHardening),
        KeyCode::Digit5 => ControlAction::SelectView(ViewKey::TaskFarming),
        KeyCode::Digit6 => ControlAction::SelectView(ViewKey::ClassEffect),
        KeyCode::KeyL => ControlAction::ToggleLayout,
        KeyCode::KeyO => ControlAction::ToggleAutoOrbit,
        KeyCode::KeyS => ControlAction::Start,
        KeyCode::KeyP => ControlAction::TogglePause,
        KeyCode::KeyR => ControlAction::Reset,
        KeyCode::KeyT => ControlAction::ExportTrajectory,
        KeyCode::KeyA => ControlAction::RequestNarrative,
        KeyCode::Escape => ControlAction::ClearSelection,
        _ => return None,
    };
    Some(action)
}

/// Export location for an agent's trajectory chart.
pub fn trajectory_export_path(exports_dir: &std::path::Path, agent: AgentId) -> PathBuf {
    exports_dir.join(format!("agent_{agent:04}_trajectory.svg"))
}

fn send(outbox: &CommandOutbox, feed: &mut FeedState, command: SimCommand) {
    match outbox.send(&command) {
        Ok(()) => feed.simulation.apply_command(&command),
        Err(e) => tracing::error!("Failed to send {} command: {}", command.name(), e),
    }
}

/// Carries out one control action.
pub fn apply_action<B: RenderBackend, G: GuideBackend>(
    action: ControlAction,
    ctx: &mut VisualizationContext<B, G>,
    feed: &mut FeedState,
    outbox: &CommandOutbox,
    launch: &LaunchOptions,
) {
    match action {
        ControlAction::SelectView(key) => ctx.set_active_view(key),
        ControlAction::ToggleLayout => ctx.set_layout_mode(ctx.layout_mode().toggled()),
        ControlAction::ToggleAutoOrbit => {
            let enabled = !ctx.camera().is_auto_orbiting();
            ctx.set_auto_orbit(enabled);
        }
        ControlAction::Start => {
            send(outbox, feed, SimCommand::start(launch.agents, launch.rounds));
        }
        ControlAction::TogglePause => match feed.simulation {
            SimulationStatus::Running => send(outbox, feed, SimCommand::Pause),
            SimulationStatus::Paused => send(outbox, feed, SimCommand::Unpause),
            other => tracing::info!(status = other.as_str(), "Nothing to pause"),
        },
        ControlAction::Reset => send(outbox, feed, SimCommand::Reset),
        ControlAction::ExportTrajectory => {
            let Some(agent) = ctx.selection() else {
                tracing::info!("Select an agent to export its trajectory");
                return;
            };
            let Some(plot) = ctx.trajectory_plot() else {
                return;
            };
            let path = trajectory_export_path(&ctx.config().feed.exports_path(), agent);
            match write_svg(&plot, &path) {
                Ok(()) => tracing::info!("Exported trajectory to {:?}", path),
                Err(e) => tracing::warn!(agent, "Trajectory export failed: {}", e),
            }
        }
        ControlAction::RequestNarrative => match ctx.request_narrative(feed.round()) {
            Ok(request) => {
                if let Err(e) = outbox.request_narrative(&request) {
                    tracing::error!("Failed to send narrative request: {}", e);
                    ctx.narrative_mut().fail(e.to_string());
                }
            }
            Err(e) => tracing::info!("Narrative request refused: {}", e),
        },
        ControlAction::ClearSelection => ctx.select(None),
    }
}

/// System to route key presses into control actions.
fn handle_keys(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut ctx: ResMut<VizContext>,
    mut feed: ResMut<FeedState>,
    outbox: Res<CommandOutbox>,
    launch: Res<LaunchOptions>,
) {
    for key in keyboard.get_just_pressed() {
        if let Some(action) = action_for_key(*key) {
            apply_action(action, &mut ctx.0, &mut feed, &outbox, &launch);
        }
    }
}

/// System to send the start command when launched with auto-start.
fn auto_start(
    mut ctx: ResMut<VizContext>,
    mut feed: ResMut<FeedState>,
    outbox: Res<CommandOutbox>,
    launch: Res<LaunchOptions>,
) {
    if launch.auto_start {
        apply_action(ControlAction::Start, &mut ctx.0, &mut feed, &outbox, &launch);
    }
}
