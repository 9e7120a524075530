//! Status text and the selected-agent panel.

use bevy::prelude::*;
use bevy::window::{CursorIcon, PrimaryWindow};
use mobility_events::{StatsSnapshot, WealthClass};
use std::fmt::Write;

use crate::context::{Lifecycle, VisualizationContext};
use crate::feed::{ConnectionStatus, FeedState};
use crate::labels::GuideBackend;
use crate::narrative::{NarrativeState, PortraitState};
use crate::plugin::VizContext;
use crate::render_objects::RenderBackend;

/// Plugin for on-screen status text.
pub struct HudPlugin;

impl Plugin for HudPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_hud)
            .add_systems(Update, (update_status_text, update_agent_panel, update_cursor));
    }
}

/// Component for the status text.
#[derive(Component)]
pub struct StatusText;

/// Component for the selected-agent panel container.
#[derive(Component)]
pub struct AgentPanel;

/// Component for the selected-agent panel text.
#[derive(Component)]
pub struct AgentPanelText;

/// Builds the status block.
pub fn status_text<B: RenderBackend, G: GuideBackend>(
    ctx: &VisualizationContext<B, G>,
    feed: &FeedState,
) -> String {
    if ctx.lifecycle() == Lifecycle::Unavailable {
        return "3D visualization unavailable: no GPU adapter was found".to_string();
    }

    let view = ctx.active_view_config();
    let [x, y, z] = view.axes();
    let mut text = String::new();
    let _ = writeln!(text, "{}  [{}]", view.name, ctx.layout_mode().as_str());
    let _ = writeln!(text, "{}", view.question);
    let _ = writeln!(text, "X: {}  Y: {}  Z: {}", x.label, y.label, z.label);

    let connection = match &feed.connection {
        ConnectionStatus::Error(msg) => format!("error ({msg})"),
        other => other.label().to_string(),
    };
    let _ = writeln!(
        text,
        "Feed: {}  Simulation: {}  Round: {}",
        connection,
        feed.simulation.as_str(),
        feed.round()
    );
    let _ = write!(
        text,
        "Agents: {} alive / {} shown",
        ctx.agents().living_count(),
        ctx.objects().len()
    );

    // Fall back to the local population until the backend reports stats.
    let local;
    let stats = match &feed.stats {
        Some(stats) => Some(stats),
        None if !ctx.agents().agents.is_empty() => {
            local = StatsSnapshot::from_agents(feed.round(), &ctx.agents().agents);
            Some(&local)
        }
        None => None,
    };
    if let Some(stats) = stats {
        let _ = write!(text, "\n{}", class_stats_text(stats));
    }
    text
}

/// Per-class averages, one line per class.
pub fn class_stats_text(stats: &StatsSnapshot) -> String {
    let mut text = format!("Dropouts: {}", stats.dropouts);
    for class in WealthClass::ALL {
        let _ = write!(
            text,
            "\n{:<7} confidence {:>3.0}%  money ${:.0}",
            class.as_str(),
            stats.avg_confidence.get(class) * 100.0,
            stats.avg_money.get(class)
        );
    }
    text
}

fn narrative_line(state: &NarrativeState) -> String {
    match state {
        NarrativeState::Available(text) => text.clone(),
        NarrativeState::Failed(reason) => format!("Analysis failed: {reason}"),
        other => format!("Analysis: {}", other.summary()),
    }
}

fn portrait_line(state: &PortraitState) -> Option<String> {
    match state {
        PortraitState::NotRequested => None,
        PortraitState::Pending => Some("Portrait: generating…".into()),
        PortraitState::Available(url) => Some(format!("Portrait: {url}")),
        PortraitState::Failed(reason) => Some(format!("Portrait unavailable: {reason}")),
    }
}

/// Builds the selected-agent panel, or None without a selection.
pub fn agent_panel_text<B: RenderBackend, G: GuideBackend>(
    ctx: &VisualizationContext<B, G>,
    round: u32,
) -> Option<String> {
    let agent = ctx.selected_agent()?;
    let mut text = String::new();
    let _ = writeln!(text, "{} (#{})", agent.name, agent.id);
    let _ = writeln!(text, "{} class, age {:.0}", agent.class.as_str(), agent.age);
    let _ = writeln!(text, "Money: ${:.0}", agent.money_or_baseline());
    let _ = writeln!(
        text,
        "Talent {:.0}%  Confidence {:.0}%  Competence {:.0}%",
        agent.talent * 100.0,
        agent.confidence * 100.0,
        agent.competence * 100.0
    );
    let _ = writeln!(
        text,
        "Aspiration {:.0}%  Risk tolerance {:.0}%",
        agent.aspiration * 100.0,
        agent.risk_tolerance * 100.0
    );
    if let Some(task) = &agent.last_task {
        let outcome = if agent.succeeded_last_task { "succeeded" } else { "failed" };
        let _ = writeln!(text, "Last task: {task} ({outcome})");
    }

    let narrative = ctx.narrative();
    if narrative.is_unlocked(round) {
        let _ = write!(text, "{}", narrative_line(narrative.narrative()));
        if let Some(line) = portrait_line(narrative.portrait()) {
            let _ = write!(text, "\n{line}");
        }
    } else {
        let _ = write!(
            text,
            "Analysis unlocks at round {}",
            ctx.config().analysis.min_rounds
        );
    }
    Some(text)
}

fn setup_hud(mut commands: Commands) {
    commands.spawn((
        TextBundle::from_section(
            "",
            TextStyle {
                font_size: 16.0,
                color: Color::srgb(0.9, 0.9, 0.9),
                ..default()
            },
        )
        .with_style(Style {
            position_type: PositionType::Absolute,
            top: Val::Px(10.0),
            left: Val::Px(10.0),
            ..default()
        }),
        StatusText,
    ));

    commands
        .spawn((
            NodeBundle {
                style: Style {
                    position_type: PositionType::Absolute,
                    top: Val::Px(10.0),
                    right: Val::Px(10.0),
                    max_width: Val::Px(360.0),
                    padding: UiRect::all(Val::Px(10.0)),
                    ..default()
                },
                background_color: Color::srgba(0.0, 0.0, 0.0, 0.8).into(),
                visibility: Visibility::Hidden,
                ..default()
            },
            AgentPanel,
        ))
        .with_children(|parent| {
            parent.spawn((
                TextBundle::from_section(
                    "",
                    TextStyle {
                        font_size: 14.0,
                        color: Color::srgb(0.8, 0.8, 0.8),
                        ..default()
                    },
                ),
                AgentPanelText,
            ));
        });
}

fn update_status_text(
    ctx: Res<VizContext>,
    feed: Res<FeedState>,
    mut query: Query<&mut Text, With<StatusText>>,
) {
    let value = status_text(&ctx.0, &feed);
    for mut text in query.iter_mut() {
        text.sections[0].value.clone_from(&value);
    }
}

fn update_agent_panel(
    ctx: Res<VizContext>,
    feed: Res<FeedState>,
    mut panel: Query<&mut Visibility, With<AgentPanel>>,
    mut query: Query<&mut Text, With<AgentPanelText>>,
) {
    let value = agent_panel_text(&ctx.0, feed.round());
    for mut visibility in panel.iter_mut() {
        *visibility = if value.is_some() {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
    }
    if let Some(value) = value {
        for mut text in query.iter_mut() {
            text.sections[0].value.clone_from(&value);
        }
    }
}

/// System to show a pointer cursor over agents, a grabbing cursor while
/// dragging and an open grab cursor otherwise.
fn update_cursor(ctx: Res<VizContext>, mut windows: Query<&mut Window, With<PrimaryWindow>>) {
    let icon = if ctx.camera().is_dragging() {
        CursorIcon::Grabbing
    } else if ctx.hovering() {
        CursorIcon::Pointer
    } else {
        CursorIcon::Grab
    };
    for mut window in windows.iter_mut() {
        if window.cursor.icon != icon {
            window.cursor.icon = icon;
        }
    }
}
