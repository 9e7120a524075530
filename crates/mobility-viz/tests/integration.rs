//! Integration tests for the visualization core and the file-backed feed.

use bevy::math::{Vec2, Vec3};
use mobility_events::fixtures;
use mobility_events::{AgentSet, SimCommand, TransportMessage};
use mobility_viz::config::FeedConfig;
use mobility_viz::feed::{
    apply_update, load_all, read_feed_file, CommandOutbox, ConnectionStatus, FeedFile, FeedState,
    FeedUpdate, SimulationStatus,
};
use mobility_viz::projection::scatter_jitter;
use mobility_viz::scene::{LabelQueue, SceneQueue};
use mobility_viz::trajectory::{write_svg, ExportError, TrajectoryPlot};
use mobility_viz::{LayoutMode, ViewKey, VisualizationContext, VizConfig};
use std::path::Path;

type Context = VisualizationContext<SceneQueue, LabelQueue>;

fn running_context(config: VizConfig) -> Context {
    let mut ctx = VisualizationContext::new(config, SceneQueue::default(), LabelQueue::default());
    ctx.init(true);
    ctx
}

fn sample_context() -> Context {
    let mut ctx = running_context(VizConfig::default());
    ctx.apply_agents(AgentSet::new(fixtures::sample_agents()));
    ctx
}

fn assert_near(actual: Vec3, expected: Vec3) {
    assert!(
        actual.distance(expected) < 1e-3,
        "expected {expected:?}, got {actual:?}"
    );
}

/// Every visible agent has exactly one render object and nothing else does.
fn assert_reconciled(ctx: &Context) {
    let view = ctx.active_view_config();
    let visible: Vec<_> = ctx
        .agents()
        .agents
        .iter()
        .filter(|a| view.is_visible(a))
        .map(|a| a.id)
        .collect();
    assert_eq!(ctx.objects().len(), visible.len());
    for id in visible {
        assert!(ctx.objects().contains(id), "agent {id} has no render object");
    }
    assert_eq!(ctx.objects().backend().live_count(), ctx.objects().len());
}

#[test]
fn test_sample_population_reconciles() {
    let ctx = sample_context();
    assert_reconciled(&ctx);
    assert_eq!(ctx.objects().len(), 7);
    assert!(!ctx.objects().contains(4));
}

#[test]
fn test_self_knowledge_projection_of_high_class_agent() {
    let ctx = sample_context();
    assert_near(ctx.position_of(1).unwrap(), Vec3::new(30.0, 24.0, 30.0));
}

#[test]
fn test_dead_agent_removed_once() {
    let mut ctx = sample_context();
    let mut agents = fixtures::sample_agents();
    agents.iter_mut().find(|a| a.id == 1).unwrap().alive = false;

    ctx.apply_agents(AgentSet::new(agents.clone()));
    assert!(!ctx.objects().contains(1));
    let live = ctx.objects().backend().live_count();

    ctx.apply_agents(AgentSet::new(agents));
    assert_eq!(ctx.objects().backend().live_count(), live);
    assert_reconciled(&ctx);
}

#[test]
fn test_view_switch_keeps_object_and_animates() {
    let mut ctx = sample_context();
    let handle = ctx.objects().get(1).unwrap().handle;

    ctx.set_active_view(ViewKey::RiskBehavior);
    let object = ctx.objects().get(1).unwrap();
    assert_eq!(object.handle, handle);
    assert_near(object.position, Vec3::new(30.0, 24.0, 30.0));
    assert_near(object.target, Vec3::new(12.0, 25.4, -25.0));

    ctx.tick(0.016);
    let first_step = ctx.position_of(1).unwrap();
    assert!(first_step.distance(Vec3::new(30.0, 24.0, 30.0)) > 0.0);
    assert!(first_step.distance(Vec3::new(12.0, 25.4, -25.0)) > 1.0);

    let mut frames = 1;
    while ctx.tick(0.016 * frames as f32) > 0 {
        frames += 1;
        assert!(frames < 1000, "object never settled");
    }
    assert_near(ctx.position_of(1).unwrap(), Vec3::new(12.0, 25.4, -25.0));
    assert_eq!(ctx.objects().get(1).unwrap().handle, handle);
}

#[test]
fn test_filtered_view_hides_out_of_band_agents() {
    let mut ctx = sample_context();
    ctx.set_active_view(ViewKey::ClassEffect);
    assert_reconciled(&ctx);
    let mut ids: Vec<_> = ctx.objects().iter().map(|(id, _)| id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![3, 5]);
}

#[test]
fn test_wheel_zoom_clamps() {
    let mut ctx = sample_context();
    assert_eq!(ctx.camera_distance(), 120.0);
    assert_eq!(ctx.wheel(500.0), 170.0);
    assert_eq!(ctx.wheel(5000.0), 250.0);
    assert_eq!(ctx.wheel(-5000.0), 40.0);
}

#[test]
fn test_scatter_jitter_is_stable_for_agent_seven() {
    let mut ctx = sample_context();
    let spiral = ctx.position_of(7).unwrap();

    ctx.set_layout_mode(LayoutMode::Scatter);
    while ctx.tick(0.0) > 0 {}
    let scattered = ctx.position_of(7).unwrap();

    let jitter = scatter_jitter(7, 3.0);
    assert_eq!(jitter, scatter_jitter(7, 3.0));
    assert_near(scattered - spiral, Vec3::new(jitter.x, 0.0, jitter.y));
    assert!((jitter.x - -0.21).abs() < 1e-4);
    assert!((jitter.y - 0.39).abs() < 1e-4);
}

#[test]
fn test_click_on_background_clears_selection() {
    let mut ctx = sample_context();
    ctx.select(Some(1));
    ctx.pointer_down(Vec2::new(2.0, 2.0));
    assert_eq!(ctx.selection(), None);
}

#[test]
fn test_trajectory_for_agent_without_history() {
    let mut ctx = sample_context();
    ctx.select(Some(3));
    assert_eq!(ctx.trajectory_plot(), Some(TrajectoryPlot::NoData));

    ctx.select(Some(2));
    assert!(!ctx.trajectory_plot().unwrap().is_empty());
}

#[test]
fn test_export_trajectory_svg() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = sample_context();
    ctx.select(Some(1));
    let plot = ctx.trajectory_plot().unwrap();

    let path = dir.path().join("exports/agent_1.svg");
    write_svg(&plot, &path).unwrap();
    let svg = std::fs::read_to_string(&path).unwrap();
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains("Confidence"));

    let err = write_svg(&TrajectoryPlot::NoData, &dir.path().join("none.svg")).unwrap_err();
    assert!(matches!(err, ExportError::NoData));
    assert!(!dir.path().join("none.svg").exists());
}

fn feed_config(dir: &Path) -> FeedConfig {
    FeedConfig {
        dir: dir.to_path_buf(),
        ..FeedConfig::default()
    }
}

#[test]
fn test_feed_loads_agents_and_stats() {
    let dir = tempfile::tempdir().unwrap();
    let config = feed_config(dir.path());
    std::fs::write(
        config.agents_path(),
        include_str!("../../mobility-events/tests/fixtures/sample_agents.json"),
    )
    .unwrap();
    std::fs::write(
        config.stats_path(),
        r#"{"type": "stats_update", "stats": {"round": 12, "alive": 7}}"#,
    )
    .unwrap();

    let mut ctx = running_context(VizConfig::default());
    let mut state = FeedState::default();
    assert_eq!(load_all(&config, &mut ctx, &mut state), 2);
    assert_eq!(state.connection, ConnectionStatus::Connected);
    assert_eq!(state.round(), 12);
    assert_eq!(ctx.objects().len(), 7);
}

#[test]
fn test_feed_parse_error_keeps_objects() {
    let dir = tempfile::tempdir().unwrap();
    let config = feed_config(dir.path());
    let mut ctx = sample_context();
    let mut state = FeedState::default();

    std::fs::write(config.agents_path(), "{ not json").unwrap();
    assert_eq!(load_all(&config, &mut ctx, &mut state), 0);
    assert!(matches!(state.connection, ConnectionStatus::Error(_)));
    assert_eq!(ctx.objects().len(), 7);
}

#[test]
fn test_feed_tolerates_null_attributes() {
    let dir = tempfile::tempdir().unwrap();
    let config = feed_config(dir.path());
    std::fs::write(
        config.agents_path(),
        r#"[{"id": 1, "alive": true, "class": "High", "confidence": 1.06},
            {"id": 2, "alive": true, "class": "Low", "failure_rate": null}]"#,
    )
    .unwrap();

    let mut ctx = running_context(VizConfig::default());
    let mut state = FeedState::default();
    assert_eq!(load_all(&config, &mut ctx, &mut state), 1);
    assert_eq!(state.connection, ConnectionStatus::Connected);
    assert_eq!(ctx.objects().len(), 2);

    // Confidence above one still lands on the top of the y span.
    assert!((ctx.position_of(1).unwrap().y - 38.0).abs() < 1e-3);
}

#[test]
fn test_status_file_start_clears_agents() {
    let dir = tempfile::tempdir().unwrap();
    let config = feed_config(dir.path());
    std::fs::write(config.status_path(), r#"{"type": "simulation_started"}"#).unwrap();

    let update = read_feed_file(FeedFile::Status, &config.status_path()).unwrap();
    assert_eq!(
        update,
        FeedUpdate::Lifecycle(TransportMessage::SimulationStarted)
    );

    let mut ctx = sample_context();
    let mut state = FeedState::default();
    ctx.select(Some(1));
    apply_update(update, &mut ctx, &mut state);
    assert!(ctx.objects().is_empty());
    assert_eq!(ctx.selection(), None);
    assert_eq!(state.simulation, SimulationStatus::Running);
}

#[test]
fn test_narrative_response_resolves_pending_request() {
    let dir = tempfile::tempdir().unwrap();
    let config = feed_config(dir.path());
    let outbox = CommandOutbox::new(&config);
    let mut ctx = sample_context();
    ctx.select(Some(1));

    let request = ctx.request_narrative(12).unwrap();
    outbox.request_narrative(&request).unwrap();
    let written = std::fs::read_to_string(config.narrative_request_path()).unwrap();
    assert!(written.contains("\"agent_id\": 1"));

    std::fs::write(
        config.narrative_path(),
        r#"{"agent_id": 1, "analysis": "Rose steadily.", "portrait_error": "quota"}"#,
    )
    .unwrap();
    let mut state = FeedState::default();
    load_all(&config, &mut ctx, &mut state);
    assert_eq!(
        ctx.narrative().narrative(),
        &mobility_viz::narrative::NarrativeState::Available("Rose steadily.".into())
    );
}

#[test]
fn test_outbox_appends_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let config = feed_config(&dir.path().join("feed"));
    let outbox = CommandOutbox::new(&config);

    outbox.send(&SimCommand::start(100, 50)).unwrap();
    outbox.send(&SimCommand::Pause).unwrap();

    let contents = std::fs::read_to_string(outbox.commands_path()).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        r#"{"command":"start","params":{"num_agents":100,"num_rounds":50}}"#
    );
    assert_eq!(lines[1], r#"{"command":"pause"}"#);
}

#[test]
fn test_config_file_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("viz.toml");
    std::fs::write(
        &path,
        r#"
        [camera]
        initial_distance = 200.0

        [analysis]
        min_rounds = 3
        "#,
    )
    .unwrap();

    let config = VizConfig::from_file(&path).unwrap();
    let mut ctx = running_context(config);
    assert_eq!(ctx.camera_distance(), 200.0);

    ctx.apply_agents(AgentSet::new(fixtures::sample_agents()));
    ctx.select(Some(2));
    assert!(ctx.request_narrative(3).is_ok());
}
