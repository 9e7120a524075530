//! File-backed transport feed.
//!
//! The simulation backend writes its latest messages into a feed directory:
//! `agents.json`, `stats.json`, a lifecycle `status.json` and, when the
//! narrative service answers, `narrative.json`. The directory is watched with
//! `notify`; each change is re-read and applied as one replacement. Commands
//! flow the other way as JSON lines appended to `commands.jsonl`.

use bevy::prelude::*;
use mobility_events::{
    AgentSet, NarrativeRequest, NarrativeResponse, SimCommand, StatsSnapshot, TransportMessage,
};
use notify::{Event as NotifyEvent, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::Instant;

use crate::config::FeedConfig;
use crate::context::VisualizationContext;
use crate::labels::GuideBackend;
use crate::plugin::VizContext;
use crate::render_objects::RenderBackend;

/// Plugin for watching the feed directory.
pub struct FeedPlugin;

impl Plugin for FeedPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FeedState>()
            .add_systems(Update, (check_feed_updates, handle_reload_key).chain());
    }
}

/// Errors reading or writing feed files.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl FeedError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        FeedError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn json(path: &Path, source: serde_json::Error) -> Self {
        FeedError::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Connection to the feed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
    Error(String),
}

impl ConnectionStatus {
    pub fn label(&self) -> &str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error(_) => "error",
        }
    }
}

/// Simulation lifecycle as last reported or commanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulationStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Complete,
}

impl SimulationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationStatus::Idle => "idle",
            SimulationStatus::Running => "running",
            SimulationStatus::Paused => "paused",
            SimulationStatus::Complete => "complete",
        }
    }

    /// Moves to the state a lifecycle message reports.
    pub fn apply_message(&mut self, message: &TransportMessage) {
        *self = match message {
            TransportMessage::SimulationStarted | TransportMessage::SimulationUnpaused => {
                SimulationStatus::Running
            }
            TransportMessage::SimulationPaused => SimulationStatus::Paused,
            TransportMessage::SimulationReset => SimulationStatus::Idle,
            TransportMessage::SimulationComplete => SimulationStatus::Complete,
            TransportMessage::AgentUpdate { .. } | TransportMessage::StatsUpdate { .. } => {
                return
            }
        };
    }

    /// Optimistic transition after sending a command.
    pub fn apply_command(&mut self, command: &SimCommand) {
        *self = match command {
            SimCommand::Start(_) | SimCommand::Unpause => SimulationStatus::Running,
            SimCommand::Pause => SimulationStatus::Paused,
            SimCommand::Reset => SimulationStatus::Idle,
            SimCommand::GetState => return,
        };
    }
}

/// Which feed file a path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeedFile {
    Status,
    Agents,
    Stats,
    Narrative,
}

impl FeedFile {
    /// Files in the order an initial load applies them.
    pub const LOAD_ORDER: [FeedFile; 4] = [
        FeedFile::Status,
        FeedFile::Agents,
        FeedFile::Stats,
        FeedFile::Narrative,
    ];

    /// Recognizes a feed file by name.
    pub fn classify(path: &Path, config: &FeedConfig) -> Option<FeedFile> {
        let name = path.file_name()?.to_str()?;
        if name == config.agents_file {
            Some(FeedFile::Agents)
        } else if name == config.stats_file {
            Some(FeedFile::Stats)
        } else if name == config.status_file {
            Some(FeedFile::Status)
        } else if name == config.narrative_file {
            Some(FeedFile::Narrative)
        } else {
            None
        }
    }

    pub fn path(&self, config: &FeedConfig) -> PathBuf {
        match self {
            FeedFile::Status => config.status_path(),
            FeedFile::Agents => config.agents_path(),
            FeedFile::Stats => config.stats_path(),
            FeedFile::Narrative => config.narrative_path(),
        }
    }
}

/// Parsed content of one feed file.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedUpdate {
    Agents(AgentSet),
    Stats(StatsSnapshot),
    Lifecycle(TransportMessage),
    Narrative(NarrativeResponse),
}

/// Accepts either a `stats_update` message or a bare stats object.
fn parse_stats(json: &str) -> Result<StatsSnapshot, serde_json::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Wrapped { stats: StatsSnapshot },
        Bare(StatsSnapshot),
    }

    Ok(match serde_json::from_str::<Wire>(json)? {
        Wire::Wrapped { stats } => stats,
        Wire::Bare(stats) => stats,
    })
}

/// Reads and parses one feed file.
pub fn read_feed_file(file: FeedFile, path: &Path) -> Result<FeedUpdate, FeedError> {
    let contents = std::fs::read_to_string(path).map_err(|e| FeedError::io(path, e))?;
    let update = match file {
        FeedFile::Agents => AgentSet::from_json(&contents).map(FeedUpdate::Agents),
        FeedFile::Stats => parse_stats(&contents).map(FeedUpdate::Stats),
        FeedFile::Narrative => NarrativeResponse::from_json(&contents).map(FeedUpdate::Narrative),
        FeedFile::Status => TransportMessage::from_json(&contents).map(|message| match message {
            TransportMessage::AgentUpdate { agents } => FeedUpdate::Agents(AgentSet::new(agents)),
            TransportMessage::StatsUpdate { stats } => FeedUpdate::Stats(stats),
            other => FeedUpdate::Lifecycle(other),
        }),
    };
    update.map_err(|e| FeedError::json(path, e))
}

/// Appends outward commands to the command file.
#[derive(Resource, Debug, Clone)]
pub struct CommandOutbox {
    commands_path: PathBuf,
    narrative_request_path: PathBuf,
}

impl CommandOutbox {
    pub fn new(config: &FeedConfig) -> Self {
        Self {
            commands_path: config.commands_path(),
            narrative_request_path: config.narrative_request_path(),
        }
    }

    pub fn commands_path(&self) -> &Path {
        &self.commands_path
    }

    /// Appends one command line. Nothing waits for an answer.
    pub fn send(&self, command: &SimCommand) -> Result<(), FeedError> {
        let line = command
            .to_jsonl()
            .map_err(|e| FeedError::json(&self.commands_path, e))?;
        ensure_parent(&self.commands_path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.commands_path)
            .map_err(|e| FeedError::io(&self.commands_path, e))?;
        writeln!(file, "{line}").map_err(|e| FeedError::io(&self.commands_path, e))?;
        tracing::info!(command = command.name(), "Sent simulation command");
        Ok(())
    }

    /// Writes the pending narrative request, replacing any earlier one.
    pub fn request_narrative(&self, request: &NarrativeRequest) -> Result<(), FeedError> {
        let path = &self.narrative_request_path;
        let json = serde_json::to_string_pretty(request).map_err(|e| FeedError::json(path, e))?;
        ensure_parent(path)?;
        std::fs::write(path, json).map_err(|e| FeedError::io(path, e))?;
        tracing::info!(agent = request.agent_id, round = request.round, "Requested narrative");
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> Result<(), FeedError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir).map_err(|e| FeedError::io(dir, e))
        }
        _ => Ok(()),
    }
}

/// Feed status shared with the HUD and key bindings.
#[derive(Resource, Debug, Default)]
pub struct FeedState {
    pub connection: ConnectionStatus,
    pub simulation: SimulationStatus,
    /// Latest aggregate statistics.
    pub stats: Option<StatsSnapshot>,
    pub last_update: Option<Instant>,
}

impl FeedState {
    /// Current round, from the latest statistics.
    pub fn round(&self) -> u32 {
        self.stats.as_ref().map(|s| s.round).unwrap_or(0)
    }
}

/// Applies one feed update to the context and feed state.
pub fn apply_update<B: RenderBackend, G: GuideBackend>(
    update: FeedUpdate,
    ctx: &mut VisualizationContext<B, G>,
    state: &mut FeedState,
) {
    match update {
        FeedUpdate::Agents(set) => {
            let count = set.agents.len();
            ctx.apply_agents(set);
            tracing::debug!(agents = count, objects = ctx.objects().len(), "Applied agent update");
        }
        FeedUpdate::Stats(stats) => {
            tracing::debug!(round = stats.round, alive = stats.alive, "Applied stats update");
            state.stats = Some(stats);
        }
        FeedUpdate::Lifecycle(message) => {
            if matches!(
                message,
                TransportMessage::SimulationStarted | TransportMessage::SimulationReset
            ) {
                ctx.clear_agents();
                state.stats = None;
            }
            state.simulation.apply_message(&message);
            tracing::info!(status = state.simulation.as_str(), "Simulation lifecycle changed");
        }
        FeedUpdate::Narrative(response) => {
            if !ctx.narrative_mut().resolve(&response) {
                tracing::debug!(agent = response.agent_id, "Ignored stale narrative response");
            }
        }
    }
    state.connection = ConnectionStatus::Connected;
    state.last_update = Some(Instant::now());
}

/// Reads one file and applies it, recording failures on the connection.
pub fn load_feed_file<B: RenderBackend, G: GuideBackend>(
    file: FeedFile,
    config: &FeedConfig,
    ctx: &mut VisualizationContext<B, G>,
    state: &mut FeedState,
) -> bool {
    let path = file.path(config);
    match read_feed_file(file, &path) {
        Ok(update) => {
            apply_update(update, ctx, state);
            true
        }
        Err(e) => {
            tracing::error!("{}", e);
            state.connection = ConnectionStatus::Error(e.to_string());
            false
        }
    }
}

/// Loads every feed file that exists. Returns how many were applied.
pub fn load_all<B: RenderBackend, G: GuideBackend>(
    config: &FeedConfig,
    ctx: &mut VisualizationContext<B, G>,
    state: &mut FeedState,
) -> usize {
    FeedFile::LOAD_ORDER
        .into_iter()
        .filter(|file| file.path(config).exists())
        .filter(|&file| load_feed_file(file, config, ctx, state))
        .count()
}

/// File watching state stored in Local (doesn't need Send+Sync).
#[derive(Default)]
struct FeedWatcherState {
    watcher: Option<RecommendedWatcher>,
    rx: Option<Receiver<Result<NotifyEvent, notify::Error>>>,
    watching: bool,
    initialized: bool,
    last_attempt: Option<Instant>,
}

/// Delay between attempts to watch a feed directory that does not exist yet.
const WATCH_RETRY_MS: u128 = 2000;

impl FeedWatcherState {
    /// Creates the watcher on first use and starts watching the feed
    /// directory once it exists. Returns true when watching started on this
    /// call.
    fn ensure_watching(&mut self, config: &FeedConfig, state: &mut FeedState) -> bool {
        if !self.initialized {
            self.initialized = true;
            let (tx, rx) = channel();
            match RecommendedWatcher::new(
                move |res| {
                    let _ = tx.send(res);
                },
                notify::Config::default(),
            ) {
                Ok(watcher) => {
                    self.watcher = Some(watcher);
                    self.rx = Some(rx);
                }
                Err(e) => {
                    tracing::error!("Failed to create feed watcher: {}", e);
                    state.connection = ConnectionStatus::Error(e.to_string());
                }
            }
        }

        if self.watching {
            return false;
        }
        self.last_attempt = Some(Instant::now());
        let Some(watcher) = self.watcher.as_mut() else {
            return false;
        };
        if !config.dir.exists() {
            tracing::debug!("Feed directory {:?} does not exist yet", config.dir);
            return false;
        }
        match watcher.watch(&config.dir, RecursiveMode::NonRecursive) {
            Ok(()) => {
                tracing::info!("Watching feed directory: {:?}", config.dir);
                self.watching = true;
                true
            }
            Err(e) => {
                tracing::warn!("Failed to watch directory {:?}: {}", config.dir, e);
                state.connection = ConnectionStatus::Error(e.to_string());
                false
            }
        }
    }

    fn should_retry(&self) -> bool {
        !self.watching
            && self.watcher.is_some()
            && self
                .last_attempt
                .map(|t| t.elapsed().as_millis() > WATCH_RETRY_MS)
                .unwrap_or(true)
    }
}

/// System to apply feed changes reported by the watcher.
fn check_feed_updates(
    mut watcher_state: Local<FeedWatcherState>,
    mut ctx: ResMut<VizContext>,
    mut state: ResMut<FeedState>,
) {
    let config = ctx.config().feed.clone();
    if !watcher_state.initialized {
        watcher_state.ensure_watching(&config, &mut state);
        let loaded = load_all(&config, &mut ctx.0, &mut state);
        tracing::info!(files = loaded, "Initial feed load");
    } else if watcher_state.should_retry() && watcher_state.ensure_watching(&config, &mut state) {
        // The directory appeared after startup.
        load_all(&config, &mut ctx.0, &mut state);
    }

    let Some(ref rx) = watcher_state.rx else {
        return;
    };

    let mut changed: Vec<FeedFile> = Vec::new();
    while let Ok(result) = rx.try_recv() {
        match result {
            Ok(event) => {
                if !matches!(
                    event.kind,
                    notify::EventKind::Modify(_) | notify::EventKind::Create(_)
                ) {
                    continue;
                }
                changed.extend(
                    event
                        .paths
                        .iter()
                        .filter_map(|p| FeedFile::classify(p, &config)),
                );
            }
            Err(e) => {
                tracing::warn!("Feed watcher error: {}", e);
                state.connection = ConnectionStatus::Error(e.to_string());
            }
        }
    }

    // Editors and writers often report several events per save.
    changed.sort_unstable();
    changed.dedup();
    for file in changed {
        load_feed_file(file, &config, &mut ctx.0, &mut state);
    }
}

/// Handle F5 to re-read every feed file.
fn handle_reload_key(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut ctx: ResMut<VizContext>,
    mut state: ResMut<FeedState>,
) {
    if !keyboard.just_pressed(KeyCode::F5) {
        return;
    }
    let config = ctx.config().feed.clone();
    tracing::info!("Manual feed reload triggered");
    let loaded = load_all(&config, &mut ctx.0, &mut state);
    if loaded == 0 && state.connection == ConnectionStatus::Connected {
        state.connection = ConnectionStatus::Disconnected;
    }
}
