//! Transport messages.
//!
//! `SimCommand` flows from the visualizer to the simulation backend;
//! `TransportMessage` flows back. Commands are fire-and-forget: the backend
//! answers with lifecycle messages but nothing waits for them.

use serde::{Deserialize, Serialize};

use crate::snapshot::{AgentId, AgentSnapshot};
use crate::stats::StatsSnapshot;

/// Population bounds the backend accepts.
pub const MIN_AGENTS: u32 = 1;
pub const MAX_AGENTS: u32 = 500;
/// Round bounds the backend accepts.
pub const MIN_ROUNDS: u32 = 1;
pub const MAX_ROUNDS: u32 = 200;

/// Parameters of a `start` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartParams {
    pub num_agents: u32,
    pub num_rounds: u32,
}

/// Outward command to the simulation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "params", rename_all = "snake_case")]
pub enum SimCommand {
    Start(StartParams),
    Pause,
    Unpause,
    Reset,
    GetState,
}

impl SimCommand {
    /// Builds a start command with population and rounds clamped to what
    /// the backend accepts.
    pub fn start(num_agents: u32, num_rounds: u32) -> Self {
        SimCommand::Start(StartParams {
            num_agents: num_agents.clamp(MIN_AGENTS, MAX_AGENTS),
            num_rounds: num_rounds.clamp(MIN_ROUNDS, MAX_ROUNDS),
        })
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            SimCommand::Start(_) => "start",
            SimCommand::Pause => "pause",
            SimCommand::Unpause => "unpause",
            SimCommand::Reset => "reset",
            SimCommand::GetState => "get_state",
        }
    }

    /// Serializes the command as one JSON line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Inward message from the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportMessage {
    /// Full replacement of the live population.
    AgentUpdate { agents: Vec<AgentSnapshot> },
    /// Aggregate statistics for the latest round.
    StatsUpdate { stats: StatsSnapshot },
    SimulationStarted,
    SimulationPaused,
    SimulationUnpaused,
    SimulationReset,
    SimulationComplete,
}

impl TransportMessage {
    /// Parses a message from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Request for an agent's narrative analysis and portrait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeRequest {
    pub agent_id: AgentId,
    pub round: u32,
    pub agent: AgentSnapshot,
}

/// Best-effort answer from the narrative service.
///
/// Either half may be missing; a missing portrait is reported separately so
/// the narrative text can still be shown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrativeResponse {
    pub agent_id: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portrait_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portrait_error: Option<String>,
}

impl NarrativeResponse {
    /// Parses a response from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
