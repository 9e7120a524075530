//! Snapshot Types
//!
//! Serialization structs for the agent population the simulation backend
//! streams to the visualizer.
//!
//! Every transport update carries the complete population; nothing here is
//! patched in place. Field names follow the backend's JSON payload, including
//! the few keys that contain spaces.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Stable agent identity. The only thing preserved across replacements.
pub type AgentId = u64;

/// Money assumed for an agent whose payload omits it.
pub const BASELINE_MONEY: f32 = 50.0;

/// Reads an optional attribute, falling back to its default when the value is
/// `null` or has the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// Wealth class an agent was born into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WealthClass {
    Low,
    #[default]
    Middle,
    High,
}

impl WealthClass {
    /// All classes in axis order.
    pub const ALL: [WealthClass; 3] = [WealthClass::Low, WealthClass::Middle, WealthClass::High];

    /// Display name, matching the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            WealthClass::Low => "Low",
            WealthClass::Middle => "Middle",
            WealthClass::High => "High",
        }
    }

    /// Index into [`WealthClass::ALL`].
    pub fn index(&self) -> usize {
        match self {
            WealthClass::Low => 0,
            WealthClass::Middle => 1,
            WealthClass::High => 2,
        }
    }
}

impl std::fmt::Display for WealthClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of an agent's life trajectory.
///
/// Samples are appended in ascending age order and never rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HistorySample {
    pub age: f32,
    #[serde(default, deserialize_with = "lenient")]
    pub confidence: f32,
    #[serde(default, deserialize_with = "lenient")]
    pub competence: f32,
    #[serde(default, deserialize_with = "lenient")]
    pub aspiration: f32,
    #[serde(default, deserialize_with = "lenient")]
    pub risk_tolerance: f32,
}

/// Full agent snapshot as emitted on every `agent_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub age: f32,
    #[serde(rename = "class", default, deserialize_with = "lenient")]
    pub class: WealthClass,
    #[serde(default, deserialize_with = "lenient")]
    pub alive: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub talent: f32,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub money: Option<f32>,
    #[serde(default, deserialize_with = "lenient")]
    pub confidence: f32,
    #[serde(default, deserialize_with = "lenient")]
    pub competence: f32,
    #[serde(default, deserialize_with = "lenient")]
    pub aspiration: f32,
    #[serde(rename = "risk tolerance", default, deserialize_with = "lenient")]
    pub risk_tolerance: f32,
    #[serde(default, deserialize_with = "lenient")]
    pub avg_task_difficulty: f32,
    #[serde(default, deserialize_with = "lenient")]
    pub failure_rate: f32,
    #[serde(default, deserialize_with = "lenient")]
    pub reward_rate: f32,
    #[serde(default, deserialize_with = "lenient")]
    pub task_repeatability: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub total_rewards: f32,
    #[serde(default, deserialize_with = "lenient")]
    pub initial_rewards: f32,
    #[serde(
        rename = "last task",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_task: Option<String>,
    #[serde(rename = "succeeded last task?", default, deserialize_with = "lenient")]
    pub succeeded_last_task: bool,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub history: Vec<HistorySample>,
}

impl AgentSnapshot {
    /// Creates a live agent with neutral attributes.
    pub fn new(id: AgentId, name: impl Into<String>, class: WealthClass) -> Self {
        Self {
            id,
            name: name.into(),
            gender: None,
            age: 0.0,
            class,
            alive: true,
            talent: 0.5,
            money: None,
            confidence: 0.5,
            competence: 0.5,
            aspiration: 0.5,
            risk_tolerance: 0.5,
            avg_task_difficulty: 0.0,
            failure_rate: 0.0,
            reward_rate: 0.0,
            task_repeatability: 0,
            total_rewards: 0.0,
            initial_rewards: 0.0,
            last_task: None,
            succeeded_last_task: false,
            history: Vec::new(),
        }
    }

    /// Money, or [`BASELINE_MONEY`] when the payload omitted it.
    pub fn money_or_baseline(&self) -> f32 {
        match self.money {
            Some(money) if money.is_finite() => money,
            _ => BASELINE_MONEY,
        }
    }
}

/// Payload of an `agent_update` message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSet {
    #[serde(default)]
    pub agents: Vec<AgentSnapshot>,
}

impl AgentSet {
    /// Wraps a population.
    pub fn new(agents: Vec<AgentSnapshot>) -> Self {
        Self { agents }
    }

    /// Finds an agent by ID.
    pub fn find(&self, id: AgentId) -> Option<&AgentSnapshot> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Returns the number of living agents.
    pub fn living_count(&self) -> usize {
        self.agents.iter().filter(|a| a.alive).count()
    }

    /// Parses either `{"agents": [...]}` or a bare agent array.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Wrapped(AgentSet),
            Bare(Vec<AgentSnapshot>),
        }

        Ok(match serde_json::from_str::<Wire>(json)? {
            Wire::Wrapped(set) => set,
            Wire::Bare(agents) => AgentSet { agents },
        })
    }
}
