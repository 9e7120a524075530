//! Sample data fixtures for testing.
//!
//! This module provides ready-made test data for other crates to use.
//! Enable the `test-fixtures` feature to access these helpers.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // mobility-events = { path = "../mobility-events", features = ["test-fixtures"] }
//!
//! use mobility_events::fixtures;
//!
//! let agents = fixtures::sample_agents();
//! let stats = fixtures::sample_stats();
//! ```

use crate::{AgentId, AgentSet, AgentSnapshot, StatsSnapshot, WealthClass};

/// Returns the sample population from the fixtures file.
///
/// Contains 8 agents:
/// - 3 Low, 2 Middle, 3 High
/// - agent 4 is dead (dropped out)
/// - agent 6 has no `money` field
/// - agents 1 and 2 carry a trajectory history; agent 2 has a single sample
/// - agents 3 and 5 sit inside the 45-55% talent band
pub fn sample_agents() -> Vec<AgentSnapshot> {
    let json = include_str!("../tests/fixtures/sample_agents.json");
    AgentSet::from_json(json)
        .unwrap_or_else(|e| panic!("Failed to parse sample_agents.json: {}", e))
        .agents
}

/// Returns sample round statistics from the fixtures file.
pub fn sample_stats() -> StatsSnapshot {
    let json = include_str!("../tests/fixtures/sample_stats.json");
    serde_json::from_str(json).expect("Failed to parse sample_stats.json")
}

/// Returns a specific agent by ID from the sample population.
pub fn get_agent(id: AgentId) -> Option<AgentSnapshot> {
    sample_agents().into_iter().find(|a| a.id == id)
}

/// Builds a live agent with the given projection-relevant attributes.
pub fn agent(id: AgentId, class: WealthClass, talent: f32, confidence: f32) -> AgentSnapshot {
    let mut agent = AgentSnapshot::new(id, format!("Agent {}", id), class);
    agent.talent = talent;
    agent.confidence = confidence;
    agent
}
