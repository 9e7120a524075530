//! Shared agent, statistics and transport types for the social-mobility
//! visualizer.
//!
//! This crate contains pure data structures with no rendering logic.
//! It is a dependency for all other crates in the workspace.

pub mod message;
pub mod snapshot;
pub mod stats;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

// Re-export snapshot types
pub use snapshot::{AgentId, AgentSet, AgentSnapshot, HistorySample, WealthClass, BASELINE_MONEY};

// Re-export statistics types
pub use stats::{ClassAverages, StatsSnapshot};

// Re-export message types
pub use message::{
    NarrativeRequest, NarrativeResponse, SimCommand, StartParams, TransportMessage, MAX_AGENTS,
    MAX_ROUNDS, MIN_AGENTS, MIN_ROUNDS,
};
