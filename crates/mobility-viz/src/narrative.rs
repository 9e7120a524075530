//! Narrative and portrait request tracking.
//!
//! The narrative service is optional and best-effort. Nothing here blocks:
//! a request only moves the state to `Pending`, and the answer, if it ever
//! arrives, is applied with [`NarrativeRequests::resolve`]. State is tied to
//! one agent and resets whenever the selection changes.

use mobility_events::{AgentId, AgentSnapshot, NarrativeRequest, NarrativeResponse};

/// Narrative text state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NarrativeState {
    #[default]
    NotRequested,
    Pending,
    Available(String),
    Failed(String),
}

/// Portrait image state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PortraitState {
    #[default]
    NotRequested,
    Pending,
    /// Location of the generated image
    Available(String),
    Failed(String),
}

impl NarrativeState {
    pub fn is_pending(&self) -> bool {
        matches!(self, NarrativeState::Pending)
    }

    /// Short status text for the HUD.
    pub fn summary(&self) -> &str {
        match self {
            NarrativeState::NotRequested => "not requested",
            NarrativeState::Pending => "analyzing…",
            NarrativeState::Available(_) => "available",
            NarrativeState::Failed(_) => "failed",
        }
    }
}

/// Reasons a narrative request is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NarrativeError {
    #[error("no agent selected")]
    NoSelection,
    #[error("analysis unlocks after {min} rounds (current round {round})")]
    TooEarly { round: u32, min: u32 },
    #[error("analysis already pending for agent {0}")]
    AlreadyPending(AgentId),
}

/// Tracks the narrative and portrait for the selected agent.
#[derive(Debug, Clone)]
pub struct NarrativeRequests {
    min_rounds: u32,
    agent: Option<AgentId>,
    narrative: NarrativeState,
    portrait: PortraitState,
}

impl NarrativeRequests {
    pub fn new(min_rounds: u32) -> Self {
        Self {
            min_rounds,
            agent: None,
            narrative: NarrativeState::NotRequested,
            portrait: PortraitState::NotRequested,
        }
    }

    pub fn agent(&self) -> Option<AgentId> {
        self.agent
    }

    pub fn narrative(&self) -> &NarrativeState {
        &self.narrative
    }

    pub fn portrait(&self) -> &PortraitState {
        &self.portrait
    }

    /// Whether analysis is unlocked at `round`.
    pub fn is_unlocked(&self, round: u32) -> bool {
        round >= self.min_rounds
    }

    /// Resets both states when the selection moves to a different agent.
    pub fn on_selection_changed(&mut self, selected: Option<AgentId>) {
        if self.agent == selected {
            return;
        }
        self.agent = selected;
        self.narrative = NarrativeState::NotRequested;
        self.portrait = PortraitState::NotRequested;
    }

    /// Marks both states pending and returns the request to send.
    pub fn request(
        &mut self,
        agent: &AgentSnapshot,
        round: u32,
    ) -> Result<NarrativeRequest, NarrativeError> {
        if self.agent != Some(agent.id) {
            return Err(NarrativeError::NoSelection);
        }
        if !self.is_unlocked(round) {
            return Err(NarrativeError::TooEarly {
                round,
                min: self.min_rounds,
            });
        }
        if self.narrative.is_pending() {
            return Err(NarrativeError::AlreadyPending(agent.id));
        }

        self.narrative = NarrativeState::Pending;
        self.portrait = PortraitState::Pending;
        Ok(NarrativeRequest {
            agent_id: agent.id,
            round,
            agent: agent.clone(),
        })
    }

    /// Applies a service answer. Answers for another agent, or arriving when
    /// nothing is pending, are ignored.
    pub fn resolve(&mut self, response: &NarrativeResponse) -> bool {
        if self.agent != Some(response.agent_id) || !self.narrative.is_pending() {
            return false;
        }

        self.narrative = match (&response.analysis, &response.error) {
            (Some(text), _) => NarrativeState::Available(text.clone()),
            (None, Some(error)) => NarrativeState::Failed(error.clone()),
            (None, None) => NarrativeState::Failed("empty response".into()),
        };
        self.portrait = match (&response.portrait_url, &response.portrait_error) {
            (Some(url), _) => PortraitState::Available(url.clone()),
            (None, Some(error)) => PortraitState::Failed(error.clone()),
            (None, None) => PortraitState::Failed("portrait unavailable".into()),
        };
        true
    }

    /// Marks a pending request as failed, e.g. when it could not be sent.
    pub fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.narrative.is_pending() {
            self.narrative = NarrativeState::Failed(reason.clone());
        }
        if self.portrait == PortraitState::Pending {
            self.portrait = PortraitState::Failed(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mobility_events::WealthClass;

    fn selected(id: AgentId) -> (NarrativeRequests, AgentSnapshot) {
        let mut requests = NarrativeRequests::new(10);
        requests.on_selection_changed(Some(id));
        (requests, AgentSnapshot::new(id, "a", WealthClass::Low))
    }

    #[test]
    fn test_locked_before_min_rounds() {
        let (mut requests, agent) = selected(1);
        assert_eq!(
            requests.request(&agent, 9),
            Err(NarrativeError::TooEarly { round: 9, min: 10 })
        );
        assert_eq!(requests.narrative(), &NarrativeState::NotRequested);
        assert!(requests.request(&agent, 10).is_ok());
    }

    #[test]
    fn test_request_requires_selection() {
        let mut requests = NarrativeRequests::new(0);
        let agent = AgentSnapshot::new(2, "b", WealthClass::High);
        assert_eq!(requests.request(&agent, 50), Err(NarrativeError::NoSelection));
    }

    #[test]
    fn test_resolve_partial_response() {
        let (mut requests, agent) = selected(3);
        requests.request(&agent, 12).unwrap();
        assert_eq!(
            requests.request(&agent, 12),
            Err(NarrativeError::AlreadyPending(3))
        );

        let applied = requests.resolve(&NarrativeResponse {
            agent_id: 3,
            analysis: Some("Steady climb.".into()),
            ..Default::default()
        });
        assert!(applied);
        assert_eq!(
            requests.narrative(),
            &NarrativeState::Available("Steady climb.".into())
        );
        assert!(matches!(requests.portrait(), PortraitState::Failed(_)));
    }

    #[test]
    fn test_selection_change_resets_and_drops_late_answers() {
        let (mut requests, agent) = selected(4);
        requests.request(&agent, 20).unwrap();
        requests.on_selection_changed(Some(5));
        assert_eq!(requests.narrative(), &NarrativeState::NotRequested);

        let late = NarrativeResponse {
            agent_id: 4,
            analysis: Some("late".into()),
            ..Default::default()
        };
        assert!(!requests.resolve(&late));
        assert_eq!(requests.narrative(), &NarrativeState::NotRequested);
    }

    #[test]
    fn test_fail_only_touches_pending() {
        let (mut requests, agent) = selected(6);
        requests.fail("offline");
        assert_eq!(requests.narrative(), &NarrativeState::NotRequested);

        requests.request(&agent, 15).unwrap();
        requests.fail("offline");
        assert_eq!(requests.narrative(), &NarrativeState::Failed("offline".into()));
        assert_eq!(requests.portrait(), &PortraitState::Failed("offline".into()));
    }
}
