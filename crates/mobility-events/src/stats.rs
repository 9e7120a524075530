//! Aggregate statistics for a simulation round.

use serde::{Deserialize, Serialize};

use crate::snapshot::{AgentSnapshot, WealthClass};

/// One value per wealth class.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassAverages {
    #[serde(rename = "Low", default)]
    pub low: f32,
    #[serde(rename = "Middle", default)]
    pub middle: f32,
    #[serde(rename = "High", default)]
    pub high: f32,
}

impl ClassAverages {
    /// Value for a class.
    pub fn get(&self, class: WealthClass) -> f32 {
        match class {
            WealthClass::Low => self.low,
            WealthClass::Middle => self.middle,
            WealthClass::High => self.high,
        }
    }

    fn set(&mut self, class: WealthClass, value: f32) {
        match class {
            WealthClass::Low => self.low = value,
            WealthClass::Middle => self.middle = value,
            WealthClass::High => self.high = value,
        }
    }
}

/// Payload of a `stats_update` message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    #[serde(default)]
    pub round: u32,
    #[serde(default)]
    pub alive: u32,
    #[serde(default)]
    pub dropouts: u32,
    #[serde(default)]
    pub avg_confidence: ClassAverages,
    #[serde(default)]
    pub avg_competence: ClassAverages,
    #[serde(default)]
    pub avg_aspiration: ClassAverages,
    #[serde(default)]
    pub avg_risk_tolerance: ClassAverages,
    #[serde(default)]
    pub avg_money: ClassAverages,
}

impl StatsSnapshot {
    /// Recomputes the aggregates from a population.
    ///
    /// Averages only cover living agents; a class with no living members
    /// reports zero. Dead agents count as dropouts.
    pub fn from_agents(round: u32, agents: &[AgentSnapshot]) -> Self {
        let mut stats = StatsSnapshot {
            round,
            alive: agents.iter().filter(|a| a.alive).count() as u32,
            dropouts: agents.iter().filter(|a| !a.alive).count() as u32,
            ..Default::default()
        };

        for class in WealthClass::ALL {
            let members: Vec<&AgentSnapshot> = agents
                .iter()
                .filter(|a| a.alive && a.class == class)
                .collect();
            if members.is_empty() {
                continue;
            }
            let n = members.len() as f32;
            let mean = |f: fn(&AgentSnapshot) -> f32| members.iter().map(|a| f(a)).sum::<f32>() / n;

            stats.avg_confidence.set(class, mean(|a| a.confidence));
            stats.avg_competence.set(class, mean(|a| a.competence));
            stats.avg_aspiration.set(class, mean(|a| a.aspiration));
            stats.avg_risk_tolerance.set(class, mean(|a| a.risk_tolerance));
            stats.avg_money.set(class, mean(|a| a.money_or_baseline()));
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_parse_partial_payload() {
        // The backend only sends confidence averages.
        let json = r#"{"round": 4, "alive": 98, "dropouts": 2,
                       "avgConfidence": {"Low": 0.3, "Middle": 0.5, "High": 0.7}}"#;
        let stats: StatsSnapshot = serde_json::from_str(json).unwrap();

        assert_eq!(stats.round, 4);
        assert_eq!(stats.avg_confidence.get(WealthClass::High), 0.7);
        assert_eq!(stats.avg_money, ClassAverages::default());
    }

    #[test]
    fn test_from_agents_ignores_dead_members() {
        let mut a = AgentSnapshot::new(1, "a", WealthClass::Low);
        a.confidence = 0.2;
        let mut b = AgentSnapshot::new(2, "b", WealthClass::Low);
        b.confidence = 0.4;
        let mut dead = AgentSnapshot::new(3, "c", WealthClass::Low);
        dead.alive = false;
        dead.confidence = 1.0;

        let stats = StatsSnapshot::from_agents(7, &[a, b, dead]);

        assert_eq!(stats.alive, 2);
        assert_eq!(stats.dropouts, 1);
        assert!((stats.avg_confidence.low - 0.3).abs() < 1e-6);
        assert_eq!(stats.avg_confidence.high, 0.0);
        assert_eq!(stats.avg_money.low, 50.0);
    }
}
