//! Attribute-to-space projection.
//!
//! Pure functions: the same agent, view, layout mode and parameters always
//! produce the same point.

use bevy::math::{Vec2, Vec3};
use mobility_events::{AgentId, AgentSnapshot};

use crate::config::ProjectionParams;
use crate::views::ViewConfig;

/// Knuth's multiplicative hashing constant.
const JITTER_HASH: u32 = 2_654_435_761;

/// Positioning variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutMode {
    /// Exact projected coordinates
    #[default]
    Spiral,
    /// Deterministic per-id jitter on x and z
    Scatter,
}

impl LayoutMode {
    pub fn toggled(self) -> Self {
        match self {
            LayoutMode::Spiral => LayoutMode::Scatter,
            LayoutMode::Scatter => LayoutMode::Spiral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutMode::Spiral => "spiral",
            LayoutMode::Scatter => "scatter",
        }
    }
}

impl std::str::FromStr for LayoutMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spiral" => Ok(LayoutMode::Spiral),
            "scatter" => Ok(LayoutMode::Scatter),
            other => Err(format!("unknown layout mode: {other}")),
        }
    }
}

/// Maps normalized axis values to world coordinates.
pub fn axis_to_world(values: [f32; 3], params: &ProjectionParams) -> Vec3 {
    Vec3::new(
        (values[0] - 0.5) * params.span_xz,
        values[1] * params.span_y + params.y_offset,
        (values[2] - 0.5) * params.span_xz,
    )
}

/// Deterministic (dx, dz) offset for an agent id.
///
/// The hash wraps at 32 bits. The low byte group drives x and the next one
/// drives z; each maps to a fraction in [-0.5, 0.5) of `spread`.
pub fn scatter_jitter(id: AgentId, spread: f32) -> Vec2 {
    let hash = (id as u32).wrapping_mul(JITTER_HASH);
    let fx = (hash % 100) as f32 / 100.0 - 0.5;
    let fz = ((hash >> 8) % 100) as f32 / 100.0 - 0.5;
    Vec2::new(fx * spread, fz * spread)
}

/// Projects an agent under a view and layout mode.
pub fn project(
    agent: &AgentSnapshot,
    view: &ViewConfig,
    mode: LayoutMode,
    params: &ProjectionParams,
) -> Vec3 {
    let base = axis_to_world(view.sample(agent), params);
    match mode {
        LayoutMode::Spiral => base,
        LayoutMode::Scatter => {
            let jitter = scatter_jitter(agent.id, params.jitter_spread);
            base + Vec3::new(jitter.x, 0.0, jitter.y)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::{ViewKey, ViewRegistry};
    use mobility_events::WealthClass;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn test_self_knowledge_example_point() {
        let registry = ViewRegistry::default();
        let mut agent = AgentSnapshot::new(1, "a", WealthClass::High);
        agent.talent = 0.8;
        agent.confidence = 0.6;

        let p = project(
            &agent,
            registry.get(ViewKey::SelfKnowledge),
            LayoutMode::Spiral,
            &ProjectionParams::default(),
        );
        assert!(close(p, Vec3::new(30.0, 24.0, 30.0)), "{p:?}");
    }

    #[test]
    fn test_jitter_is_deterministic() {
        let a = scatter_jitter(7, 3.0);
        let b = scatter_jitter(7, 3.0);
        assert_eq!(a, b);
        assert!(a.x.abs() <= 1.5 && a.y.abs() <= 1.5);
    }

    #[test]
    fn test_jitter_known_value() {
        // 7 * 2654435761 mod 2^32 = 1401181143
        let hash: u32 = 1_401_181_143;
        assert_eq!(7u32.wrapping_mul(JITTER_HASH), hash);
        let j = scatter_jitter(7, 1.0);
        assert!((j.x - ((hash % 100) as f32 / 100.0 - 0.5)).abs() < 1e-6);
        assert!((j.y - (((hash >> 8) % 100) as f32 / 100.0 - 0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_spiral_has_no_jitter_and_scatter_keeps_height() {
        let registry = ViewRegistry::default();
        let view = registry.get(ViewKey::RiskBehavior);
        let params = ProjectionParams::default();
        let agent = AgentSnapshot::new(42, "b", WealthClass::Low);

        let spiral = project(&agent, view, LayoutMode::Spiral, &params);
        let scatter = project(&agent, view, LayoutMode::Scatter, &params);
        assert!(close(spiral, axis_to_world(view.sample(&agent), &params)));
        assert_eq!(spiral.y, scatter.y);
        let j = scatter_jitter(42, params.jitter_spread);
        assert!(close(scatter - spiral, Vec3::new(j.x, 0.0, j.y)));
    }

    #[test]
    fn test_projection_stays_within_spans() {
        let registry = ViewRegistry::default();
        let params = ProjectionParams::default();
        let mut agent = AgentSnapshot::new(3, "c", WealthClass::Middle);
        for &v in &[-0.2, 0.0, 0.37, 1.0, 1.2] {
            agent.talent = v;
            agent.confidence = v;
            agent.aspiration = v;
            agent.risk_tolerance = v;
            agent.failure_rate = v;
            agent.avg_task_difficulty = v;
            agent.total_rewards = v * 10_000.0;
            agent.age = v * 50.0;
            agent.task_repeatability = (v * 40.0) as u32;
            agent.reward_rate = v * 30.0;
            for view in registry.iter() {
                let p = project(&agent, view, LayoutMode::Spiral, &params);
                assert!((-50.0..=50.0).contains(&p.x), "{} x={}", view.key, p.x);
                assert!((3.0..=38.0).contains(&p.y), "{} y={}", view.key, p.y);
                assert!((-50.0..=50.0).contains(&p.z), "{} z={}", view.key, p.z);
            }
        }
    }

    #[test]
    fn test_layout_mode_parse_and_toggle() {
        assert_eq!("scatter".parse::<LayoutMode>(), Ok(LayoutMode::Scatter));
        assert!("grid".parse::<LayoutMode>().is_err());
        assert_eq!(LayoutMode::Spiral.toggled(), LayoutMode::Scatter);
    }
}
