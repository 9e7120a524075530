//! View catalogue: named mappings of agent attributes onto the three axes.
//!
//! The set of views is closed and fixed when the registry is built. Each axis
//! reads a normalized value out of an [`AgentSnapshot`]; raw magnitudes
//! (rewards, age, repeat counts) are divided by a configured scale first.
//! Every sampled value is clamped to [0, 1].

use mobility_events::{AgentSnapshot, WealthClass};

use crate::config::ViewScales;

/// Representative axis value of each wealth class, in `WealthClass::ALL` order.
pub const CLASS_AXIS_VALUES: [f32; 3] = [0.2, 0.5, 0.8];

/// Key of one of the fixed views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ViewKey {
    #[default]
    SelfKnowledge,
    AspirationOutcomes,
    RiskBehavior,
    IdentityHardening,
    TaskFarming,
    ClassEffect,
}

impl ViewKey {
    /// All views in menu order.
    pub const ALL: [ViewKey; 6] = [
        ViewKey::SelfKnowledge,
        ViewKey::AspirationOutcomes,
        ViewKey::RiskBehavior,
        ViewKey::IdentityHardening,
        ViewKey::TaskFarming,
        ViewKey::ClassEffect,
    ];

    /// Position in [`ViewKey::ALL`].
    pub fn index(&self) -> usize {
        match self {
            ViewKey::SelfKnowledge => 0,
            ViewKey::AspirationOutcomes => 1,
            ViewKey::RiskBehavior => 2,
            ViewKey::IdentityHardening => 3,
            ViewKey::TaskFarming => 4,
            ViewKey::ClassEffect => 5,
        }
    }

    /// Kebab-case key used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKey::SelfKnowledge => "self-knowledge",
            ViewKey::AspirationOutcomes => "aspiration-outcomes",
            ViewKey::RiskBehavior => "risk-behavior",
            ViewKey::IdentityHardening => "identity-hardening",
            ViewKey::TaskFarming => "task-farming",
            ViewKey::ClassEffect => "class-effect",
        }
    }
}

impl std::fmt::Display for ViewKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ViewKey {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViewKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ViewError::UnknownKey(s.to_string()))
    }
}

/// Errors raised when resolving user-supplied view names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    #[error("unknown view key: {0}")]
    UnknownKey(String),
}

/// Whether an axis is a continuous range or a small set of categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisKind {
    Continuous,
    Categorical,
}

/// Attribute an axis reads, with its normalization scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisValue {
    Talent,
    Confidence,
    Aspiration,
    RiskTolerance,
    WealthClass,
    FailureRate,
    AvgTaskDifficulty,
    TotalRewards { divisor: f32 },
    Age { scale: f32 },
    TaskRepeatability { scale: f32 },
    RewardRate { scale: f32 },
}

impl AxisValue {
    /// Normalized value of this attribute for an agent.
    pub fn sample(&self, agent: &AgentSnapshot) -> f32 {
        let value = match *self {
            AxisValue::Talent => agent.talent,
            AxisValue::Confidence => agent.confidence,
            AxisValue::Aspiration => agent.aspiration,
            AxisValue::RiskTolerance => agent.risk_tolerance,
            AxisValue::WealthClass => CLASS_AXIS_VALUES[agent.class.index()],
            AxisValue::FailureRate => agent.failure_rate,
            AxisValue::AvgTaskDifficulty => agent.avg_task_difficulty,
            AxisValue::TotalRewards { divisor } => capped(agent.total_rewards, divisor),
            AxisValue::Age { scale } => capped(agent.age, scale),
            AxisValue::TaskRepeatability { scale } => capped(agent.task_repeatability as f32, scale),
            AxisValue::RewardRate { scale } => capped(agent.reward_rate, scale),
        };
        if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

fn safe_scale(scale: f32) -> f32 {
    if scale.abs() > f32::EPSILON {
        scale
    } else {
        1.0
    }
}

fn capped(raw: f32, scale: f32) -> f32 {
    (raw / safe_scale(scale)).clamp(0.0, 1.0)
}

/// How tick values on an axis are written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickFormat {
    /// `$1500`, with the normalized value multiplied by `scale`
    Currency { scale: f32 },
    /// `25%`
    Percent,
    /// `25y`
    Years { scale: f32 },
    /// `10x`
    Multiplier { scale: f32 },
}

impl TickFormat {
    /// Formats a normalized value in [0, 1].
    pub fn format(&self, value: f32) -> String {
        match *self {
            TickFormat::Currency { scale } => format!("${}", (value * scale).round() as i64),
            TickFormat::Percent => format!("{}%", (value * 100.0).round() as i64),
            TickFormat::Years { scale } => format!("{}y", (value * scale).round() as i64),
            TickFormat::Multiplier { scale } => format!("{}x", (value * scale).round() as i64),
        }
    }
}

/// One axis of a view.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSpec {
    pub label: &'static str,
    pub value: AxisValue,
    pub kind: AxisKind,
    pub categories: Vec<&'static str>,
}

impl AxisSpec {
    fn continuous(label: &'static str, value: AxisValue) -> Self {
        Self {
            label,
            value,
            kind: AxisKind::Continuous,
            categories: Vec::new(),
        }
    }

    fn wealth_class() -> Self {
        Self {
            label: "WEALTH CLASS",
            value: AxisValue::WealthClass,
            kind: AxisKind::Categorical,
            categories: WealthClass::ALL.iter().map(|c| c.as_str()).collect(),
        }
    }

    /// Normalized value for an agent.
    pub fn sample(&self, agent: &AgentSnapshot) -> f32 {
        self.value.sample(agent)
    }

    /// Categories paired with their representative axis values.
    pub fn category_values(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        self.categories
            .iter()
            .copied()
            .zip(CLASS_AXIS_VALUES.iter().copied())
    }

    /// Tick text format implied by the axis semantics.
    pub fn tick_format(&self) -> TickFormat {
        match self.value {
            AxisValue::TotalRewards { divisor } => TickFormat::Currency { scale: divisor },
            AxisValue::Age { scale } => TickFormat::Years { scale },
            AxisValue::TaskRepeatability { scale } => TickFormat::Multiplier { scale },
            _ => TickFormat::Percent,
        }
    }
}

/// Predicate restricting which agents a view shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewFilter {
    /// Inclusive talent band
    TalentBand { min: f32, max: f32 },
}

impl ViewFilter {
    pub fn admits(&self, agent: &AgentSnapshot) -> bool {
        match *self {
            ViewFilter::TalentBand { min, max } => agent.talent >= min && agent.talent <= max,
        }
    }
}

/// A named three-axis mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfig {
    pub key: ViewKey,
    pub name: &'static str,
    pub question: &'static str,
    pub description: &'static str,
    pub x: AxisSpec,
    pub y: AxisSpec,
    pub z: AxisSpec,
    pub filter: Option<ViewFilter>,
}

impl ViewConfig {
    /// Axes in x, y, z order.
    pub fn axes(&self) -> [&AxisSpec; 3] {
        [&self.x, &self.y, &self.z]
    }

    /// Normalized (x, y, z) values for an agent.
    pub fn sample(&self, agent: &AgentSnapshot) -> [f32; 3] {
        [self.x.sample(agent), self.y.sample(agent), self.z.sample(agent)]
    }

    /// Whether the view's filter, if any, admits the agent.
    pub fn admits(&self, agent: &AgentSnapshot) -> bool {
        self.filter.map_or(true, |f| f.admits(agent))
    }

    /// Whether the agent gets a render object under this view.
    pub fn is_visible(&self, agent: &AgentSnapshot) -> bool {
        agent.alive && self.admits(agent)
    }
}

/// The fixed catalogue of views.
#[derive(Debug, Clone)]
pub struct ViewRegistry {
    views: Vec<ViewConfig>,
}

impl Default for ViewRegistry {
    fn default() -> Self {
        Self::new(&ViewScales::default())
    }
}

impl ViewRegistry {
    /// Builds every view with the given normalization scales.
    pub fn new(scales: &ViewScales) -> Self {
        let views = vec![
            ViewConfig {
                key: ViewKey::SelfKnowledge,
                name: "Self-Knowledge",
                question: "Who knows themselves accurately?",
                description: "Does class affect how accurately people assess their own abilities?",
                x: AxisSpec::continuous("TRUE TALENT", AxisValue::Talent),
                y: AxisSpec::continuous("CONFIDENCE", AxisValue::Confidence),
                z: AxisSpec::wealth_class(),
                filter: None,
            },
            ViewConfig {
                key: ViewKey::AspirationOutcomes,
                name: "Aspiration → Outcomes",
                question: "Does wanting more actually translate into outcomes?",
                description: "Do ambitious agents from different classes achieve different outcomes?",
                x: AxisSpec::continuous("ASPIRATION", AxisValue::Aspiration),
                y: AxisSpec::continuous(
                    "TOTAL REWARDS",
                    AxisValue::TotalRewards {
                        divisor: scales.aspiration_reward_divisor,
                    },
                ),
                z: AxisSpec::wealth_class(),
                filter: None,
            },
            ViewConfig {
                key: ViewKey::RiskBehavior,
                name: "Risk Profile vs Behavior",
                question: "Do agents act according to their risk profile?",
                description: "Are risk-takers choosing harder tasks? Are they failing more?",
                x: AxisSpec::continuous("RISK TOLERANCE", AxisValue::RiskTolerance),
                y: AxisSpec::continuous("AVG TASK DIFFICULTY", AxisValue::AvgTaskDifficulty),
                z: AxisSpec::continuous("FAILURE RATE", AxisValue::FailureRate),
                filter: None,
            },
            ViewConfig {
                key: ViewKey::IdentityHardening,
                name: "Identity Hardening",
                question: "How identity hardens over time",
                description: "Do agents become more conservative and less ambitious as they age?",
                x: AxisSpec::continuous(
                    "AGE",
                    AxisValue::Age {
                        scale: scales.age_scale,
                    },
                ),
                y: AxisSpec::continuous("ASPIRATION", AxisValue::Aspiration),
                z: AxisSpec::continuous("RISK TOLERANCE", AxisValue::RiskTolerance),
                filter: None,
            },
            ViewConfig {
                key: ViewKey::TaskFarming,
                name: "Task Farming",
                question: "Who is farming low-risk tasks?",
                description: "Are older agents stuck repeating safe tasks for diminishing returns?",
                x: AxisSpec::continuous(
                    "TASK REPEATABILITY",
                    AxisValue::TaskRepeatability {
                        scale: scales.repeatability_scale,
                    },
                ),
                y: AxisSpec::continuous(
                    "REWARD RATE",
                    AxisValue::RewardRate {
                        scale: scales.reward_rate_scale,
                    },
                ),
                z: AxisSpec::continuous(
                    "AGE",
                    AxisValue::Age {
                        scale: scales.age_scale,
                    },
                ),
                filter: None,
            },
            ViewConfig {
                key: ViewKey::ClassEffect,
                name: "Pure Class Effect",
                question: "What does class alone change?",
                description: "For agents with similar talent (45-55%), how does class affect outcomes?",
                x: AxisSpec::wealth_class(),
                y: AxisSpec::continuous(
                    "FINAL REWARDS",
                    AxisValue::TotalRewards {
                        divisor: scales.class_effect_reward_divisor,
                    },
                ),
                z: AxisSpec::continuous("CONFIDENCE", AxisValue::Confidence),
                filter: Some(ViewFilter::TalentBand {
                    min: scales.class_effect_talent_min,
                    max: scales.class_effect_talent_max,
                }),
            },
        ];

        Self { views }
    }

    /// Looks up a view. Views are stored in `ViewKey::ALL` order, so every
    /// key resolves.
    pub fn get(&self, key: ViewKey) -> &ViewConfig {
        &self.views[key.index()]
    }

    /// All views in menu order.
    pub fn iter(&self) -> impl Iterator<Item = &ViewConfig> {
        self.views.iter()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}
