//! Routing policies.
//!
//! A policy turns the signal estimators' outputs into a [`Verdict`]: how
//! confident the router is in the economy provider and whether a failed
//! attempt may escalate to premium. Policies never pick the premium provider
//! up front; it is reachable only through the dispatcher's fallback path.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::routing::signals::{CommandCategory, RoutingContext, SignalEstimators};
use crate::routing::ParsedCommand;

/// Available routing strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Economy provider only, never fall back.
    EconomyOnly,
    /// Economy first, fallback allowed below the high-capability threshold.
    #[default]
    EconomyFirst,
    /// Weighted blend of capability, complexity, context and cost.
    Intelligent,
    /// Conservative: fallback allowed unless capability is very high.
    Fallback,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 4] = [
        PolicyKind::EconomyOnly,
        PolicyKind::EconomyFirst,
        PolicyKind::Intelligent,
        PolicyKind::Fallback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EconomyOnly => "economy_only",
            Self::EconomyFirst => "economy_first",
            Self::Intelligent => "intelligent",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "economy_only" | "provider_a_only" | "a_only" => Ok(Self::EconomyOnly),
            "economy_first" | "provider_a_first" | "a_first" => Ok(Self::EconomyFirst),
            "intelligent" | "smart" => Ok(Self::Intelligent),
            "fallback" | "conservative" => Ok(Self::Fallback),
            _ => Err(ConfigError::UnknownPolicy {
                name: s.to_string(),
                expected: PolicyKind::ALL
                    .iter()
                    .map(PolicyKind::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

/// Weights of the intelligent policy's blended score. Must sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub capability: f64,
    /// Applied to `1 - complexity`.
    pub complexity: f64,
    pub context: f64,
    pub cost: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            capability: 0.4,
            complexity: 0.3,
            context: 0.2,
            cost: 0.1,
        }
    }
}

impl ScoringWeights {
    const SUM_EPSILON: f64 = 1e-6;

    pub fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("weight.capability", self.capability),
            ("weight.complexity", self.complexity),
            ("weight.context", self.context),
            ("weight.cost", self.cost),
        ];
        for (key, value) in named {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("must be within [0, 1], got {value}"),
                });
            }
        }
        let sum: f64 = named.iter().map(|(_, v)| v).sum();
        if (sum - 1.0).abs() > Self::SUM_EPSILON {
            return Err(ConfigError::InvalidValue {
                key: "weights".to_string(),
                message: format!("must sum to 1.0, got {sum}"),
            });
        }
        Ok(())
    }
}

/// Decision thresholds, listed from highest to lowest.
///
/// Validation requires every value in [0, 1] and the declaration order to be
/// monotonically non-increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingThresholds {
    /// Fallback policy: capability at or above this skips fallback.
    pub conservative: f64,
    /// Economy-first: high-confidence capability.
    pub capability_high: f64,
    /// Intelligent: high-confidence blended score.
    pub blend_high: f64,
    /// Economy-first: medium capability (fallback enabled).
    pub capability_medium: f64,
    /// Intelligent: medium blended score (fallback enabled).
    pub blend_medium: f64,
    /// Economy-first: confidence floor for low capability.
    pub capability_floor: f64,
    /// Intelligent: confidence floor for a low blended score.
    pub blend_floor: f64,
}

impl Default for RoutingThresholds {
    fn default() -> Self {
        Self {
            conservative: 0.9,
            capability_high: 0.8,
            blend_high: 0.7,
            capability_medium: 0.5,
            blend_medium: 0.4,
            capability_floor: 0.3,
            blend_floor: 0.2,
        }
    }
}

impl RoutingThresholds {
    fn ordered(&self) -> [(&'static str, f64); 7] {
        [
            ("threshold.conservative", self.conservative),
            ("threshold.capability_high", self.capability_high),
            ("threshold.blend_high", self.blend_high),
            ("threshold.capability_medium", self.capability_medium),
            ("threshold.blend_medium", self.blend_medium),
            ("threshold.capability_floor", self.capability_floor),
            ("threshold.blend_floor", self.blend_floor),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = self.ordered();
        for (key, value) in ordered {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("must be within [0, 1], got {value}"),
                });
            }
        }
        for pair in ordered.windows(2) {
            let (upper_key, upper) = pair[0];
            let (lower_key, lower) = pair[1];
            if lower > upper {
                return Err(ConfigError::InvalidValue {
                    key: lower_key.to_string(),
                    message: format!(
                        "must not exceed {upper_key} ({upper}), got {lower}"
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Everything a policy may look at.
pub struct PolicyInput<'a> {
    pub command: &'a ParsedCommand,
    pub context: Option<&'a RoutingContext>,
    pub signals: &'a SignalEstimators,
}

/// A policy's judgement on the economy provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub confidence: f64,
    pub reason: String,
    pub fallback_available: bool,
}

/// A routing strategy. Implementations are pure: no I/O, no interior state.
pub trait RoutingPolicy: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> PolicyKind;

    fn evaluate(&self, input: &PolicyInput<'_>) -> Verdict;
}

/// Build the policy named by `kind` with the given tuning.
pub fn build_policy(
    kind: PolicyKind,
    weights: &ScoringWeights,
    thresholds: &RoutingThresholds,
) -> Arc<dyn RoutingPolicy> {
    match kind {
        PolicyKind::EconomyOnly => Arc::new(EconomyOnlyPolicy),
        PolicyKind::EconomyFirst => Arc::new(EconomyFirstPolicy {
            thresholds: thresholds.clone(),
        }),
        PolicyKind::Intelligent => Arc::new(IntelligentPolicy {
            weights: weights.clone(),
            thresholds: thresholds.clone(),
        }),
        PolicyKind::Fallback => Arc::new(ConservativeFallbackPolicy {
            thresholds: thresholds.clone(),
        }),
    }
}

/// Economy provider for everything, fallback never allowed.
#[derive(Debug, Clone, Default)]
pub struct EconomyOnlyPolicy;

impl RoutingPolicy for EconomyOnlyPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::EconomyOnly
    }

    fn evaluate(&self, input: &PolicyInput<'_>) -> Verdict {
        let id = &input.command.id;
        let category = input.signals.capabilities().category_of(id);
        if category == CommandCategory::PremiumDependent {
            Verdict {
                confidence: 0.7,
                reason: format!("economy-only: attempting premium-dependent {id} on economy"),
                fallback_available: false,
            }
        } else {
            Verdict {
                confidence: 0.95,
                reason: format!("economy-only: {id} handled by economy"),
                fallback_available: false,
            }
        }
    }
}

/// Economy first; fallback enabled below the high-capability threshold.
#[derive(Debug, Clone, Default)]
pub struct EconomyFirstPolicy {
    pub thresholds: RoutingThresholds,
}

impl RoutingPolicy for EconomyFirstPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::EconomyFirst
    }

    fn evaluate(&self, input: &PolicyInput<'_>) -> Verdict {
        let id = &input.command.id;
        let capability = input.signals.capability(id);
        let t = &self.thresholds;

        if capability >= t.capability_high {
            Verdict {
                confidence: capability,
                reason: format!("economy-first: {id} well supported by economy"),
                fallback_available: false,
            }
        } else if capability >= t.capability_medium {
            Verdict {
                confidence: capability,
                reason: format!("economy-first: {id} moderately supported, trying economy"),
                fallback_available: true,
            }
        } else {
            Verdict {
                confidence: capability.max(t.capability_floor),
                reason: format!("economy-first: {id} weakly supported, trying economy anyway"),
                fallback_available: true,
            }
        }
    }
}

/// Weighted blend of all four signals.
#[derive(Debug, Clone, Default)]
pub struct IntelligentPolicy {
    pub weights: ScoringWeights,
    pub thresholds: RoutingThresholds,
}

impl IntelligentPolicy {
    /// Blended economy suitability in [0, 1].
    pub fn blended_score(&self, input: &PolicyInput<'_>) -> f64 {
        let s = input.signals;
        let w = &self.weights;
        let capability = s.capability(&input.command.id);
        let complexity = s.complexity(input.command);
        let context = s.context(input.context);
        let cost = s.cost();

        let score = w.capability * capability
            + w.complexity * (1.0 - complexity)
            + w.context * context
            + w.cost * cost;

        tracing::debug!(
            command = %input.command.id,
            capability,
            complexity,
            context,
            cost,
            score,
            "Intelligent routing score"
        );
        score.clamp(0.0, 1.0)
    }
}

impl RoutingPolicy for IntelligentPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Intelligent
    }

    // Even the lowest score stays on economy; only a failed attempt escalates.
    fn evaluate(&self, input: &PolicyInput<'_>) -> Verdict {
        let score = self.blended_score(input);
        let t = &self.thresholds;

        if score >= t.blend_high {
            Verdict {
                confidence: score,
                reason: format!("intelligent: economy recommended (score {score:.2})"),
                fallback_available: false,
            }
        } else if score >= t.blend_medium {
            Verdict {
                confidence: score,
                reason: format!("intelligent: economy preferred (score {score:.2})"),
                fallback_available: true,
            }
        } else {
            Verdict {
                confidence: score.max(t.blend_floor),
                reason: format!("intelligent: low score {score:.2}, trying economy to avoid premium"),
                fallback_available: true,
            }
        }
    }
}

/// Conservative policy: fallback stays available unless capability is very high.
#[derive(Debug, Clone, Default)]
pub struct ConservativeFallbackPolicy {
    pub thresholds: RoutingThresholds,
}

impl RoutingPolicy for ConservativeFallbackPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Fallback
    }

    fn evaluate(&self, input: &PolicyInput<'_>) -> Verdict {
        let id = &input.command.id;
        let capability = input.signals.capability(id);

        if capability >= self.thresholds.conservative {
            Verdict {
                confidence: capability,
                reason: format!("fallback: {id} highly supported by economy"),
                fallback_available: false,
            }
        } else {
            Verdict {
                confidence: capability,
                reason: format!("fallback: trying {id} on economy, premium in reserve"),
                fallback_available: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn verdict(policy: &dyn RoutingPolicy, input: &str) -> Verdict {
        verdict_with_context(policy, input, None)
    }

    fn verdict_with_context(
        policy: &dyn RoutingPolicy,
        input: &str,
        context: Option<&RoutingContext>,
    ) -> Verdict {
        let signals = SignalEstimators::default();
        let command = ParsedCommand::parse(input);
        policy.evaluate(&PolicyInput {
            command: &command,
            context,
            signals: &signals,
        })
    }

    // -- PolicyKind --

    #[test]
    fn policy_kind_parses_names_and_aliases() {
        assert_eq!("economy_only".parse::<PolicyKind>().unwrap(), PolicyKind::EconomyOnly);
        assert_eq!("Provider-A-First".parse::<PolicyKind>().unwrap(), PolicyKind::EconomyFirst);
        assert_eq!("intelligent".parse::<PolicyKind>().unwrap(), PolicyKind::Intelligent);
        assert_eq!("conservative".parse::<PolicyKind>().unwrap(), PolicyKind::Fallback);
    }

    #[test]
    fn unknown_policy_name_is_an_error() {
        let err = "round_robin".parse::<PolicyKind>().unwrap_err();
        match err {
            ConfigError::UnknownPolicy { name, expected } => {
                assert_eq!(name, "round_robin");
                assert!(expected.contains("intelligent"));
            }
            other => panic!("expected UnknownPolicy, got: {other:?}"),
        }
    }

    #[test]
    fn build_policy_reports_its_kind() {
        for kind in PolicyKind::ALL {
            let policy = build_policy(kind, &ScoringWeights::default(), &RoutingThresholds::default());
            assert_eq!(policy.kind(), kind);
        }
    }

    // -- Validation --

    #[test]
    fn default_tuning_is_valid() {
        ScoringWeights::default().validate().unwrap();
        RoutingThresholds::default().validate().unwrap();
    }

    #[test]
    fn weights_must_sum_to_one() {
        let weights = ScoringWeights {
            capability: 0.5,
            ..ScoringWeights::default()
        };
        let err = weights.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "weights"));
    }

    #[test]
    fn negative_weight_is_rejected() {
        let weights = ScoringWeights {
            capability: -0.1,
            complexity: 0.8,
            ..ScoringWeights::default()
        };
        assert!(weights.validate().is_err());
    }

    #[test]
    fn thresholds_must_decrease() {
        let thresholds = RoutingThresholds {
            blend_medium: 0.6,
            ..RoutingThresholds::default()
        };
        let err = thresholds.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "threshold.blend_medium")
        );
    }

    #[test]
    fn thresholds_must_be_in_unit_interval() {
        let thresholds = RoutingThresholds {
            conservative: 1.5,
            ..RoutingThresholds::default()
        };
        assert!(thresholds.validate().is_err());
    }

    // -- EconomyOnly --

    #[test]
    fn economy_only_never_allows_fallback() {
        for input in ["/help", "/chat hello", "/legacy-op", "/frobnicate", "/summarize x"] {
            assert!(!verdict(&EconomyOnlyPolicy, input).fallback_available, "{input}");
        }
    }

    #[test]
    fn economy_only_lowers_confidence_for_premium_dependent() {
        assert_eq!(verdict(&EconomyOnlyPolicy, "/chat").confidence, 0.7);
        assert_eq!(verdict(&EconomyOnlyPolicy, "/help").confidence, 0.95);
    }

    // -- EconomyFirst --

    #[test]
    fn economy_first_high_capability_has_no_fallback() {
        let v = verdict(&EconomyFirstPolicy::default(), "/review main.rs");
        assert!(v.confidence >= 0.8);
        assert!(!v.fallback_available);
    }

    #[test]
    fn economy_first_medium_capability_allows_fallback() {
        let v = verdict(&EconomyFirstPolicy::default(), "/summarize");
        assert_eq!(v.confidence, 0.7);
        assert!(v.fallback_available);
    }

    #[test]
    fn economy_first_unknown_command_is_medium() {
        let v = verdict(&EconomyFirstPolicy::default(), "/frobnicate");
        assert_eq!(v.confidence, 0.5);
        assert!(v.fallback_available);
    }

    #[test]
    fn economy_first_low_capability_is_floored() {
        let v = verdict(&EconomyFirstPolicy::default(), "/legacy-op");
        assert!((0.3..0.5).contains(&v.confidence), "got {}", v.confidence);
        assert!(v.fallback_available);

        let policy = EconomyFirstPolicy {
            thresholds: RoutingThresholds {
                capability_floor: 0.4,
                blend_floor: 0.2,
                ..RoutingThresholds::default()
            },
        };
        assert_eq!(verdict(&policy, "/chat").confidence, 0.4);
    }

    // -- Intelligent --

    #[test]
    fn intelligent_basic_command_is_high_confidence() {
        let v = verdict(&IntelligentPolicy::default(), "/help");
        assert!(v.confidence >= 0.85, "got {}", v.confidence);
        assert!(!v.fallback_available);
    }

    #[test]
    fn intelligent_blended_score_matches_formula() {
        // capability 0.95, complexity 0.125, context 0.8, cost 0.95
        let expected = 0.4 * 0.95 + 0.3 * 0.875 + 0.2 * 0.8 + 0.1 * 0.95;
        let v = verdict(&IntelligentPolicy::default(), "/help");
        assert!((v.confidence - expected).abs() < 1e-9);
    }

    #[test]
    fn intelligent_large_context_and_complex_input_enables_fallback() {
        let mut payload = serde_json::Map::new();
        payload.insert("history".to_string(), json!("x".repeat(2000)));
        let ctx = RoutingContext::new(payload);
        let input = format!("/chat summarize and translate {}", "word ".repeat(30));
        let v = verdict_with_context(&IntelligentPolicy::default(), &input, Some(&ctx));
        assert!(v.fallback_available);
        assert!(v.confidence >= 0.2);
        assert!(v.confidence < 0.7);
    }

    #[test]
    fn intelligent_low_score_is_floored() {
        let policy = IntelligentPolicy {
            weights: ScoringWeights {
                capability: 1.0,
                complexity: 0.0,
                context: 0.0,
                cost: 0.0,
            },
            thresholds: RoutingThresholds {
                blend_floor: 0.25,
                ..RoutingThresholds::default()
            },
        };
        // capability 0.3 -> score 0.3 < 0.4 -> floored at 0.3 (already above 0.25)
        let v = verdict(&policy, "/chat");
        assert!((v.confidence - 0.3).abs() < 1e-9);
        assert!(v.fallback_available);
    }

    #[test]
    fn intelligent_score_below_floor_is_raised_to_floor() {
        let policy = IntelligentPolicy {
            weights: ScoringWeights {
                capability: 0.5,
                complexity: 0.5,
                context: 0.0,
                cost: 0.0,
            },
            thresholds: RoutingThresholds::default(),
        };
        // capability 0.3, complexity saturated at 1.0 -> raw score 0.15
        let input = "/chat summarize translate explain analyze generate a b c d e f g h";
        let command = ParsedCommand::parse(input);
        let signals = SignalEstimators::default();
        let raw = policy.blended_score(&PolicyInput {
            command: &command,
            context: None,
            signals: &signals,
        });
        assert!((raw - 0.15).abs() < 1e-9, "got {raw}");

        let v = verdict(&policy, input);
        assert_eq!(v.confidence, 0.2);
        assert!(v.fallback_available);
    }

    // -- Fallback (conservative) --

    #[test]
    fn conservative_requires_very_high_capability_to_skip_fallback() {
        let policy = ConservativeFallbackPolicy::default();
        assert!(!verdict(&policy, "/help").fallback_available);
        assert!(!verdict(&policy, "/review").fallback_available);
        assert!(verdict(&policy, "/read").fallback_available);
        assert!(verdict(&policy, "/chat").fallback_available);
    }

    #[test]
    fn every_policy_keeps_confidence_in_bounds() {
        let inputs = [
            "/help", "/review a b c d e f g h i j k", "/chat", "/legacy-op", "/x", "/summarize",
        ];
        for kind in PolicyKind::ALL {
            let policy = build_policy(kind, &ScoringWeights::default(), &RoutingThresholds::default());
            for input in inputs {
                let v = verdict(policy.as_ref(), input);
                assert!((0.0..=1.0).contains(&v.confidence), "{kind} {input}");
                assert!(!v.reason.is_empty());
            }
        }
    }
}
