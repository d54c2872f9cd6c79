//! Combines a policy, the signal estimators and the cost model into
//! [`RoutingDecision`]s.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::RouterConfig;
use crate::providers::Provider;
use crate::routing::costs::CostModel;
use crate::routing::policy::{build_policy, PolicyInput, PolicyKind, RoutingPolicy};
use crate::routing::signals::{CapabilityTable, RoutingContext, SignalEstimators};
use crate::routing::ParsedCommand;

/// Result of routing a command. Built once per call and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    target: Provider,
    confidence: f64,
    reason: String,
    estimated_tokens: u64,
    estimated_cost: Decimal,
    fallback_available: bool,
}

impl RoutingDecision {
    fn new(
        target: Provider,
        confidence: f64,
        reason: String,
        estimated_tokens: u64,
        estimated_cost: Decimal,
        fallback_available: bool,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            target,
            confidence,
            reason,
            estimated_tokens,
            estimated_cost: estimated_cost.max(Decimal::ZERO),
            fallback_available,
        }
    }

    /// Provider for the first execution attempt.
    pub fn target(&self) -> Provider {
        self.target
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn estimated_tokens(&self) -> u64 {
        self.estimated_tokens
    }

    /// Estimated cost on the target provider.
    pub fn estimated_cost(&self) -> Decimal {
        self.estimated_cost
    }

    /// Whether a failed attempt may escalate to the premium provider.
    pub fn fallback_available(&self) -> bool {
        self.fallback_available
    }
}

/// Routes commands with one policy. Pure: no I/O and no mutable state.
#[derive(Debug, Clone)]
pub struct Router {
    policy: Arc<dyn RoutingPolicy>,
    signals: SignalEstimators,
    costs: CostModel,
}

impl Router {
    pub fn new(policy: Arc<dyn RoutingPolicy>, signals: SignalEstimators, costs: CostModel) -> Self {
        Self {
            policy,
            signals,
            costs,
        }
    }

    /// Build a router for `config` over the given capability table.
    pub fn from_config(config: &RouterConfig, capabilities: Arc<CapabilityTable>) -> Self {
        Self::new(
            build_policy(config.policy, &config.weights, &config.thresholds),
            SignalEstimators::new(capabilities, config.signals.clone()),
            config.costs.clone(),
        )
    }

    pub fn policy_kind(&self) -> PolicyKind {
        self.policy.kind()
    }

    pub fn signals(&self) -> &SignalEstimators {
        &self.signals
    }

    pub fn costs(&self) -> &CostModel {
        &self.costs
    }

    /// Decide where `command` runs first.
    ///
    /// Free-text input (anything not starting with `/`) bypasses the policy
    /// and goes to the economy provider without fallback.
    pub fn route(&self, command: &ParsedCommand, context: Option<&RoutingContext>) -> RoutingDecision {
        let tokens = self.costs.estimate_tokens(command);
        let cost = self.costs.estimate(tokens, Provider::Economy);

        if !command.is_slash_command() {
            return RoutingDecision::new(
                Provider::Economy,
                0.9,
                "free-text input handled by economy provider".to_string(),
                tokens,
                cost,
                false,
            );
        }

        let verdict = self.policy.evaluate(&PolicyInput {
            command,
            context,
            signals: &self.signals,
        });

        tracing::debug!(
            command = %command.id,
            policy = %self.policy.kind(),
            confidence = verdict.confidence,
            fallback = verdict.fallback_available,
            "Routing decision"
        );

        RoutingDecision::new(
            Provider::Economy,
            verdict.confidence,
            verdict.reason,
            tokens,
            cost,
            verdict.fallback_available,
        )
    }

    /// Decision for a caller-forced provider: full confidence, no fallback.
    pub fn forced(&self, command: &ParsedCommand, provider: Provider) -> RoutingDecision {
        let tokens = self.costs.estimate_tokens(command);
        RoutingDecision::new(
            provider,
            1.0,
            format!("provider {provider} forced by caller"),
            tokens,
            self.costs.estimate(tokens, provider),
            false,
        )
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::from_config(&RouterConfig::default(), Arc::new(CapabilityTable::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn router_with(kind: PolicyKind) -> Router {
        let config = RouterConfig {
            policy: kind,
            ..RouterConfig::default()
        };
        Router::from_config(&config, Arc::new(CapabilityTable::default()))
    }

    #[test]
    fn default_router_is_economy_first() {
        assert_eq!(Router::default().policy_kind(), PolicyKind::EconomyFirst);
    }

    #[test]
    fn every_policy_targets_economy_first() {
        for kind in PolicyKind::ALL {
            let router = router_with(kind);
            for input in ["/help", "/chat", "/legacy-op", "/summarize a long text"] {
                let decision = router.route(&ParsedCommand::parse(input), None);
                assert_eq!(decision.target(), Provider::Economy, "{kind} {input}");
            }
        }
    }

    #[test]
    fn help_under_intelligent_is_confident_without_fallback() {
        let decision = router_with(PolicyKind::Intelligent).route(&ParsedCommand::parse("/help"), None);
        assert_eq!(decision.target(), Provider::Economy);
        assert!(decision.confidence() >= 0.85);
        assert!(!decision.fallback_available());
    }

    #[test]
    fn legacy_op_under_economy_first_is_low_confidence_with_fallback() {
        let decision =
            router_with(PolicyKind::EconomyFirst).route(&ParsedCommand::parse("/legacy-op"), None);
        assert!((0.3..0.5).contains(&decision.confidence()));
        assert!(decision.fallback_available());
    }

    #[test]
    fn free_text_bypasses_policy() {
        let decision = router_with(PolicyKind::Fallback)
            .route(&ParsedCommand::parse("what does this function do"), None);
        assert_eq!(decision.target(), Provider::Economy);
        assert_eq!(decision.confidence(), 0.9);
        assert!(!decision.fallback_available());
        assert!(decision.reason().contains("free-text"));
    }

    #[test]
    fn decision_estimates_tokens_and_cost() {
        let decision = Router::default().route(&ParsedCommand::parse("/review a.rs b.rs"), None);
        assert_eq!(decision.estimated_tokens(), 9);
        assert_eq!(decision.estimated_cost(), dec!(0.0009));
    }

    #[test]
    fn forced_decision_uses_requested_provider() {
        let decision = Router::default().forced(&ParsedCommand::parse("/review a.rs"), Provider::Premium);
        assert_eq!(decision.target(), Provider::Premium);
        assert_eq!(decision.confidence(), 1.0);
        assert!(!decision.fallback_available());
        assert_eq!(decision.estimated_cost(), dec!(0.018));
    }

    #[test]
    fn confidence_is_clamped() {
        let decision = RoutingDecision::new(
            Provider::Economy,
            1.7,
            "test".to_string(),
            0,
            dec!(-1),
            false,
        );
        assert_eq!(decision.confidence(), 1.0);
        assert_eq!(decision.estimated_cost(), Decimal::ZERO);

        let nan = RoutingDecision::new(Provider::Economy, f64::NAN, "test".into(), 0, Decimal::ZERO, false);
        assert_eq!(nan.confidence(), 0.0);
    }
}
