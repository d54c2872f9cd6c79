//! Command routing: decide which provider runs a command first.
//!
//! # Architecture
//!
//! ```text
//! Raw input
//!     │
//!     ▼
//! ┌──────────────────┐
//! │    Tokenizer     │  ← command id + args
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Signal estimators│  ← capability, complexity, context, cost
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  Routing policy  │  ← economy_only / economy_first / intelligent / fallback
//! └────────┬─────────┘
//!          ▼
//!   RoutingDecision (+ CostModel estimate)
//! ```
//!
//! Routing is synchronous and pure. Execution and fallback live in
//! [`crate::dispatch`].

pub mod costs;
pub mod policy;
mod router;
pub mod signals;
mod tokenizer;

pub use costs::CostModel;
pub use policy::{
    build_policy, ConservativeFallbackPolicy, EconomyFirstPolicy, EconomyOnlyPolicy,
    IntelligentPolicy, PolicyInput, PolicyKind, RoutingPolicy, RoutingThresholds, ScoringWeights,
    Verdict,
};
pub use router::{Router, RoutingDecision};
pub use signals::{
    complexity_score, context_score, CapabilityTable, CommandCategory, RoutingContext,
    SignalConfig, SignalEstimators,
};
pub use tokenizer::ParsedCommand;
