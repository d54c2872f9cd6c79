//! Per-provider unit costs.
//!
//! Costs are per estimated token, in USD, as `Decimal` to avoid float drift
//! when totals are accumulated across many dispatches.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::providers::Provider;
use crate::routing::ParsedCommand;

/// Converts estimated token counts into estimated cost per provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    /// Cost per token on the economy provider.
    pub economy_unit_cost: Decimal,
    /// Cost per token on the premium provider (default: 30x economy).
    pub premium_unit_cost: Decimal,
    /// Token estimate per whitespace-delimited word.
    pub tokens_per_word: u32,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            economy_unit_cost: dec!(0.0001),
            premium_unit_cost: dec!(0.003),
            tokens_per_word: 3,
        }
    }
}

impl CostModel {
    pub fn unit_cost(&self, provider: Provider) -> Decimal {
        match provider {
            Provider::Economy => self.economy_unit_cost,
            Provider::Premium => self.premium_unit_cost,
        }
    }

    /// Rough token estimate for a command.
    pub fn estimate_tokens(&self, command: &ParsedCommand) -> u64 {
        command.token_count() as u64 * u64::from(self.tokens_per_word)
    }

    /// Estimated cost of `tokens` on `provider`.
    pub fn estimate(&self, tokens: u64, provider: Provider) -> Decimal {
        Decimal::from(tokens) * self.unit_cost(provider)
    }

    /// How many times more expensive premium is than economy.
    ///
    /// Returns `None` when economy is free.
    pub fn premium_ratio(&self) -> Option<Decimal> {
        if self.economy_unit_cost.is_zero() {
            None
        } else {
            Some(self.premium_unit_cost / self.economy_unit_cost)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("cost.economy_unit_cost", self.economy_unit_cost),
            ("cost.premium_unit_cost", self.premium_unit_cost),
        ] {
            if value.is_sign_negative() {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("must be non-negative, got {value}"),
                });
            }
        }
        Ok(())
    }
}
