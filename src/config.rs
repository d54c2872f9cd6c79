//! Configuration for the command router.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::routing::{CostModel, PolicyKind, RoutingThresholds, ScoringWeights, SignalConfig};

/// Main router configuration.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub policy: PolicyKind,
    pub weights: ScoringWeights,
    pub thresholds: RoutingThresholds,
    pub costs: CostModel,
    pub signals: SignalConfig,
    pub dispatch: DispatchConfig,
}

/// Execution settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Timeout of a single provider attempt. Accepts "500ms", "30s", "2m".
    #[serde(deserialize_with = "deserialize_duration")]
    pub attempt_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.attempt_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "dispatch.attempt_timeout_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl RouterConfig {
    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        let policy = optional_env("CMDROUTE_POLICY")?
            .map(|s| s.parse::<PolicyKind>())
            .transpose()?
            .unwrap_or(defaults.policy);
        let attempt_timeout_ms = parse_optional_env(
            "CMDROUTE_ATTEMPT_TIMEOUT_MS",
            defaults.dispatch.attempt_timeout.as_millis() as u64,
        )?;
        let costs = CostModel {
            economy_unit_cost: parse_optional_env(
                "CMDROUTE_ECONOMY_UNIT_COST",
                defaults.costs.economy_unit_cost,
            )?,
            premium_unit_cost: parse_optional_env(
                "CMDROUTE_PREMIUM_UNIT_COST",
                defaults.costs.premium_unit_cost,
            )?,
            ..defaults.costs.clone()
        };

        let config = Self {
            policy,
            costs,
            dispatch: DispatchConfig {
                attempt_timeout: Duration::from_millis(attempt_timeout_ms),
            },
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: RouterConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        self.thresholds.validate()?;
        self.costs.validate()?;
        self.signals.validate()?;
        self.dispatch.validate()
    }

    /// Apply named overrides such as `weight.capability = 0.5`.
    ///
    /// Does not validate; call [`RouterConfig::validate`] once every
    /// override is in place (weights only sum to 1.0 as a set).
    pub fn apply_params(&mut self, params: &HashMap<String, String>) -> Result<(), ConfigError> {
        let mut keys: Vec<&String> = params.keys().collect();
        keys.sort();
        for key in keys {
            self.apply_param(key, &params[key])?;
        }
        Ok(())
    }

    fn apply_param(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let w = &mut self.weights;
        let t = &mut self.thresholds;
        match key {
            "weight.capability" => w.capability = parse_param(key, value)?,
            "weight.complexity" => w.complexity = parse_param(key, value)?,
            "weight.context" => w.context = parse_param(key, value)?,
            "weight.cost" => w.cost = parse_param(key, value)?,
            "threshold.conservative" => t.conservative = parse_param(key, value)?,
            "threshold.capability_high" => t.capability_high = parse_param(key, value)?,
            "threshold.blend_high" => t.blend_high = parse_param(key, value)?,
            "threshold.capability_medium" => t.capability_medium = parse_param(key, value)?,
            "threshold.blend_medium" => t.blend_medium = parse_param(key, value)?,
            "threshold.capability_floor" => t.capability_floor = parse_param(key, value)?,
            "threshold.blend_floor" => t.blend_floor = parse_param(key, value)?,
            "cost.economy_unit_cost" => {
                self.costs.economy_unit_cost = parse_param::<Decimal>(key, value)?
            }
            "cost.premium_unit_cost" => {
                self.costs.premium_unit_cost = parse_param::<Decimal>(key, value)?
            }
            "cost.tokens_per_word" => self.costs.tokens_per_word = parse_param(key, value)?,
            "signal.cost_efficiency" => self.signals.cost_efficiency = parse_param(key, value)?,
            "dispatch.attempt_timeout_ms" => {
                self.dispatch.attempt_timeout =
                    Duration::from_millis(parse_param(key, value)?)
            }
            _ => {
                return Err(ConfigError::UnknownParameter {
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn parse_param<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{e}"),
    })
}

/// Deserialize a duration from a string like "500ms", "30s" or "2m".
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| format!("invalid milliseconds: {e}"))
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| format!("invalid seconds: {e}"))
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid minutes: {e}"))
            .and_then(|m| {
                m.checked_mul(60)
                    .map(Duration::from_secs)
                    .ok_or_else(|| format!("duration of {m} minutes is too large"))
            })
    } else {
        // Bare numbers are seconds
        s.parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| format!("invalid duration '{s}': {e}"))
    }
}

pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if val.is_empty() => Ok(None),
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::ParseError(format!(
            "failed to read {key}: {e}"
        ))),
    }
}

pub(crate) fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)?
        .map(|s| {
            s.parse().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{e}"),
            })
        })
        .transpose()
        .map(|opt| opt.unwrap_or(default))
}
