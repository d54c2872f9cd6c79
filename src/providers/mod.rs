//! Execution providers and the handlers that run commands on them.
//!
//! Two providers exist:
//! - **Economy**: the low-cost, fast backend. Every routing policy targets it first.
//! - **Premium**: the expensive backend, reached only through fallback or an
//!   explicit caller override.
//!
//! Handlers are registered per `(provider, command)` pair in a
//! [`HandlerRegistry`]; a provider may also carry a default handler that
//! serves any command without a specific registration.

pub mod builtin;
mod handler;
mod registry;

pub use handler::{FnHandler, ProviderError, ProviderHandler};
pub use registry::HandlerRegistry;

use serde::{Deserialize, Serialize};

/// A backend capable of executing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Low-cost, fast provider (preferred).
    Economy,
    /// Premium provider, used as the fallback target.
    Premium,
}

impl Provider {
    /// The provider a failed attempt on `self` escalates to, if any.
    pub fn fallback(self) -> Option<Provider> {
        match self {
            Provider::Economy => Some(Provider::Premium),
            Provider::Premium => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Economy => "economy",
            Provider::Premium => "premium",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "economy" | "cheap" | "a" | "provider_a" | "provider-a" => Ok(Self::Economy),
            "premium" | "primary" | "b" | "provider_b" | "provider-b" => Ok(Self::Premium),
            _ => Err(format!(
                "invalid provider '{}', expected one of: economy, premium",
                s
            )),
        }
    }
}
