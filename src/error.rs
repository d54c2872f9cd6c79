//! Error types for cmdroute.

use std::time::Duration;

use crate::providers::Provider;

/// Top-level error type for the router.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Configuration-related errors.
///
/// These are operator mistakes and always propagate to the caller, unlike
/// command execution failures which the dispatcher absorbs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown routing policy '{name}', expected one of: {expected}")]
    UnknownPolicy { name: String, expected: String },

    #[error("Unknown policy parameter: {key}")]
    UnknownParameter { key: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of a single dispatch.
///
/// Everything except [`DispatchError::Cancelled`] is rendered into
/// `ExecutionResult::error_message` and never reaches the caller as an `Err`.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Unknown command {command}: no handler registered on any provider")]
    UnknownCommand { command: String },

    #[error("No handler for {command} on provider {provider}")]
    NoHandler { provider: Provider, command: String },

    #[error("Provider {provider} failed to execute {command}: {reason}")]
    ExecutionFailed {
        provider: Provider,
        command: String,
        reason: String,
    },

    #[error("Provider {provider} returned empty output for {command}")]
    EmptyOutput { provider: Provider, command: String },

    #[error("Provider {provider} timed out after {timeout:?} executing {command}")]
    Timeout {
        provider: Provider,
        command: String,
        timeout: Duration,
    },

    #[error("Dispatch of {command} was cancelled")]
    Cancelled { command: String },
}

impl DispatchError {
    /// Whether the next provider in the chain may be tried after this error.
    ///
    /// An unknown command and a cancellation end the call; every per-provider
    /// failure (including timeouts and missing handlers) may escalate.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DispatchError::NoHandler { .. }
                | DispatchError::ExecutionFailed { .. }
                | DispatchError::EmptyOutput { .. }
                | DispatchError::Timeout { .. }
        )
    }
}

/// Result type alias for the router.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        assert!(
            DispatchError::ExecutionFailed {
                provider: Provider::Economy,
                command: "/review".into(),
                reason: "boom".into(),
            }
            .is_recoverable()
        );
        assert!(
            DispatchError::Timeout {
                provider: Provider::Economy,
                command: "/review".into(),
                timeout: Duration::from_millis(10),
            }
            .is_recoverable()
        );
        assert!(
            DispatchError::NoHandler {
                provider: Provider::Economy,
                command: "/review".into(),
            }
            .is_recoverable()
        );
        assert!(
            DispatchError::EmptyOutput {
                provider: Provider::Economy,
                command: "/review".into(),
            }
            .is_recoverable()
        );

        assert!(
            !DispatchError::UnknownCommand {
                command: "/nope".into(),
            }
            .is_recoverable()
        );
        assert!(
            !DispatchError::Cancelled {
                command: "/review".into(),
            }
            .is_recoverable()
        );
    }

    #[test]
    fn messages_name_the_provider() {
        let err = DispatchError::ExecutionFailed {
            provider: Provider::Premium,
            command: "/chat".into(),
            reason: "upstream 502".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("premium"));
        assert!(msg.contains("/chat"));
        assert!(msg.contains("upstream 502"));
    }
}
