//! Command execution with per-attempt timeout, cancellation and at most one
//! fallback hop.
//!
//! The dispatcher is the error boundary for command execution: every
//! provider failure ends up in [`ExecutionResult::error_message`]. The only
//! `Err` it returns is [`DispatchError::Cancelled`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;
use crate::providers::{HandlerRegistry, Provider};
use crate::routing::{ParsedCommand, RoutingDecision};

/// Outcome of one dispatch.
///
/// `success` implies non-empty `output` and no `error_message`; a failure
/// always carries an `error_message`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    success: bool,
    output: String,
    provider: Provider,
    execution_time_ms: u64,
    #[serde(skip)]
    elapsed: Duration,
    error_message: Option<String>,
    fallback_used: bool,
}

impl ExecutionResult {
    fn succeeded(provider: Provider, output: String, elapsed: Duration, fallback_used: bool) -> Self {
        Self {
            success: true,
            output,
            provider,
            execution_time_ms: elapsed.as_millis() as u64,
            elapsed,
            error_message: None,
            fallback_used,
        }
    }

    pub(crate) fn failed(provider: Provider, message: String, elapsed: Duration, fallback_used: bool) -> Self {
        Self {
            success: false,
            output: String::new(),
            provider,
            execution_time_ms: elapsed.as_millis() as u64,
            elapsed,
            error_message: Some(message),
            fallback_used,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    /// Provider that produced this result (the fallback target if one was used).
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Wall time of the whole attempt sequence, in whole milliseconds.
    pub fn execution_time_ms(&self) -> u64 {
        self.execution_time_ms
    }

    /// Wall time of the whole attempt sequence.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn fallback_used(&self) -> bool {
        self.fallback_used
    }
}

/// Runs routed commands against registered provider handlers.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    attempt_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, attempt_timeout: Duration) -> Self {
        Self {
            registry,
            attempt_timeout,
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Execute `command` according to `decision`.
    ///
    /// Tries `decision.target()` first. If that attempt fails recoverably and
    /// the decision allows fallback, tries the target's fallback provider
    /// once. Returns `Err` only when `cancel` fires before any attempt
    /// succeeds.
    pub async fn execute(
        &self,
        command: &ParsedCommand,
        decision: &RoutingDecision,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, DispatchError> {
        let start = Instant::now();
        let primary = decision.target();

        if cancel.is_cancelled() {
            return Err(cancelled(command));
        }

        // Blank input has no command id and never reaches a handler, not
        // even a provider's default one.
        if command.is_empty() || !self.registry.is_known(&command.id) {
            let err = DispatchError::UnknownCommand {
                command: command.id.clone(),
            };
            tracing::warn!(command = %command.id, "Dispatch failed: {}", err);
            return Ok(ExecutionResult::failed(
                primary,
                err.to_string(),
                start.elapsed(),
                false,
            ));
        }

        let err = match self.attempt(primary, command, cancel).await {
            Ok(output) => {
                return Ok(ExecutionResult::succeeded(
                    primary,
                    output,
                    start.elapsed(),
                    false,
                ));
            }
            Err(e @ DispatchError::Cancelled { .. }) => return Err(e),
            Err(e) => e,
        };

        let next = primary
            .fallback()
            .filter(|_| decision.fallback_available() && err.is_recoverable());
        let Some(next) = next else {
            tracing::warn!(
                command = %command.id,
                provider = %primary,
                error = %err,
                "Dispatch failed, no fallback available"
            );
            return Ok(ExecutionResult::failed(
                primary,
                err.to_string(),
                start.elapsed(),
                false,
            ));
        };

        tracing::warn!(
            command = %command.id,
            provider = %primary,
            error = %err,
            next_provider = %next,
            "Provider attempt failed, falling back"
        );

        if cancel.is_cancelled() {
            return Err(cancelled(command));
        }

        match self.attempt(next, command, cancel).await {
            Ok(output) => Ok(ExecutionResult::succeeded(
                next,
                output,
                start.elapsed(),
                true,
            )),
            Err(e @ DispatchError::Cancelled { .. }) => Err(e),
            Err(fallback_err) => {
                tracing::warn!(
                    command = %command.id,
                    provider = %next,
                    error = %fallback_err,
                    "Fallback attempt failed"
                );
                Ok(ExecutionResult::failed(
                    next,
                    format!("{err}; fallback: {fallback_err}"),
                    start.elapsed(),
                    true,
                ))
            }
        }
    }

    /// One attempt on one provider. No lock is held while the handler runs.
    async fn attempt(
        &self,
        provider: Provider,
        command: &ParsedCommand,
        cancel: &CancellationToken,
    ) -> Result<String, DispatchError> {
        let handler = self
            .registry
            .resolve(provider, &command.id)
            .ok_or_else(|| DispatchError::NoHandler {
                provider,
                command: command.id.clone(),
            })?;

        let start = Instant::now();
        let result = tokio::select! {
            biased;
            result = tokio::time::timeout(
                self.attempt_timeout,
                handler.handle(&command.id, &command.args),
            ) => result,
            _ = cancel.cancelled() => {
                tracing::debug!(command = %command.id, %provider, "Attempt cancelled");
                return Err(cancelled(command));
            }
        };
        let elapsed = start.elapsed();

        match result {
            Ok(Ok(output)) if output.trim().is_empty() => {
                tracing::debug!(
                    command = %command.id,
                    %provider,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Attempt returned empty output"
                );
                Err(DispatchError::EmptyOutput {
                    provider,
                    command: command.id.clone(),
                })
            }
            Ok(Ok(output)) => {
                tracing::debug!(
                    command = %command.id,
                    %provider,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Attempt succeeded"
                );
                Ok(output)
            }
            Ok(Err(e)) => {
                tracing::debug!(
                    command = %command.id,
                    %provider,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "Attempt failed"
                );
                Err(DispatchError::ExecutionFailed {
                    provider,
                    command: command.id.clone(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                tracing::debug!(
                    command = %command.id,
                    %provider,
                    elapsed_ms = elapsed.as_millis() as u64,
                    timeout_ms = self.attempt_timeout.as_millis() as u64,
                    "Attempt timed out"
                );
                Err(DispatchError::Timeout {
                    provider,
                    command: command.id.clone(),
                    timeout: self.attempt_timeout,
                })
            }
        }
    }
}

fn cancelled(command: &ParsedCommand) -> DispatchError {
    DispatchError::Cancelled {
        command: command.id.clone(),
    }
}
