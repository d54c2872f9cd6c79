//! Test doubles for provider handlers.
//!
//! Public so integration tests under `tests/` can build a router without
//! real backends.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::providers::{ProviderError, ProviderHandler};

#[derive(Debug, Clone)]
enum Behavior {
    Succeed,
    Fail(String),
    FailFirstN(u32),
    FailEvery(u32),
    FailOnArg(String),
    Empty,
}

/// Configurable stub handler that counts its calls.
#[derive(Debug)]
pub struct StubHandler {
    output: String,
    behavior: Behavior,
    delay: Option<Duration>,
    calls: AtomicU32,
}

impl StubHandler {
    fn new(output: impl Into<String>, behavior: Behavior) -> Self {
        Self {
            output: output.into(),
            behavior,
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Always returns `output`.
    pub fn succeeding(output: impl Into<String>) -> Self {
        Self::new(output, Behavior::Succeed)
    }

    /// Always fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self::new(String::new(), Behavior::Fail(reason.into()))
    }

    /// Fails the first `n` calls, then returns `output`.
    pub fn failing_first_n(n: u32, output: impl Into<String>) -> Self {
        Self::new(output, Behavior::FailFirstN(n))
    }

    /// Fails every `n`th call (the `n`th, `2n`th, ...), otherwise returns `output`.
    pub fn failing_every(n: u32, output: impl Into<String>) -> Self {
        Self::new(output, Behavior::FailEvery(n.max(1)))
    }

    /// Fails whenever `marker` appears among the arguments.
    pub fn failing_on_arg(marker: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(output, Behavior::FailOnArg(marker.into()))
    }

    /// Succeeds with an empty string.
    pub fn empty() -> Self {
        Self::new(String::new(), Behavior::Empty)
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times `handle` was entered.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderHandler for StubHandler {
    async fn handle(&self, command: &str, args: &[String]) -> Result<String, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let fail = match &self.behavior {
            Behavior::Succeed | Behavior::Empty => None,
            Behavior::Fail(reason) => Some(reason.clone()),
            Behavior::FailFirstN(n) => (call <= *n).then(|| format!("stub failure {call}")),
            Behavior::FailEvery(n) => (call % n == 0).then(|| format!("stub failure {call}")),
            Behavior::FailOnArg(marker) => args
                .iter()
                .any(|a| a == marker)
                .then(|| format!("{command} rejected {marker}")),
        };

        match fail {
            Some(reason) => Err(ProviderError::failed(reason)),
            None if matches!(self.behavior, Behavior::Empty) => Ok(String::new()),
            None => Ok(self.output.clone()),
        }
    }
}
