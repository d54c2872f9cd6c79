//! Provider handler trait and closure adapter.

use std::future::Future;

use async_trait::async_trait;

/// Error returned by a provider handler.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProviderError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// Executes one command on one provider.
///
/// Implementations may perform I/O. The dispatcher owns timeouts and
/// cancellation, so handlers do not need to enforce their own.
#[async_trait]
pub trait ProviderHandler: Send + Sync {
    /// Run `command` with `args`, returning the textual result.
    async fn handle(&self, command: &str, args: &[String]) -> Result<String, ProviderError>;
}

/// Adapts an async closure into a [`ProviderHandler`].
///
/// ```rust,ignore
/// let handler = FnHandler::new(|command, args| async move {
///     Ok(format!("{command} {}", args.join(" ")))
/// });
/// ```
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> ProviderHandler for FnHandler<F>
where
    F: Fn(String, Vec<String>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, ProviderError>> + Send + 'static,
{
    async fn handle(&self, command: &str, args: &[String]) -> Result<String, ProviderError> {
        (self.f)(command.to_string(), args.to_vec()).await
    }
}
