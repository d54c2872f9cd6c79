//! Built-in handlers used by the CLI and demos.

use async_trait::async_trait;

use super::{Provider, ProviderError, ProviderHandler};

/// Echoes the command back, tagged with the provider that ran it.
pub struct EchoHandler {
    provider: Provider,
}

impl EchoHandler {
    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ProviderHandler for EchoHandler {
    async fn handle(&self, command: &str, args: &[String]) -> Result<String, ProviderError> {
        let mut output = format!("{} handled {}", self.provider, command);
        if !args.is_empty() {
            output.push_str(&format!(" (args: {})", args.join(", ")));
        }
        Ok(output)
    }
}
