//! Handler lookup keyed by `(provider, command)`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{Provider, ProviderHandler};

/// Registry of provider handlers.
///
/// Lookups clone the handler `Arc` and release the lock immediately, so no
/// lock is ever held while a handler runs.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<(Provider, String), Arc<dyn ProviderHandler>>>,
    defaults: RwLock<HashMap<Provider, Arc<dyn ProviderHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `command` on `provider`, replacing any previous one.
    pub fn register(
        &self,
        provider: Provider,
        command: impl Into<String>,
        handler: Arc<dyn ProviderHandler>,
    ) {
        let command = command.into().trim().to_string();
        tracing::debug!(%provider, command = %command, "Registering provider handler");
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((provider, command), handler);
    }

    /// Register a handler serving every command `provider` has no specific handler for.
    pub fn register_default(&self, provider: Provider, handler: Arc<dyn ProviderHandler>) {
        tracing::debug!(%provider, "Registering default provider handler");
        self.defaults
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(provider, handler);
    }

    /// Find the handler for `command` on `provider`, falling back to the
    /// provider's default handler.
    pub fn resolve(&self, provider: Provider, command: &str) -> Option<Arc<dyn ProviderHandler>> {
        let specific = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(provider, command.to_string()))
            .cloned();
        specific.or_else(|| {
            self.defaults
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .get(&provider)
                .cloned()
        })
    }

    /// Whether any provider can serve `command`.
    pub fn is_known(&self, command: &str) -> bool {
        [Provider::Economy, Provider::Premium]
            .into_iter()
            .any(|p| self.resolve(p, command).is_some())
    }

    /// Commands with a specific handler on `provider`, sorted.
    pub fn commands(&self, provider: Provider) -> Vec<String> {
        let mut commands: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .filter(|(p, _)| *p == provider)
            .map(|(_, c)| c.clone())
            .collect();
        commands.sort();
        commands
    }
}
