//! The router service: routing, dispatch and statistics behind one object.
//!
//! Each `RouterService` owns its configuration, handlers and counters, so
//! independent instances can run side by side (one per test, one per tenant).
//! Routing state is swapped copy-on-write: reconfiguration never blocks or
//! disturbs an in-flight dispatch, which keeps using the router it started with.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::RouterConfig;
use crate::dispatch::{Dispatcher, ExecutionResult};
use crate::error::{ConfigError, DispatchError};
use crate::providers::{HandlerRegistry, Provider, ProviderHandler};
use crate::routing::{
    CapabilityTable, CommandCategory, ParsedCommand, PolicyKind, Router, RoutingContext,
    RoutingDecision,
};
use crate::stats::{StatsAggregator, StatsSnapshot};

/// Router state that changes only through reconfiguration.
struct Active {
    config: RouterConfig,
    capabilities: Arc<CapabilityTable>,
    router: Router,
    dispatcher: Dispatcher,
}

impl Active {
    fn build(
        config: RouterConfig,
        capabilities: Arc<CapabilityTable>,
        registry: &Arc<HandlerRegistry>,
    ) -> Self {
        let router = Router::from_config(&config, Arc::clone(&capabilities));
        let dispatcher = Dispatcher::new(Arc::clone(registry), config.dispatch.attempt_timeout);
        Self {
            config,
            capabilities,
            router,
            dispatcher,
        }
    }
}

/// Summary of the router's configuration and counters.
#[derive(Debug, Clone, Serialize)]
pub struct RouterStatus {
    pub policy: PolicyKind,
    /// Commands with a known economy capability rating.
    pub capability_commands: usize,
    /// Commands known to depend on premium-only features.
    pub premium_dependent_commands: usize,
    pub economy_handlers: Vec<String>,
    pub premium_handlers: Vec<String>,
    pub stats: StatsSnapshot,
}

/// Explicit router object: constructed with injected configuration, no
/// global state.
pub struct RouterService {
    active: RwLock<Arc<Active>>,
    registry: Arc<HandlerRegistry>,
    stats: StatsAggregator,
}

impl RouterService {
    /// Create a service after validating `config`.
    pub fn new(config: RouterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = Arc::new(HandlerRegistry::new());
        let active = Active::build(config, Arc::new(CapabilityTable::default()), &registry);
        tracing::debug!(policy = %active.router.policy_kind(), "Router service created");
        Ok(Self {
            active: RwLock::new(Arc::new(active)),
            registry,
            stats: StatsAggregator::new(),
        })
    }

    fn active(&self) -> Arc<Active> {
        Arc::clone(&self.active.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Score `text` and decide where it would run, without executing it.
    pub fn route(&self, text: &str, context: Option<&RoutingContext>) -> RoutingDecision {
        let command = ParsedCommand::parse(text);
        self.active().router.route(&command, context)
    }

    /// Route and execute `text`.
    ///
    /// Always returns a well-formed result: provider failures, timeouts and
    /// unknown commands are reported through `error_message`. Dropping the
    /// returned future before it completes records nothing.
    pub async fn dispatch(
        &self,
        text: &str,
        args: &[String],
        forced: Option<Provider>,
    ) -> ExecutionResult {
        let cancel = CancellationToken::new();
        match self
            .dispatch_with_cancellation(text, args, forced, &cancel)
            .await
        {
            Ok(result) => result,
            // The token is local and never cancelled.
            Err(e) => ExecutionResult::failed(
                forced.unwrap_or(Provider::Economy),
                e.to_string(),
                std::time::Duration::ZERO,
                false,
            ),
        }
    }

    /// Like [`RouterService::dispatch`], but abandons the call when `cancel`
    /// fires. A cancelled call returns [`DispatchError::Cancelled`] and is not
    /// counted in the statistics.
    pub async fn dispatch_with_cancellation(
        &self,
        text: &str,
        args: &[String],
        forced: Option<Provider>,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, DispatchError> {
        let request_id = Uuid::new_v4();
        let active = self.active();
        let command = ParsedCommand::parse(text).with_args(args.iter().cloned());

        let decision = match forced {
            Some(provider) => active.router.forced(&command, provider),
            None => active.router.route(&command, None),
        };

        let span = tracing::info_span!("dispatch", %request_id, command = %command.id);
        let result = active
            .dispatcher
            .execute(&command, &decision, cancel)
            .instrument(span)
            .await
            .inspect_err(|e| {
                tracing::debug!(%request_id, error = %e, "Dispatch abandoned");
            })?;

        let cost = active
            .router
            .costs()
            .estimate(decision.estimated_tokens(), result.provider());
        self.stats.record(&result, forced.is_some(), cost);

        tracing::debug!(
            %request_id,
            command = %command.id,
            provider = %result.provider(),
            success = result.success(),
            fallback = result.fallback_used(),
            elapsed_ms = result.execution_time_ms(),
            "Dispatch completed"
        );
        Ok(result)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Switch to the policy named `name`, applying `params` overrides on top
    /// of the current configuration.
    ///
    /// Nothing changes unless the name, every parameter and the resulting
    /// configuration are valid.
    pub fn configure_policy(
        &self,
        name: &str,
        params: &HashMap<String, String>,
    ) -> Result<(), ConfigError> {
        let kind: PolicyKind = name.parse()?;

        let mut guard = self.active.write().unwrap_or_else(|e| e.into_inner());
        let mut config = guard.config.clone();
        config.policy = kind;
        config.apply_params(params)?;
        config.validate()?;

        let active = Active::build(config, Arc::clone(&guard.capabilities), &self.registry);
        *guard = Arc::new(active);
        tracing::info!(policy = %kind, overrides = params.len(), "Routing policy configured");
        Ok(())
    }

    /// Rate additional commands as belonging to `category`.
    pub fn extend_capabilities<I, S>(&self, category: CommandCategory, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut guard = self.active.write().unwrap_or_else(|e| e.into_inner());
        let table = Arc::new(guard.capabilities.with_commands(category, commands));
        tracing::info!(
            %category,
            commands = table.command_count(),
            "Capability table extended"
        );
        let active = Active::build(guard.config.clone(), table, &self.registry);
        *guard = Arc::new(active);
    }

    pub fn register_handler(
        &self,
        provider: Provider,
        command: impl Into<String>,
        handler: Arc<dyn ProviderHandler>,
    ) {
        self.registry.register(provider, command, handler);
    }

    /// Register a handler for every command `provider` has no specific handler for.
    pub fn register_default_handler(&self, provider: Provider, handler: Arc<dyn ProviderHandler>) {
        self.registry.register_default(provider, handler);
    }

    pub fn policy(&self) -> PolicyKind {
        self.active().router.policy_kind()
    }

    /// Copy of the active configuration.
    pub fn config(&self) -> RouterConfig {
        self.active().config.clone()
    }

    pub fn status(&self) -> RouterStatus {
        let active = self.active();
        RouterStatus {
            policy: active.router.policy_kind(),
            capability_commands: active.capabilities.command_count(),
            premium_dependent_commands: active.capabilities.premium_dependent_count(),
            economy_handlers: self.registry.commands(Provider::Economy),
            premium_handlers: self.registry.commands(Provider::Premium),
            stats: self.stats.snapshot(),
        }
    }
}
