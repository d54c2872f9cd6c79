//! cmdroute: command routing and dispatch between an economy and a premium
//! provider.
//!
//! Every command is routed to the economy provider first. Routing policies
//! only decide how confident that choice is and whether a failed attempt may
//! escalate to the premium provider (at most once). [`RouterService`] is the
//! entry point: it routes, dispatches, and keeps aggregate statistics.
//!
//! ```rust,ignore
//! let service = RouterService::new(RouterConfig::default())?;
//! service.register_handler(Provider::Economy, "/help", Arc::new(my_handler));
//! let result = service.dispatch("/help", &[], None).await;
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod providers;
pub mod routing;
pub mod service;
pub mod stats;
pub mod testing;

pub use config::{DispatchConfig, RouterConfig};
pub use dispatch::{Dispatcher, ExecutionResult};
pub use error::{ConfigError, DispatchError, Error, Result};
pub use providers::{FnHandler, HandlerRegistry, Provider, ProviderError, ProviderHandler};
pub use routing::{ParsedCommand, PolicyKind, Router, RoutingContext, RoutingDecision};
pub use service::{RouterService, RouterStatus};
pub use stats::{StatsAggregator, StatsSnapshot};
