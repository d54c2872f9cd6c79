//! Aggregated dispatch statistics.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::dispatch::ExecutionResult;
use crate::providers::Provider;

/// Point-in-time copy of the router's counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub economy_count: u64,
    pub premium_count: u64,
    pub fallback_count: u64,
    pub error_count: u64,
    /// Dispatches whose provider was forced by the caller.
    pub forced_count: u64,
    /// Incremental mean of dispatch wall time over all recorded dispatches.
    pub average_latency_ms: f64,
    /// Estimated cost accumulated on the providers that executed.
    pub estimated_cost: Decimal,
    /// Fraction of dispatches served by the economy provider.
    pub preference_rate: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Counters {
    total_requests: u64,
    economy_count: u64,
    premium_count: u64,
    fallback_count: u64,
    error_count: u64,
    forced_count: u64,
    average_latency_ms: f64,
    estimated_cost: Decimal,
    last_updated: Option<DateTime<Utc>>,
}

/// Thread-safe aggregator. One mutex guards every counter so a snapshot is
/// never torn.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    inner: Mutex<Counters>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed dispatch.
    pub fn record(&self, result: &ExecutionResult, forced: bool, cost: Decimal) {
        let mut c = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        c.total_requests += 1;
        match result.provider() {
            Provider::Economy => c.economy_count += 1,
            Provider::Premium => c.premium_count += 1,
        }
        if result.fallback_used() {
            c.fallback_count += 1;
        }
        if !result.success() {
            c.error_count += 1;
        }
        if forced {
            c.forced_count += 1;
        }
        let elapsed_ms = result.elapsed().as_secs_f64() * 1000.0;
        c.average_latency_ms += (elapsed_ms - c.average_latency_ms) / c.total_requests as f64;
        c.estimated_cost += cost;
        c.last_updated = Some(Utc::now());
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let c = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let preference_rate = if c.total_requests == 0 {
            0.0
        } else {
            c.economy_count as f64 / c.total_requests as f64
        };
        StatsSnapshot {
            total_requests: c.total_requests,
            economy_count: c.economy_count,
            premium_count: c.premium_count,
            fallback_count: c.fallback_count,
            error_count: c.error_count,
            forced_count: c.forced_count,
            average_latency_ms: c.average_latency_ms,
            estimated_cost: c.estimated_cost,
            preference_rate,
            last_updated: c.last_updated,
        }
    }

    pub fn reset(&self) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = Counters::default();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rust_decimal_macros::dec;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::dispatch::Dispatcher;
    use crate::providers::HandlerRegistry;
    use crate::routing::{ParsedCommand, Router};
    use crate::testing::StubHandler;

    async fn run(economy: StubHandler, premium: StubHandler, input: &str) -> ExecutionResult {
        let registry = Arc::new(HandlerRegistry::new());
        registry.register(Provider::Economy, "/summarize", Arc::new(economy));
        registry.register(Provider::Premium, "/summarize", Arc::new(premium));
        let dispatcher = Dispatcher::new(registry, Duration::from_secs(1));
        let command = ParsedCommand::parse(input);
        let decision = Router::default().route(&command, None);
        dispatcher
            .execute(&command, &decision, &CancellationToken::new())
            .await
            .unwrap()
    }

    #[test]
    fn empty_snapshot() {
        let stats = StatsAggregator::new();
        let snap = stats.snapshot();
        assert_eq!(snap.total_requests, 0);
        assert_eq!(snap.preference_rate, 0.0);
        assert!(snap.last_updated.is_none());
    }

    #[tokio::test]
    async fn counts_provider_fallback_and_errors() {
        let stats = StatsAggregator::new();

        let ok = run(StubHandler::succeeding("ok"), StubHandler::succeeding("p"), "/summarize a").await;
        stats.record(&ok, false, dec!(0.0006));

        let fell_back = run(StubHandler::failing("x"), StubHandler::succeeding("p"), "/summarize a").await;
        stats.record(&fell_back, false, dec!(0.018));

        let failed = run(StubHandler::failing("x"), StubHandler::failing("y"), "/summarize a").await;
        stats.record(&failed, false, dec!(0.018));

        let snap = stats.snapshot();
        assert_eq!(snap.total_requests, 3);
        assert_eq!(snap.economy_count, 1);
        assert_eq!(snap.premium_count, 2);
        assert_eq!(snap.fallback_count, 2);
        assert_eq!(snap.error_count, 1);
        assert_eq!(snap.forced_count, 0);
        assert_eq!(snap.estimated_cost, dec!(0.0366));
        assert!((snap.preference_rate - 1.0 / 3.0).abs() < 1e-9);
        assert!(snap.last_updated.is_some());
    }

    #[tokio::test]
    async fn average_latency_is_incremental_mean() {
        let stats = StatsAggregator::new();
        let mut samples = Vec::new();
        for _ in 0..4 {
            let result = run(
                StubHandler::succeeding("ok").with_delay(Duration::from_millis(5)),
                StubHandler::succeeding("p"),
                "/summarize",
            )
            .await;
            samples.push(result.elapsed().as_secs_f64() * 1000.0);
            stats.record(&result, false, Decimal::ZERO);
        }
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!((stats.snapshot().average_latency_ms - mean).abs() < 1e-6);
    }

    #[tokio::test]
    async fn snapshots_are_stable_and_reset_clears() {
        let stats = StatsAggregator::new();
        let ok = run(StubHandler::succeeding("ok"), StubHandler::succeeding("p"), "/summarize").await;
        stats.record(&ok, true, Decimal::ZERO);

        assert_eq!(stats.snapshot(), stats.snapshot());
        assert_eq!(stats.snapshot().forced_count, 1);

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }
}
