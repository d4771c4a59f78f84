pub mod github;
pub mod goatcounter;

use std::time::Duration;

use async_trait::async_trait;

use crate::types::{FetchOutcome, MetricWindow};

/// Trait for upstream metric sources.
///
/// Adapters never fail: credential, network, and decode problems are folded
/// into `FetchOutcome::Unavailable` with a reason string, so a degraded
/// source costs one section of the report instead of the run. Fetching the
/// same window twice against unchanged upstream state yields identical
/// normalized output.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Normalized payload this adapter produces
    type Output: Send;

    /// Source name used in logs (e.g., "goatcounter", "github")
    fn name(&self) -> &str;

    /// Fetch and normalize one window of data
    async fn fetch(&self, window: MetricWindow) -> FetchOutcome<Self::Output>;
}

/// Run an adapter fetch under a wall-clock budget.
///
/// A source that hangs resolves to `Unavailable` instead of stalling the
/// run; the budget covers the whole fetch, on top of the adapter's own
/// per-request timeout.
pub async fn fetch_with_timeout<A: SourceAdapter>(
    adapter: &A,
    window: MetricWindow,
    budget: Duration,
) -> FetchOutcome<A::Output> {
    match tokio::time::timeout(budget, adapter.fetch(window)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::warn!(source = adapter.name(), budget_secs = budget.as_secs(), "Fetch timed out");
            FetchOutcome::unavailable(format!(
                "{} fetch timed out after {}s",
                adapter.name(),
                budget.as_secs()
            ))
        }
    }
}
