//! Per-unit statement execution with failure isolation.
//!
//! Units run concurrently up to `AuditSettings::max_concurrency`, capped at
//! what the backend can execute at once, each under its own timeout. A failing or slow unit produces an `Err` for that unit
//! only; the remaining units are unaffected. Output order follows
//! completion, so callers sort before reporting.

use crate::Result;
use crate::adapters::{AuditBackend, Statement};
use crate::config::AuditSettings;
use crate::error::AuditError;
use futures::stream::{self, StreamExt};
use std::time::Duration;

/// Runs one statement under a timeout.
async fn run_unit(backend: &dyn AuditBackend, statement: &Statement, timeout: Duration) -> Result<i64> {
    tracing::trace!(unit = %statement.unit, sql = %statement.sql, "Executing audit unit");

    let outcome = match tokio::time::timeout(timeout, backend.count(statement)).await {
        Ok(result) => result,
        Err(_) => Err(AuditError::timeout(
            format!("Statement on {}", statement.unit),
            timeout,
        )),
    };

    match &outcome {
        Ok(count) => tracing::debug!(unit = %statement.unit, count, "Audit unit completed"),
        Err(e) => tracing::warn!(unit = %statement.unit, error = %e, "Audit unit failed"),
    }
    outcome
}

/// Executes every statement and pairs each outcome with its key.
///
/// # Arguments
/// * `backend` - Target to run against
/// * `units` - Caller-defined key and statement per unit
/// * `settings` - Concurrency bound and per-unit timeout
///
/// Never fails as a whole; every unit reports its own result.
pub async fn execute_counts<T: Send>(
    backend: &dyn AuditBackend,
    units: Vec<(T, Statement)>,
    settings: &AuditSettings,
) -> Vec<(T, Result<i64>)> {
    let timeout = settings.unit_timeout;
    let total = units.len();
    let limit = settings
        .max_concurrency
        .min(backend.max_parallelism())
        .max(1);
    if limit < settings.max_concurrency {
        tracing::debug!(
            "Backend executes at most {} statements at once, limiting concurrency from {}",
            limit,
            settings.max_concurrency
        );
    }

    let outcomes: Vec<(T, Result<i64>)> = stream::iter(units)
        .map(|(key, statement)| async move {
            let outcome = run_unit(backend, &statement, timeout).await;
            (key, outcome)
        })
        .buffer_unordered(limit)
        .collect()
        .await;

    let failed = outcomes.iter().filter(|(_, o)| o.is_err()).count();
    tracing::debug!("Executed {} audit units, {} failed", total, failed);
    outcomes
}
