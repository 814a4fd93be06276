//! Store contracts consumed by the engines
//!
//! The engines never talk to SQLite directly. They see these traits, which
//! [`crate::db::Database`] implements, and reach them through a
//! [`StoreHandle`] that moves each call onto the blocking pool and bounds it
//! with a timeout.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::{
    Alert, AlertCandidate, AlertFilter, Category, ExpectedIncome, Granularity, IdempotencyKey,
    LedgerTransaction, NewLedgerTransaction, ProvenanceFilter, RecurringSource, Scope,
};
use crate::sources::SourceProgress;

/// Recurring source catalog
pub trait CatalogStore: Send + Sync {
    fn get_source(&self, scope: Scope, id: i64) -> Result<Option<RecurringSource>>;

    fn list_sources(&self, scope: Scope, active_only: bool) -> Result<Vec<RecurringSource>>;

    /// Active, non-completed sources scheduled on `date`
    fn due_sources(&self, scope: Scope, date: NaiveDate) -> Result<Vec<RecurringSource>>;

    /// Sources that reached the completed state on or after `since`
    fn recently_completed(&self, scope: Scope, since: NaiveDate) -> Result<Vec<RecurringSource>>;
}

/// Ledger of materialized and user-entered transactions
pub trait LedgerStore: Send + Sync {
    /// Id of the generated transaction carrying this key, if any
    fn find_generated(&self, key: &IdempotencyKey) -> Result<Option<i64>>;

    fn list_transactions(
        &self,
        scope: Scope,
        from: NaiveDate,
        to: NaiveDate,
        filter: ProvenanceFilter,
    ) -> Result<Vec<LedgerTransaction>>;

    /// Insert one transaction. A second generated row for the same
    /// idempotency key fails with [`Error::Conflict`].
    fn create_transaction(&self, tx: &NewLedgerTransaction) -> Result<i64>;
}

pub trait BalanceStore: Send + Sync {
    /// Latest confirmed balance and its date, if any was ever recorded
    fn latest_confirmed_balance(&self, scope: Scope) -> Result<Option<(Decimal, NaiveDate)>>;

    fn expected_income(
        &self,
        scope: Scope,
        granularity: Granularity,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ExpectedIncome>>;
}

pub trait CategoryStore: Send + Sync {
    fn get_category(&self, id: i64) -> Result<Option<Category>>;
}

pub trait AlertStore: Send + Sync {
    fn list_unresolved_alerts(&self, scope: Scope) -> Result<Vec<Alert>>;

    /// Apply a reconciliation result in one transaction
    fn apply_alert_merge(&self, scope: Scope, merge: &AlertMerge) -> Result<()>;

    fn list_alerts(&self, scope: Scope, filter: &AlertFilter) -> Result<Vec<Alert>>;

    fn mark_alert_read(&self, scope: Scope, id: i64) -> Result<()>;

    fn dismiss_alert(&self, scope: Scope, id: i64) -> Result<()>;

    fn count_unread_alerts(&self, scope: Scope) -> Result<i64>;
}

/// Everything the engines need, plus the two multi-table operations that must
/// be atomic.
pub trait Store:
    CatalogStore + LedgerStore + BalanceStore + CategoryStore + AlertStore + 'static
{
    /// Apply one source's occurrence: ledger row, progress fields and
    /// completion flag, all or nothing. Returns the new transaction id when a
    /// transaction was written.
    fn commit_occurrence(&self, commit: &OccurrenceCommit) -> Result<Option<i64>>;

    /// Catalog, ledger, balance and expected income of one scope read at a
    /// single point in time
    fn forecast_snapshot(
        &self,
        scope: Scope,
        from: NaiveDate,
        to: NaiveDate,
        granularity: Granularity,
    ) -> Result<ForecastSnapshot>;
}

/// Side effects of one occurrence
#[derive(Debug, Clone)]
pub struct OccurrenceCommit {
    pub scope: Scope,
    pub source_id: i64,
    pub transaction: Option<NewLedgerTransaction>,
    pub progress: Option<SourceProgress>,
    /// Mark the source completed as of this date
    pub completed_on: Option<NaiveDate>,
}

/// Point-in-time inputs of a projection
#[derive(Debug, Clone, Default)]
pub struct ForecastSnapshot {
    /// Latest confirmed balance; zero when none was recorded
    pub opening_balance: Decimal,
    pub balance_as_of: Option<NaiveDate>,
    /// Active sources, plus those completed inside the window
    pub sources: Vec<RecurringSource>,
    /// User-entered ledger rows inside the window
    pub one_time: Vec<LedgerTransaction>,
    /// Rows the automation engine already wrote inside the window; the
    /// matching sources' progress includes them
    pub generated: Vec<LedgerTransaction>,
    pub expected_income: Vec<ExpectedIncome>,
}

/// Rows touched by one reconciliation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertMerge {
    /// Existing alert id and the candidate whose severity/title/message it takes
    pub refresh: Vec<(i64, AlertCandidate)>,
    pub create: Vec<AlertCandidate>,
    /// Ids of existing alerts to move to resolved
    pub resolve: Vec<i64>,
}

impl AlertMerge {
    pub fn is_empty(&self) -> bool {
        self.refresh.is_empty() && self.create.is_empty() && self.resolve.is_empty()
    }
}

/// Shared store with a per-call timeout.
///
/// Each call runs on tokio's blocking pool. A call that overruns the timeout
/// fails with [`Error::Timeout`]; the blocking work is left to finish on its
/// own and its result is dropped.
pub struct StoreHandle<S> {
    store: Arc<S>,
    timeout: Duration,
}

impl<S> Clone for StoreHandle<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            timeout: self.timeout,
        }
    }
}

impl<S: Store> StoreHandle<S> {
    pub fn new(store: Arc<S>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn inner(&self) -> &Arc<S> {
        &self.store
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run a store operation on the blocking pool under the call timeout
    pub async fn call<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || f(&store));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(Error::Unavailable(format!(
                "{} aborted: {}",
                operation, join_err
            ))),
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                warn!(operation, timeout_ms, "Store call timed out");
                Err(Error::Timeout {
                    operation: operation.to_string(),
                    timeout_ms,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn handle(timeout: Duration) -> StoreHandle<Database> {
        StoreHandle::new(Arc::new(Database::in_memory().unwrap()), timeout)
    }

    #[tokio::test]
    async fn test_slow_call_times_out_as_retryable() {
        let store = handle(Duration::from_millis(20));
        let err = store
            .call("slow", |_| {
                std::thread::sleep(Duration::from_millis(200));
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(
            &err,
            Error::Timeout { operation, timeout_ms: 20 } if operation == "slow"
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_call_passes_results_through() {
        let store = handle(Duration::from_secs(5));
        let unread = store
            .call("count_unread_alerts", |s| s.count_unread_alerts(Scope::user(1)))
            .await
            .unwrap();
        assert_eq!(unread, 0);

        // Store errors keep their own class
        let err = store
            .call("missing", |_| Err::<(), _>(Error::NotFound("source 9".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(!err.is_retryable());
    }
}
