//! Operations spanning several tables in one SQLite transaction

use chrono::NaiveDate;
use rusqlite::params;
use tracing::debug;

use super::balances::{query_expected_income, query_latest_balance};
use super::ledger::{insert_transaction, query_transactions};
use super::sources::query_projected_sources;
use super::Database;
use crate::error::{Error, Result};
use crate::models::{Granularity, ProvenanceFilter, Scope};
use crate::sources::SourceProgress;
use crate::store::{ForecastSnapshot, OccurrenceCommit, Store};

impl Store for Database {
    fn commit_occurrence(&self, commit: &OccurrenceCommit) -> Result<Option<i64>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let scope_key = commit.scope.key();

        // Dropping `tx` on any early return rolls everything back
        let transaction_id = match &commit.transaction {
            Some(new_tx) => Some(insert_transaction(&tx, new_tx)?),
            None => None,
        };

        let touched = match &commit.progress {
            None | Some(SourceProgress::Fixed) => tx.execute(
                "UPDATE recurring_sources SET updated_at = CURRENT_TIMESTAMP \
                 WHERE id = ? AND scope = ?",
                params![commit.source_id, scope_key],
            )?,
            Some(SourceProgress::Installment { payments_completed }) => tx.execute(
                "UPDATE recurring_sources \
                 SET payments_completed = ?, updated_at = CURRENT_TIMESTAMP \
                 WHERE id = ? AND scope = ? AND COALESCE(payments_completed, 0) <= ?",
                params![payments_completed, commit.source_id, scope_key, payments_completed],
            )?,
            Some(SourceProgress::Loan {
                payments_made,
                remaining_balance,
            }) => tx.execute(
                "UPDATE recurring_sources \
                 SET payments_made = ?, remaining_balance = ?, updated_at = CURRENT_TIMESTAMP \
                 WHERE id = ? AND scope = ?",
                params![
                    payments_made,
                    remaining_balance.to_string(),
                    commit.source_id,
                    scope_key
                ],
            )?,
        };
        if touched == 0 {
            return Err(Error::NotFound(format!(
                "source {} in {}",
                commit.source_id, commit.scope
            )));
        }

        if let Some(on) = commit.completed_on {
            tx.execute(
                "UPDATE recurring_sources SET status = 'completed', completed_at = ? \
                 WHERE id = ? AND scope = ? AND status = 'active'",
                params![on.to_string(), commit.source_id, scope_key],
            )?;
        }

        tx.commit()?;
        debug!(
            source_id = commit.source_id,
            transaction_id,
            completed = commit.completed_on.is_some(),
            "Occurrence committed"
        );
        Ok(transaction_id)
    }

    fn forecast_snapshot(
        &self,
        scope: Scope,
        from: NaiveDate,
        to: NaiveDate,
        granularity: Granularity,
    ) -> Result<ForecastSnapshot> {
        let mut conn = self.conn()?;
        // One read transaction: every query below sees the same WAL snapshot
        let tx = conn.transaction()?;

        let balance = query_latest_balance(&tx, scope)?;
        let sources = query_projected_sources(&tx, scope, from)?;
        let one_time = query_transactions(&tx, scope, from, to, ProvenanceFilter::Manual)?;
        let generated = query_transactions(&tx, scope, from, to, ProvenanceFilter::Generated)?;
        let expected_income = query_expected_income(&tx, scope, granularity, from, to)?;

        tx.commit()?;

        Ok(ForecastSnapshot {
            opening_balance: balance.map(|(amount, _)| amount).unwrap_or_default(),
            balance_as_of: balance.map(|(_, as_of)| as_of),
            sources,
            one_time,
            generated,
            expected_income,
        })
    }
}
