//! Automation Engine - materializes due recurring sources into the ledger
//!
//! A run scans the scope's catalog for sources due on `as_of` and, for each:
//! skips it if its occurrence is already in the ledger, checks category
//! ownership, then lets the source plan the occurrence and commits the
//! result atomically. Per-source failures are recorded and the batch goes on.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::lease::{LeasePurpose, LeaseRegistry};
use crate::models::{NewLedgerTransaction, RecurringSource, Scope};
use crate::sources::{LoanSplit, Occurrence};
use crate::store::{OccurrenceCommit, Store, StoreHandle};

/// Whether a run writes its results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Commit,
    /// Compute the same report without persisting anything
    Preview,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Preview => "preview",
        }
    }
}

/// A transaction created (or, in preview, that would be created)
#[derive(Debug, Clone, Serialize)]
pub struct MaterializedTransaction {
    /// Ledger id; `None` in preview
    pub id: Option<i64>,
    pub source_id: i64,
    pub transaction: NewLedgerTransaction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_split: Option<LoanSplit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Ownership,
    NotFound,
    Store,
}

/// One source that could not be processed
#[derive(Debug, Clone, Serialize)]
pub struct SourceFailure {
    pub source_id: i64,
    pub source_name: String,
    pub kind: FailureKind,
    pub reason: String,
    pub retryable: bool,
}

impl SourceFailure {
    fn from_error(source: &RecurringSource, err: &Error) -> Self {
        let kind = match err {
            Error::Ownership { .. } => FailureKind::Ownership,
            Error::NotFound(_) => FailureKind::NotFound,
            _ => FailureKind::Store,
        };
        Self {
            source_id: source.id,
            source_name: source.name.clone(),
            kind,
            reason: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Outcome of one automation run
#[derive(Debug, Clone, Serialize)]
pub struct AutomationReport {
    pub scope: Scope,
    pub as_of: NaiveDate,
    pub mode: RunMode,
    /// Sources due on `as_of`
    pub due: usize,
    pub created: Vec<MaterializedTransaction>,
    pub skipped_existing: usize,
    /// Sources that reached (or, in preview, would reach) the completed state
    pub completed_sources: Vec<i64>,
    pub errors: Vec<SourceFailure>,
}

impl AutomationReport {
    fn new(scope: Scope, as_of: NaiveDate, mode: RunMode) -> Self {
        Self {
            scope,
            as_of,
            mode,
            due: 0,
            created: Vec::new(),
            skipped_existing: 0,
            completed_sources: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Signed sum of created transactions
    pub fn net_amount(&self) -> Decimal {
        self.created
            .iter()
            .map(|m| m.transaction.signed_amount())
            .sum()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

pub struct AutomationEngine<S> {
    store: StoreHandle<S>,
    leases: Arc<LeaseRegistry>,
}

impl<S: Store> AutomationEngine<S> {
    pub fn new(store: StoreHandle<S>, leases: Arc<LeaseRegistry>) -> Self {
        Self { store, leases }
    }

    /// Process every source due on `as_of` for `scope`.
    ///
    /// Fails as a whole only when the lease cannot be taken or the due-source
    /// query fails. Everything after that is reported per source.
    pub async fn process(
        &self,
        scope: Scope,
        as_of: NaiveDate,
        mode: RunMode,
    ) -> Result<AutomationReport> {
        let _lease = self.leases.acquire(scope, LeasePurpose::Automation).await?;

        let due = self
            .store
            .call("due_sources", move |s| s.due_sources(scope, as_of))
            .await?;

        info!(%scope, %as_of, mode = mode.as_str(), due = due.len(), "Automation run started");

        let mut report = AutomationReport::new(scope, as_of, mode);
        report.due = due.len();

        for source in &due {
            if let Err(e) = self.process_source(source, as_of, mode, &mut report).await {
                warn!(
                    source_id = source.id,
                    source = %source.name,
                    error = %e,
                    "Source failed"
                );
                report.errors.push(SourceFailure::from_error(source, &e));
            }
        }

        info!(
            %scope,
            %as_of,
            mode = mode.as_str(),
            created = report.created.len(),
            skipped = report.skipped_existing,
            completed = report.completed_sources.len(),
            errors = report.errors.len(),
            "Automation run finished"
        );

        Ok(report)
    }

    async fn process_source(
        &self,
        source: &RecurringSource,
        as_of: NaiveDate,
        mode: RunMode,
        report: &mut AutomationReport,
    ) -> Result<()> {
        let key = source.idempotency_key(as_of);
        let existing = self
            .store
            .call("find_generated", move |s| s.find_generated(&key))
            .await?;
        if existing.is_some() {
            debug!(source_id = source.id, %key, "Occurrence already materialized");
            report.skipped_existing += 1;
            return Ok(());
        }

        self.check_category(source).await?;

        match source.plan_occurrence(as_of) {
            Occurrence::Exhausted => {
                if mode == RunMode::Commit {
                    let commit = OccurrenceCommit {
                        scope: source.scope,
                        source_id: source.id,
                        transaction: None,
                        progress: None,
                        completed_on: Some(as_of),
                    };
                    self.store
                        .call("commit_occurrence", move |s| s.commit_occurrence(&commit))
                        .await?;
                }
                info!(source_id = source.id, source = %source.name, "Source fully paid, marked completed");
                report.completed_sources.push(source.id);
            }
            Occurrence::Materialize {
                transaction,
                progress,
                completes,
                loan_split,
            } => {
                let id = match mode {
                    RunMode::Preview => None,
                    RunMode::Commit => {
                        let commit = OccurrenceCommit {
                            scope: source.scope,
                            source_id: source.id,
                            transaction: Some(transaction.clone()),
                            progress: Some(progress),
                            completed_on: completes.then_some(as_of),
                        };
                        match self
                            .store
                            .call("commit_occurrence", move |s| s.commit_occurrence(&commit))
                            .await
                        {
                            Ok(id) => id,
                            // Lost a race with another writer of the same occurrence
                            Err(Error::Conflict(reason)) => {
                                debug!(source_id = source.id, %reason, "Duplicate occurrence skipped");
                                report.skipped_existing += 1;
                                return Ok(());
                            }
                            Err(e) => return Err(e),
                        }
                    }
                };

                debug!(
                    source_id = source.id,
                    amount = %transaction.signed_amount(),
                    "Occurrence materialized"
                );
                if completes {
                    info!(source_id = source.id, source = %source.name, "Final payment, source completed");
                    report.completed_sources.push(source.id);
                }
                report.created.push(MaterializedTransaction {
                    id,
                    source_id: source.id,
                    transaction,
                    loan_split,
                });
            }
        }

        Ok(())
    }

    /// A referenced category must exist and belong to the source's scope
    async fn check_category(&self, source: &RecurringSource) -> Result<()> {
        let Some(category_id) = source.category_id else {
            return Ok(());
        };
        let category = self
            .store
            .call("get_category", move |s| s.get_category(category_id))
            .await?;
        match category {
            None => Err(Error::NotFound(format!(
                "category {} referenced by source {}",
                category_id, source.id
            ))),
            Some(c) if c.scope != source.scope => Err(Error::Ownership {
                source_id: source.id,
                category_id,
            }),
            Some(_) => Ok(()),
        }
    }
}
