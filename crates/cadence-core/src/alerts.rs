//! Alert Reconciler - derives balance-risk alerts and merges them into the
//! stored set
//!
//! Two pure steps do the work:
//! - [`derive_candidates`] turns a forecast, the current balance and recent
//!   activity into the alerts that should exist now
//! - [`merge_alerts`] diffs those against the unresolved stored alerts by
//!   `(alert_type, scope_identifier)`
//!
//! Matched alerts keep their identity and read/dismissed state. Alerts whose
//! condition no longer holds are resolved, never deleted.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::automation::AutomationReport;
use crate::config::AlertThresholds;
use crate::error::Result;
use crate::forecast::Forecast;
use crate::lease::{LeasePurpose, LeaseRegistry};
use crate::models::{
    first_of_month, Alert, AlertCandidate, AlertType, Direction, LedgerTransaction,
    ProvenanceFilter, RecurringSource, Scope, Severity,
};
use crate::store::{AlertMerge, Store, StoreHandle};

/// Spending in one category: this month so far against its trailing average
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryActivity {
    pub category_id: i64,
    pub name: String,
    /// "YYYY-MM" of the month being compared
    pub period: String,
    pub current: Decimal,
    pub baseline: Decimal,
}

/// Everything the derivation rules look at
#[derive(Debug, Clone, Copy)]
pub struct AlertInputs<'a> {
    pub as_of: NaiveDate,
    pub forecast: &'a Forecast,
    pub current_balance: Decimal,
    pub category_activity: &'a [CategoryActivity],
    pub completed_sources: &'a [RecurringSource],
    /// Latest automation run; automation-failure alerts are only evaluated
    /// when one is supplied
    pub automation: Option<&'a AutomationReport>,
}

/// Result of one reconciliation
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub scope: Scope,
    /// Unresolved alerts after the merge
    pub active: Vec<Alert>,
    /// Alerts resolved by this pass
    pub resolved: Vec<Alert>,
    pub created: usize,
    pub refreshed: usize,
}

fn money(amount: Decimal) -> String {
    format!("${:.2}", amount)
}

/// The alerts current state calls for, and the alert types that were
/// evaluated. Types outside the evaluated set are left alone by the merge.
pub fn derive_candidates(
    inputs: &AlertInputs<'_>,
    thresholds: &AlertThresholds,
) -> (Vec<AlertCandidate>, HashSet<AlertType>) {
    let mut evaluated = HashSet::from([
        AlertType::NegativeBalance,
        AlertType::LowBalance,
        AlertType::CategorySpike,
        AlertType::SourceCompleted,
    ]);
    let mut candidates = Vec::new();

    for period in inputs.forecast.negative_periods() {
        candidates.push(AlertCandidate {
            alert_type: AlertType::NegativeBalance,
            scope_identifier: format!("{}:{}", AlertType::NegativeBalance, period.label),
            severity: Severity::Critical,
            title: format!("Balance goes negative in {}", period.label),
            message: format!(
                "Projected closing balance for {} is {} (opening {}, income {}, expenses {})",
                period.label,
                money(period.closing_balance),
                money(period.opening_balance),
                money(period.total_income),
                money(period.total_expenses)
            ),
        });
    }

    let balance = inputs.current_balance;
    let low_severity = if balance < thresholds.critical_balance {
        Some((Severity::Critical, thresholds.critical_balance))
    } else if balance < thresholds.warning_balance {
        Some((Severity::Warning, thresholds.warning_balance))
    } else {
        None
    };
    if let Some((severity, threshold)) = low_severity {
        candidates.push(AlertCandidate {
            alert_type: AlertType::LowBalance,
            scope_identifier: AlertType::LowBalance.as_str().to_string(),
            severity,
            title: "Low balance".to_string(),
            message: format!(
                "Current balance {} is below the {} threshold of {}",
                money(balance),
                severity,
                money(threshold)
            ),
        });
    }

    let spike_factor = Decimal::ONE + thresholds.category_spike_percent / Decimal::from(100);
    for activity in inputs.category_activity {
        if activity.baseline < thresholds.category_spike_min_baseline
            || activity.baseline <= Decimal::ZERO
        {
            continue;
        }
        if activity.current > activity.baseline * spike_factor {
            let percent = ((activity.current - activity.baseline) / activity.baseline
                * Decimal::from(100))
            .round_dp(0);
            candidates.push(AlertCandidate {
                alert_type: AlertType::CategorySpike,
                scope_identifier: format!(
                    "{}:{}:{}",
                    AlertType::CategorySpike,
                    activity.category_id,
                    activity.period
                ),
                severity: Severity::Info,
                title: format!("{} spending is up {}%", activity.name, percent),
                message: format!(
                    "{} spent on {} in {} against a {} monthly average",
                    money(activity.current),
                    activity.name,
                    activity.period,
                    money(activity.baseline)
                ),
            });
        }
    }

    let notice_from =
        inputs.as_of - Duration::days(i64::from(thresholds.completion_notice_days));
    for source in inputs.completed_sources {
        let Some(completed_at) = source.completed_at else {
            continue;
        };
        if completed_at < notice_from {
            continue;
        }
        candidates.push(AlertCandidate {
            alert_type: AlertType::SourceCompleted,
            scope_identifier: format!("{}:{}", AlertType::SourceCompleted, source.id),
            severity: Severity::Info,
            title: format!("{} is paid off", source.name),
            message: format!(
                "{} made its final {} payment on {}",
                source.name,
                source.source_type(),
                completed_at
            ),
        });
    }

    if let Some(report) = inputs.automation {
        evaluated.insert(AlertType::AutomationFailed);
        for failure in &report.errors {
            candidates.push(AlertCandidate {
                alert_type: AlertType::AutomationFailed,
                scope_identifier: format!("{}:{}", AlertType::AutomationFailed, failure.source_id),
                severity: Severity::Warning,
                title: format!("Could not record {}", failure.source_name),
                message: format!(
                    "Automation on {} skipped {}: {}",
                    report.as_of, failure.source_name, failure.reason
                ),
            });
        }
    }

    (dedup_candidates(candidates), evaluated)
}

/// One candidate per dedup key, keeping the most severe
fn dedup_candidates(candidates: Vec<AlertCandidate>) -> Vec<AlertCandidate> {
    let mut by_key: HashMap<(AlertType, String), AlertCandidate> = HashMap::new();
    let mut order = Vec::new();
    for candidate in candidates {
        let key = (candidate.alert_type, candidate.scope_identifier.clone());
        match by_key.get(&key) {
            Some(existing) if existing.severity.priority() >= candidate.severity.priority() => {}
            Some(_) => {
                by_key.insert(key, candidate);
            }
            None => {
                order.push(key.clone());
                by_key.insert(key, candidate);
            }
        }
    }
    order
        .into_iter()
        .filter_map(|key| by_key.remove(&key))
        .collect()
}

/// Diff candidates against the unresolved stored alerts.
///
/// - matched: kept, refreshed when severity/title/message changed
/// - unmatched candidate: created
/// - unmatched stored alert of an evaluated type: resolved
pub fn merge_alerts(
    existing: &[Alert],
    candidates: &[AlertCandidate],
    evaluated: &HashSet<AlertType>,
) -> AlertMerge {
    let by_key: HashMap<(AlertType, &str), &Alert> = existing
        .iter()
        .filter(|a| !a.is_resolved())
        .map(|a| (a.dedup_key(), a))
        .collect();

    let mut merge = AlertMerge::default();
    let mut matched = HashSet::new();

    for candidate in candidates {
        match by_key.get(&candidate.dedup_key()) {
            Some(alert) => {
                matched.insert(alert.id);
                let changed = alert.severity != candidate.severity
                    || alert.title != candidate.title
                    || alert.message != candidate.message;
                if changed {
                    merge.refresh.push((alert.id, candidate.clone()));
                }
            }
            None => merge.create.push(candidate.clone()),
        }
    }

    for alert in existing.iter().filter(|a| !a.is_resolved()) {
        if !matched.contains(&alert.id) && evaluated.contains(&alert.alert_type) {
            merge.resolve.push(alert.id);
        }
    }

    merge
}

/// Per-category expense totals for the month of `as_of` against the average
/// of the `history_months` full months before it. Generated and manual rows
/// both count; uncategorized rows are ignored.
pub fn category_activity(
    transactions: &[LedgerTransaction],
    as_of: NaiveDate,
    history_months: u32,
    names: &HashMap<i64, String>,
) -> Vec<CategoryActivity> {
    let current_start = first_of_month(as_of.year(), as_of.month());
    let history_start = months_back(current_start, history_months);

    let mut current: BTreeMap<i64, Decimal> = BTreeMap::new();
    let mut history: BTreeMap<i64, Decimal> = BTreeMap::new();

    for tx in transactions {
        let (Some(category_id), Direction::Expense) = (tx.category_id, tx.direction) else {
            continue;
        };
        if tx.occurrence_date >= current_start && tx.occurrence_date <= as_of {
            *current.entry(category_id).or_default() += tx.amount;
        } else if tx.occurrence_date >= history_start && tx.occurrence_date < current_start {
            *history.entry(category_id).or_default() += tx.amount;
        }
    }

    let months = Decimal::from(history_months.max(1));
    let period = current_start.format("%Y-%m").to_string();

    current
        .into_iter()
        .map(|(category_id, spent)| CategoryActivity {
            category_id,
            name: names
                .get(&category_id)
                .cloned()
                .unwrap_or_else(|| format!("Category {}", category_id)),
            period: period.clone(),
            current: spent,
            baseline: (history.get(&category_id).copied().unwrap_or_default() / months)
                .round_dp(2),
        })
        .collect()
}

/// First day of the month `n` months before `first`
fn months_back(first: NaiveDate, n: u32) -> NaiveDate {
    let total = first.year() * 12 + first.month0() as i32 - n as i32;
    first_of_month(total.div_euclid(12), total.rem_euclid(12) as u32 + 1)
}

pub struct AlertReconciler<S> {
    store: StoreHandle<S>,
    leases: Arc<LeaseRegistry>,
    thresholds: AlertThresholds,
}

impl<S: Store> AlertReconciler<S> {
    pub fn new(store: StoreHandle<S>, leases: Arc<LeaseRegistry>, thresholds: AlertThresholds) -> Self {
        Self {
            store,
            leases,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Derive alerts from `forecast`, `current_balance` and recent activity,
    /// then merge them into the stored set under the scope's lease
    pub async fn reconcile(
        &self,
        scope: Scope,
        as_of: NaiveDate,
        forecast: &Forecast,
        current_balance: Decimal,
        automation: Option<&AutomationReport>,
    ) -> Result<Reconciliation> {
        let _lease = self.leases.acquire(scope, LeasePurpose::Alerts).await?;

        let history_months = self.thresholds.category_history_months;
        let history_start = months_back(first_of_month(as_of.year(), as_of.month()), history_months);
        let transactions = self
            .store
            .call("list_transactions", move |s| {
                s.list_transactions(scope, history_start, as_of, ProvenanceFilter::Any)
            })
            .await?;

        let category_ids: HashSet<i64> = transactions.iter().filter_map(|t| t.category_id).collect();
        let names = self
            .store
            .call("get_category", move |s| {
                let mut names = HashMap::new();
                for id in category_ids {
                    if let Some(c) = s.get_category(id)? {
                        if c.scope == scope {
                            names.insert(id, c.name);
                        }
                    }
                }
                Ok(names)
            })
            .await?;
        let activity = category_activity(&transactions, as_of, history_months, &names);

        let notice_from =
            as_of - Duration::days(i64::from(self.thresholds.completion_notice_days));
        let completed = self
            .store
            .call("recently_completed", move |s| {
                s.recently_completed(scope, notice_from)
            })
            .await?;

        let inputs = AlertInputs {
            as_of,
            forecast,
            current_balance,
            category_activity: &activity,
            completed_sources: &completed,
            automation,
        };
        let (candidates, evaluated) = derive_candidates(&inputs, &self.thresholds);

        let existing = self
            .store
            .call("list_unresolved_alerts", move |s| s.list_unresolved_alerts(scope))
            .await?;
        let merge = merge_alerts(&existing, &candidates, &evaluated);
        debug!(
            %scope,
            candidates = candidates.len(),
            existing = existing.len(),
            create = merge.create.len(),
            refresh = merge.refresh.len(),
            resolve = merge.resolve.len(),
            "Alert merge computed"
        );

        let created = merge.create.len();
        let refreshed = merge.refresh.len();
        let resolve_ids: HashSet<i64> = merge.resolve.iter().copied().collect();

        self.store
            .call("apply_alert_merge", move |s| s.apply_alert_merge(scope, &merge))
            .await?;

        let active = self
            .store
            .call("list_unresolved_alerts", move |s| s.list_unresolved_alerts(scope))
            .await?;
        let now = Utc::now();
        let resolved: Vec<Alert> = existing
            .into_iter()
            .filter(|a| resolve_ids.contains(&a.id))
            .map(|mut a| {
                a.resolved_at = Some(now);
                a
            })
            .collect();

        info!(
            %scope,
            active = active.len(),
            created,
            refreshed,
            resolved = resolved.len(),
            "Alerts reconciled"
        );

        Ok(Reconciliation {
            scope,
            active,
            resolved,
            created,
            refreshed,
        })
    }
}
