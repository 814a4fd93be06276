//! Integration tests for cadence-core
//!
//! These tests exercise the full automation → forecast → alert workflow
//! against a real (temporary) database.

use std::sync::Arc;

use cadence_core::{
    db::Database,
    models::{
        parse_date, AlertFilter, AlertType, Direction, Granularity, NewLedgerTransaction,
        NewSource, ProvenanceFilter, Scope, Severity, SourceKind, SourceStatus,
    },
    store::{CatalogStore, LedgerStore},
    Cadence, CoreConfig, Error, Forecast,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;

fn date(s: &str) -> NaiveDate {
    parse_date(s).unwrap()
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn setup() -> (Arc<Database>, Cadence<Database>) {
    let db = Arc::new(Database::in_memory().expect("Failed to create in-memory database"));
    let cadence = Cadence::new(Arc::clone(&db), CoreConfig::default());
    (db, cadence)
}

// =============================================================================
// Automation
// =============================================================================

#[tokio::test]
async fn test_fixed_expense_materializes_once() {
    let (db, cadence) = setup();
    let scope = Scope::user(1);
    db.record_balance(scope, date("2026-03-01"), dec("5000"), "USD", true)
        .unwrap();
    db.insert_source(&NewSource::fixed(
        scope,
        "Rent",
        dec("1000"),
        Direction::Expense,
        15,
        date("2026-01-01"),
    ))
    .unwrap();

    let first = cadence.run_automation(scope, date("2026-03-15")).await.unwrap();
    assert_eq!(first.due, 1);
    assert_eq!(first.created.len(), 1);
    assert_eq!(first.skipped_existing, 0);
    assert_eq!(first.net_amount(), dec("-1000"));

    let second = cadence.run_automation(scope, date("2026-03-15")).await.unwrap();
    assert!(second.created.is_empty());
    assert_eq!(second.skipped_existing, 1);

    let ledger = db
        .list_transactions(
            scope,
            date("2026-03-01"),
            date("2026-03-31"),
            ProvenanceFilter::Generated,
        )
        .unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].signed_amount(), dec("-1000"));
    assert_eq!(ledger[0].occurrence_date, date("2026-03-15"));
}

#[tokio::test]
async fn test_second_run_skips_every_due_source() {
    let (db, cadence) = setup();
    let scope = Scope::organization(4);
    let start = date("2026-01-01");
    db.insert_source(&NewSource::fixed(scope, "Payroll", dec("8000"), Direction::Income, 1, start))
        .unwrap();
    db.insert_source(&NewSource::fixed(scope, "Lease", dec("2500"), Direction::Expense, 1, start))
        .unwrap();
    db.insert_source(&NewSource::installment(
        scope,
        "Printer",
        dec("90"),
        Direction::Expense,
        1,
        start,
        10,
        3,
    ))
    .unwrap();

    let first = cadence.run_automation(scope, date("2026-04-01")).await.unwrap();
    assert_eq!(first.created.len(), 3);

    let second = cadence.run_automation(scope, date("2026-04-01")).await.unwrap();
    assert!(second.created.is_empty());
    assert_eq!(second.skipped_existing, second.due);
    assert_eq!(second.skipped_existing, 3);
}

#[tokio::test]
async fn test_exhausted_installment_is_completed_without_transaction() {
    let (db, cadence) = setup();
    let scope = Scope::user(1);
    let id = db
        .insert_source(&NewSource::installment(
            scope,
            "Side gig",
            dec("200"),
            Direction::Income,
            5,
            date("2025-01-05"),
            12,
            12,
        ))
        .unwrap();

    let report = cadence.run_automation(scope, date("2026-03-05")).await.unwrap();
    assert!(report.created.is_empty());
    assert_eq!(report.completed_sources, vec![id]);

    let source = db.get_source(scope, id).unwrap().unwrap();
    assert_eq!(source.status, SourceStatus::Completed);
    assert!(db
        .list_transactions(scope, date("2026-01-01"), date("2026-12-31"), ProvenanceFilter::Any)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_preview_matches_commit_without_writing() {
    let (db, cadence) = setup();
    let scope = Scope::user(1);
    let id = db
        .insert_source(&NewSource::loan(
            scope,
            "Car loan",
            dec("500"),
            20,
            date("2026-01-20"),
            dec("12"),
            24,
            dec("10000"),
        ))
        .unwrap();

    let preview = cadence.preview(scope, date("2026-03-20")).await.unwrap();
    assert_eq!(preview.created.len(), 1);
    assert!(preview.created[0].id.is_none());
    let split = preview.created[0].loan_split.unwrap();
    assert_eq!(split.interest, dec("100.00"));
    assert_eq!(split.principal, dec("400.00"));

    // Nothing moved
    let source = db.get_source(scope, id).unwrap().unwrap();
    assert!(matches!(source.kind, SourceKind::Loan { payments_made: 0, .. }));

    let committed = cadence.run_automation(scope, date("2026-03-20")).await.unwrap();
    assert_eq!(committed.created.len(), 1);
    assert!(committed.created[0].id.is_some());
    assert_eq!(
        committed.created[0].transaction,
        preview.created[0].transaction
    );

    let source = db.get_source(scope, id).unwrap().unwrap();
    assert_eq!(
        source.kind,
        SourceKind::Loan {
            interest_rate: dec("12"),
            total_payments: 24,
            payments_made: 1,
            remaining_balance: dec("9600.00"),
        }
    );
}

#[tokio::test]
async fn test_foreign_category_fails_only_that_source() {
    let (db, cadence) = setup();
    let scope = Scope::user(1);
    let foreign = db.create_category(Scope::user(2), "Theirs").unwrap();
    let own = db.create_category(scope, "Housing").unwrap();
    let start = date("2026-01-01");

    let bad = db
        .insert_source(
            &NewSource::fixed(scope, "Bad", dec("10"), Direction::Expense, 3, start)
                .with_category(foreign),
        )
        .unwrap();
    db.insert_source(
        &NewSource::fixed(scope, "Rent", dec("900"), Direction::Expense, 3, start)
            .with_category(own),
    )
    .unwrap();

    let report = cadence.run_automation(scope, date("2026-02-03")).await.unwrap();
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].transaction.category_id, Some(own));
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].source_id, bad);
    assert!(!report.errors[0].retryable);
}

#[tokio::test]
async fn test_malformed_range_rejected_before_processing() {
    let (_db, cadence) = setup();
    let err = cadence
        .forecast_monthly(Scope::user(1), date("2026-03-01"), Some(0))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_runs_create_one_transaction() {
    let (db, cadence) = setup();
    let cadence = Arc::new(cadence);
    let scope = Scope::user(1);
    db.insert_source(&NewSource::fixed(
        scope,
        "Rent",
        dec("1000"),
        Direction::Expense,
        15,
        date("2026-01-01"),
    ))
    .unwrap();

    let a = {
        let cadence = Arc::clone(&cadence);
        tokio::spawn(async move { cadence.run_automation(scope, date("2026-03-15")).await })
    };
    let b = {
        let cadence = Arc::clone(&cadence);
        tokio::spawn(async move { cadence.run_automation(scope, date("2026-03-15")).await })
    };

    let mut created = 0;
    for handle in [a, b] {
        match handle.await.unwrap() {
            Ok(report) => created += report.created.len(),
            // Losing the lease race is retryable and writes nothing
            Err(e) => assert!(e.is_retryable()),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(
        db.list_transactions(scope, date("2026-03-01"), date("2026-03-31"), ProvenanceFilter::Any)
            .unwrap()
            .len(),
        1
    );
}

// =============================================================================
// Forecast
// =============================================================================

#[tokio::test]
async fn test_forecast_goes_negative_with_short_income() {
    let (db, cadence) = setup();
    let scope = Scope::user(1);
    db.insert_source(&NewSource::fixed(
        scope,
        "Rent",
        dec("1200"),
        Direction::Expense,
        1,
        date("2026-01-01"),
    ))
    .unwrap();
    for month in ["2026-04-01", "2026-05-01", "2026-06-01"] {
        db.set_expected_income(scope, Granularity::Month, date(month), dec("1000"))
            .unwrap();
    }

    let forecast = cadence
        .forecast_monthly(scope, date("2026-04-01"), Some(3))
        .await
        .unwrap();

    let closings: Vec<Decimal> = forecast.periods.iter().map(|p| p.closing_balance).collect();
    assert_eq!(closings, vec![dec("-200"), dec("-400"), dec("-600")]);
    assert!(forecast.has_negative_periods);
    assert_eq!(forecast.first_negative_period.as_deref(), Some("2026-04"));
}

#[tokio::test]
async fn test_income_installment_counts_as_income_and_terminates() {
    let (db, cadence) = setup();
    let scope = Scope::user(1);
    db.record_balance(scope, date("2026-02-28"), dec("100"), "USD", true)
        .unwrap();
    db.insert_source(&NewSource::installment(
        scope,
        "Buyout",
        dec("200"),
        Direction::Income,
        10,
        date("2026-01-10"),
        3,
        1,
    ))
    .unwrap();

    let forecast = cadence
        .forecast_monthly(scope, date("2026-03-01"), Some(5))
        .await
        .unwrap();

    let incomes: Vec<Decimal> = forecast.periods.iter().map(|p| p.total_income).collect();
    assert_eq!(
        incomes,
        vec![dec("200"), dec("200"), dec("0"), dec("0"), dec("0")]
    );
    assert!(forecast
        .periods
        .iter()
        .all(|p| p.total_expenses == Decimal::ZERO));
    assert_eq!(forecast.closing_balance(), dec("500"));

    // Continuity across every boundary
    for pair in forecast.periods.windows(2) {
        assert_eq!(pair[1].opening_balance, pair[0].closing_balance);
    }
}

#[tokio::test]
async fn test_completed_source_leaves_forecast() {
    let (db, cadence) = setup();
    let scope = Scope::user(1);
    db.insert_source(&NewSource::installment(
        scope,
        "Sofa",
        dec("150"),
        Direction::Expense,
        10,
        date("2026-01-10"),
        3,
        1,
    ))
    .unwrap();

    for day in ["2026-02-10", "2026-03-10"] {
        cadence.run_automation(scope, date(day)).await.unwrap();
    }
    assert!(db.due_sources(scope, date("2026-04-10")).unwrap().is_empty());

    let forecast = cadence
        .forecast_monthly(scope, date("2026-04-01"), Some(3))
        .await
        .unwrap();
    assert!(forecast
        .periods
        .iter()
        .all(|p| p.breakdown.installment_expenses == Decimal::ZERO));
}

#[tokio::test]
async fn test_daily_run_keeps_payments_made_today_in_forecast() {
    let (db, cadence) = setup();
    let scope = Scope::user(1);
    db.record_balance(scope, date("2026-03-01"), dec("1000"), "USD", true)
        .unwrap();
    db.insert_source(&NewSource::installment(
        scope,
        "Final stretch",
        dec("100"),
        Direction::Expense,
        15,
        date("2026-01-15"),
        3,
        2,
    ))
    .unwrap();
    db.insert_source(&NewSource::installment(
        scope,
        "Midway",
        dec("50"),
        Direction::Expense,
        15,
        date("2026-02-15"),
        3,
        1,
    ))
    .unwrap();
    db.insert_source(&NewSource::loan(
        scope,
        "Car",
        dec("400"),
        15,
        date("2026-01-15"),
        Decimal::ZERO,
        2,
        dec("700"),
    ))
    .unwrap();

    let today = date("2026-03-15");
    let before = cadence.forecast_monthly(scope, today, None).await.unwrap();
    let run = cadence.run_daily(scope, today).await.unwrap();
    assert_eq!(run.automation.created.len(), 3);
    assert_eq!(run.automation.completed_sources.len(), 1);

    let installments = |f: &Forecast| -> Vec<Decimal> {
        f.periods
            .iter()
            .map(|p| p.breakdown.installment_expenses)
            .collect()
    };
    let loans = |f: &Forecast| -> Vec<Decimal> {
        f.periods.iter().map(|p| p.breakdown.loan_payments).collect()
    };

    // March carries both final payments, April the last "Midway" payment
    assert_eq!(&installments(&run.forecast)[..3], &[dec("150"), dec("50"), dec("0")]);
    assert_eq!(&loans(&run.forecast)[..3], &[dec("400"), dec("400"), dec("0")]);

    // Materializing today's occurrences does not change the projection
    assert_eq!(installments(&run.forecast), installments(&before));
    assert_eq!(loans(&run.forecast), loans(&before));
    let closings = |f: &Forecast| -> Vec<Decimal> {
        f.periods.iter().map(|p| p.closing_balance).collect()
    };
    assert_eq!(closings(&run.forecast), closings(&before));
    assert_eq!(run.forecast.periods[0].closing_balance, dec("450"));
}

#[tokio::test]
async fn test_weekly_forecast_covers_manual_entries() {
    let (db, cadence) = setup();
    let scope = Scope::user(1);
    db.create_transaction(&NewLedgerTransaction::manual(
        scope,
        dec("75"),
        Direction::Expense,
        date("2026-03-11"),
        "Dentist",
    ))
    .unwrap();

    // 2026-03-09 is a Monday
    let forecast = cadence
        .forecast_weekly(scope, date("2026-03-09"), Some(2))
        .await
        .unwrap();
    assert_eq!(forecast.periods.len(), 2);
    assert_eq!(forecast.periods[0].breakdown.one_time_expenses, dec("75"));
    assert_eq!(forecast.periods[1].opening_balance, dec("-75"));
}

#[tokio::test]
async fn test_summary_totals_match_periods() {
    let (db, cadence) = setup();
    let scope = Scope::user(1);
    db.record_balance(scope, date("2026-03-01"), dec("1000"), "USD", true)
        .unwrap();
    db.insert_source(&NewSource::fixed(
        scope,
        "Salary",
        dec("3000"),
        Direction::Income,
        25,
        date("2026-01-01"),
    ))
    .unwrap();
    db.insert_source(&NewSource::fixed(
        scope,
        "Rent",
        dec("1800"),
        Direction::Expense,
        1,
        date("2026-01-01"),
    ))
    .unwrap();

    let summary = cadence
        .forecast_summary(scope, date("2026-04-01"), Some(4))
        .await
        .unwrap();
    assert_eq!(summary.months, 4);
    assert_eq!(summary.total_income, dec("12000"));
    assert_eq!(summary.total_expenses, dec("7200"));
    assert_eq!(summary.ending_balance, dec("5800"));
    assert!(!summary.has_negative_periods);
}

// =============================================================================
// Alerts
// =============================================================================

#[tokio::test]
async fn test_read_alert_survives_and_resolves() {
    let (db, cadence) = setup();
    let scope = Scope::user(1);
    db.record_balance(scope, date("2026-03-01"), dec("300"), "USD", true)
        .unwrap();

    let first = cadence
        .reconcile_alerts(scope, date("2026-03-02"), None)
        .await
        .unwrap();
    let low = first
        .active
        .iter()
        .find(|a| a.alert_type == AlertType::LowBalance)
        .cloned()
        .unwrap();
    assert_eq!(low.severity, Severity::Warning);

    cadence.mark_alert_read(scope, low.id).await.unwrap();

    let second = cadence
        .reconcile_alerts(scope, date("2026-03-03"), None)
        .await
        .unwrap();
    let again = second.active.iter().find(|a| a.id == low.id).unwrap();
    assert!(again.is_read);
    assert_eq!(second.created, 0);

    // Balance recovers: the alert is resolved, not deleted
    db.record_balance(scope, date("2026-03-04"), dec("2000"), "USD", true)
        .unwrap();
    let third = cadence
        .reconcile_alerts(scope, date("2026-03-04"), None)
        .await
        .unwrap();
    assert!(third.active.iter().all(|a| a.id != low.id));
    assert_eq!(third.resolved.len(), 1);

    let history = cadence
        .list_alerts(
            scope,
            AlertFilter {
                include_resolved: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let kept = history.iter().find(|a| a.id == low.id).unwrap();
    assert!(kept.is_resolved());
    assert!(kept.is_read);
}

#[tokio::test]
async fn test_daily_run_raises_negative_and_failure_alerts() {
    let (db, cadence) = setup();
    let scope = Scope::user(1);
    let foreign = db.create_category(Scope::user(9), "Other").unwrap();
    db.record_balance(scope, date("2026-03-01"), dec("1000"), "USD", true)
        .unwrap();
    db.insert_source(&NewSource::fixed(
        scope,
        "Mortgage",
        dec("1500"),
        Direction::Expense,
        1,
        date("2026-01-01"),
    ))
    .unwrap();
    db.insert_source(
        &NewSource::fixed(
            scope,
            "Misfiled",
            dec("20"),
            Direction::Expense,
            1,
            date("2026-01-01"),
        )
        .with_category(foreign),
    )
    .unwrap();

    let run = cadence.run_daily(scope, date("2026-03-01")).await.unwrap();
    assert_eq!(run.automation.created.len(), 1);
    assert!(run.forecast.has_negative_periods);

    let types: Vec<AlertType> = run.alerts.active.iter().map(|a| a.alert_type).collect();
    assert!(types.contains(&AlertType::NegativeBalance));
    assert!(types.contains(&AlertType::AutomationFailed));

    // Same day again: nothing new, nothing duplicated
    let rerun = cadence.run_daily(scope, date("2026-03-01")).await.unwrap();
    assert!(rerun.automation.created.is_empty());
    assert_eq!(rerun.alerts.created, 0);
    assert_eq!(rerun.alerts.active.len(), run.alerts.active.len());

    let unread = cadence.count_unread_alerts(scope).await.unwrap();
    assert_eq!(unread as usize, run.alerts.active.len());
}

#[tokio::test]
async fn test_dismissed_alert_hidden_from_listing() {
    let (db, cadence) = setup();
    let scope = Scope::organization(2);
    db.record_balance(scope, date("2026-03-01"), dec("50"), "USD", true)
        .unwrap();

    let reconciled = cadence
        .reconcile_alerts(scope, date("2026-03-01"), None)
        .await
        .unwrap();
    let low = reconciled
        .active
        .iter()
        .find(|a| a.alert_type == AlertType::LowBalance)
        .unwrap();
    assert_eq!(low.severity, Severity::Critical);

    cadence.dismiss_alert(scope, low.id).await.unwrap();
    let listed = cadence
        .list_alerts(scope, AlertFilter::default())
        .await
        .unwrap();
    assert!(listed.iter().all(|a| a.id != low.id));
}
