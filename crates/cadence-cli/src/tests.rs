//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::sync::Arc;

use cadence_core::db::Database;
use cadence_core::models::{
    parse_date, AlertFilter, Direction, Granularity, ProvenanceFilter, Scope, SourceKind,
};
use cadence_core::store::{BalanceStore, CatalogStore, LedgerStore};
use cadence_core::{Cadence, CoreConfig};
use rust_decimal::Decimal;

use crate::commands::{self, truncate, SourceSpec};

fn scope() -> Scope {
    Scope::user(1)
}

fn setup_service() -> Cadence<Database> {
    let db = Database::in_memory().unwrap();
    Cadence::new(Arc::new(db), CoreConfig::default())
}

fn rent_spec() -> SourceSpec<'static> {
    SourceSpec {
        kind: "fixed",
        name: "Rent",
        amount: "1200",
        day: 1,
        start: Some("2026-01-01"),
        direction: "expense",
        currency: "USD",
        ..Default::default()
    }
}

// ========== Setup Command Tests ==========

#[test]
fn test_cmd_init_creates_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cadence.db");

    commands::cmd_init(&path, true).unwrap();
    assert!(path.exists());

    // Reopening works and the schema is in place
    let db = commands::open_db(&path, true).unwrap();
    assert!(db.list_sources(scope(), false).unwrap().is_empty());
}

#[test]
fn test_cmd_status_without_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.db");
    assert!(commands::cmd_status(&path, true, scope()).is_ok());
    assert!(!path.exists());
}

#[test]
fn test_parse_helpers() {
    assert_eq!(commands::parse_scope("org:3").unwrap(), Scope::organization(3));
    assert!(commands::parse_scope("group:3").is_err());

    assert_eq!(commands::parse_amount("$12.50").unwrap(), "12.50".parse::<Decimal>().unwrap());
    assert!(commands::parse_amount("twelve").is_err());

    assert_eq!(
        commands::parse_period(Granularity::Month, "2026-03").unwrap(),
        parse_date("2026-03-01").unwrap()
    );
    assert_eq!(
        commands::parse_period(Granularity::Month, "2026-03-17").unwrap(),
        parse_date("2026-03-01").unwrap()
    );
    assert_eq!(
        commands::parse_period(Granularity::Week, "2026-03-09").unwrap(),
        parse_date("2026-03-09").unwrap()
    );
    assert!(commands::parse_enum::<Direction>("sideways").is_err());
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a very long description", 10), "a very ...");
    // Multi-byte characters are not split
    assert_eq!(truncate("café crème brûlée", 8), "café ...");
}

// ========== Sources Command Tests ==========

#[test]
fn test_cmd_sources_add_fixed() {
    let db = Database::in_memory().unwrap();
    commands::cmd_sources_add(&db, scope(), &rent_spec()).unwrap();

    let sources = db.list_sources(scope(), true).unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].name, "Rent");
    assert_eq!(sources[0].direction, Direction::Expense);
    assert!(commands::cmd_sources_list(&db, scope(), false, false).is_ok());
    assert!(commands::cmd_sources_list(&db, scope(), false, true).is_ok());
}

#[test]
fn test_cmd_sources_add_loan_requires_terms() {
    let db = Database::in_memory().unwrap();
    let missing = SourceSpec {
        kind: "loan",
        name: "Car",
        amount: "350",
        day: 10,
        start: Some("2026-01-10"),
        direction: "expense",
        currency: "USD",
        ..Default::default()
    };
    assert!(commands::cmd_sources_add(&db, scope(), &missing).is_err());

    let complete = SourceSpec {
        payments: Some(36),
        paid: 4,
        rate: Some("5.5"),
        balance: Some("9000"),
        ..missing
    };
    commands::cmd_sources_add(&db, scope(), &complete).unwrap();

    let source = &db.list_sources(scope(), true).unwrap()[0];
    assert!(matches!(
        source.kind,
        SourceKind::Loan {
            total_payments: 36,
            payments_made: 4,
            ..
        }
    ));
}

#[test]
fn test_cmd_sources_add_rejects_unknown_kind() {
    let db = Database::in_memory().unwrap();
    let spec = SourceSpec {
        kind: "annuity",
        ..rent_spec()
    };
    assert!(commands::cmd_sources_add(&db, scope(), &spec).is_err());
}

#[test]
fn test_cmd_sources_disable_and_enable() {
    let db = Database::in_memory().unwrap();
    commands::cmd_sources_add(&db, scope(), &rent_spec()).unwrap();
    let id = db.list_sources(scope(), true).unwrap()[0].id;

    commands::cmd_sources_set_active(&db, scope(), id, false).unwrap();
    assert!(db.list_sources(scope(), true).unwrap().is_empty());

    commands::cmd_sources_set_active(&db, scope(), id, true).unwrap();
    assert_eq!(db.list_sources(scope(), true).unwrap().len(), 1);

    assert!(commands::cmd_sources_set_active(&db, scope(), id + 1, false).is_err());
}

#[test]
fn test_cmd_categories() {
    let db = Database::in_memory().unwrap();
    commands::cmd_categories_add(&db, scope(), "Housing").unwrap();
    assert!(commands::cmd_categories_add(&db, scope(), "Housing").is_err());
    assert_eq!(db.list_categories(scope()).unwrap().len(), 1);
    assert!(commands::cmd_categories_list(&db, scope(), false).is_ok());
}

// ========== Ledger / Balance / Income Command Tests ==========

#[test]
fn test_cmd_ledger_add_and_list() {
    let db = Database::in_memory().unwrap();
    commands::cmd_ledger_add(
        &db,
        scope(),
        "45.10",
        "expense",
        Some("2026-03-04"),
        "Groceries",
        None,
    )
    .unwrap();

    let from = parse_date("2026-03-01").unwrap();
    let to = parse_date("2026-03-31").unwrap();
    let txs = db
        .list_transactions(scope(), from, to, ProvenanceFilter::Manual)
        .unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].signed_amount(), "-45.10".parse::<Decimal>().unwrap());

    assert!(commands::cmd_ledger_list(&db, scope(), Some(from), Some(to), "manual", false).is_ok());
    assert!(commands::cmd_ledger_list(&db, scope(), Some(from), Some(to), "bogus", false).is_err());
}

#[test]
fn test_cmd_balance_set_and_show() {
    let db = Database::in_memory().unwrap();
    commands::cmd_balance_set(&db, scope(), "2500", Some("2026-03-01"), "USD").unwrap();

    let (amount, as_of) = db.latest_confirmed_balance(scope()).unwrap().unwrap();
    assert_eq!(amount, Decimal::from(2500));
    assert_eq!(as_of, parse_date("2026-03-01").unwrap());
    assert!(commands::cmd_balance_show(&db, scope(), 5, true).is_ok());
}

#[test]
fn test_cmd_income_set_and_clear() {
    let db = Database::in_memory().unwrap();
    commands::cmd_income_set(&db, scope(), "2026-04", "900", "month").unwrap();

    let april = parse_date("2026-04-01").unwrap();
    let declared = db
        .expected_income(scope(), Granularity::Month, april, april)
        .unwrap();
    assert_eq!(declared.len(), 1);

    commands::cmd_income_clear(&db, scope(), "2026-04", "month").unwrap();
    assert!(db
        .expected_income(scope(), Granularity::Month, april, april)
        .unwrap()
        .is_empty());
    assert!(commands::cmd_income_set(&db, scope(), "2026-04", "900", "yearly").is_err());
}

// ========== Engine Command Tests ==========

#[tokio::test]
async fn test_cmd_run_preview_then_commit() {
    let cadence = setup_service();
    commands::cmd_sources_add(cadence.store(), scope(), &rent_spec()).unwrap();
    let date = parse_date("2026-03-01").unwrap();

    commands::cmd_run(&cadence, scope(), date, true, false)
        .await
        .unwrap();
    let range = (date, date);
    assert!(cadence
        .store()
        .list_transactions(scope(), range.0, range.1, ProvenanceFilter::Any)
        .unwrap()
        .is_empty());

    commands::cmd_run(&cadence, scope(), date, false, true)
        .await
        .unwrap();
    assert_eq!(
        cadence
            .store()
            .list_transactions(scope(), range.0, range.1, ProvenanceFilter::Any)
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_cmd_daily_and_alerts() {
    let cadence = setup_service();
    commands::cmd_balance_set(cadence.store(), scope(), "200", Some("2026-03-01"), "USD").unwrap();
    commands::cmd_sources_add(cadence.store(), scope(), &rent_spec()).unwrap();

    let date = parse_date("2026-03-01").unwrap();
    commands::cmd_daily(&cadence, scope(), date, false)
        .await
        .unwrap();

    let alerts = cadence
        .list_alerts(scope(), AlertFilter::default())
        .await
        .unwrap();
    assert!(!alerts.is_empty());

    let id = alerts[0].id;
    commands::cmd_alerts_read(&cadence, scope(), id).await.unwrap();
    commands::cmd_alerts_dismiss(&cadence, scope(), id)
        .await
        .unwrap();
    assert!(commands::cmd_alerts_list(&cadence, scope(), AlertFilter::default(), false)
        .await
        .is_ok());
    assert!(commands::cmd_alerts_read(&cadence, scope(), id + 1000)
        .await
        .is_err());
}

#[tokio::test]
async fn test_cmd_forecast_variants() {
    let cadence = setup_service();
    commands::cmd_sources_add(cadence.store(), scope(), &rent_spec()).unwrap();
    let start = parse_date("2026-03-01").unwrap();

    assert!(commands::cmd_forecast_monthly(&cadence, scope(), start, Some(3), false)
        .await
        .is_ok());
    assert!(commands::cmd_forecast_weekly(&cadence, scope(), start, Some(4), true)
        .await
        .is_ok());
    assert!(commands::cmd_forecast_summary(&cadence, scope(), start, None, false)
        .await
        .is_ok());
    assert!(commands::cmd_forecast_monthly(&cadence, scope(), start, Some(0), false)
        .await
        .is_err());
}

#[tokio::test]
async fn test_cmd_watch_rejects_bad_schedule() {
    let cadence = Arc::new(setup_service());
    assert!(commands::cmd_watch(Arc::clone(&cadence), 0, vec![scope()])
        .await
        .is_err());
    assert!(commands::cmd_watch(cadence, 24, vec![]).await.is_err());
}
