//! Ledger, balance and expected-income command implementations

use anyhow::Result;
use cadence_core::models::{Direction, Granularity, NewLedgerTransaction, ProvenanceFilter, Scope};
use cadence_core::store::LedgerStore;
use cadence_core::Database;
use chrono::{Datelike, Local, NaiveDate};
use rust_decimal::Decimal;

use super::{
    date_or_today, format_money, format_signed, parse_amount, parse_enum, parse_period,
    print_json, truncate,
};

pub fn cmd_ledger_list(
    db: &Database,
    scope: Scope,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    provenance: &str,
    json: bool,
) -> Result<()> {
    let filter: ProvenanceFilter = parse_enum(provenance)?;
    let today = Local::now().date_naive();
    let to = to.unwrap_or(today);
    let from = from.unwrap_or_else(|| to.with_day(1).unwrap_or(to));

    let transactions = db.list_transactions(scope, from, to, filter)?;

    if json {
        return print_json(&transactions);
    }

    if transactions.is_empty() {
        println!("No transactions between {} and {}.", from, to);
        return Ok(());
    }

    println!();
    println!("📝 Ledger {} to {} ({})", from, to, scope);
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in &transactions {
        let origin = match tx.provenance {
            Some(p) => format!("{} #{}", p.source_type, p.source_id),
            None => "manual".to_string(),
        };
        println!(
            "   [{}] {} │ {:>12} │ {:<32} │ {}",
            tx.id,
            tx.occurrence_date,
            format_signed(tx.signed_amount()),
            truncate(&tx.description, 32),
            origin
        );
    }

    let net: Decimal = transactions.iter().map(|t| t.signed_amount()).sum();
    println!();
    println!("   Net: {}", format_signed(net));
    Ok(())
}

pub fn cmd_ledger_add(
    db: &Database,
    scope: Scope,
    amount: &str,
    direction: &str,
    date: Option<&str>,
    description: &str,
    category: Option<i64>,
) -> Result<()> {
    let amount = parse_amount(amount)?;
    let direction: Direction = parse_enum(direction)?;
    let date = date_or_today(date)?;

    let mut tx = NewLedgerTransaction::manual(scope, amount, direction, date, description);
    if let Some(category) = category {
        tx = tx.with_category(category);
    }
    let id = db.create_transaction(&tx)?;

    println!(
        "✅ Recorded [{}] {} │ {} │ {}",
        id,
        date,
        format_signed(tx.signed_amount()),
        description
    );
    Ok(())
}

pub fn cmd_balance_set(
    db: &Database,
    scope: Scope,
    amount: &str,
    date: Option<&str>,
    currency: &str,
) -> Result<()> {
    let amount = parse_amount(amount)?;
    let as_of = date_or_today(date)?;
    db.record_balance(scope, as_of, amount, currency, true)?;

    println!(
        "✅ Balance for {} on {}: {} {}",
        scope,
        as_of,
        format_money(amount),
        currency
    );
    Ok(())
}

pub fn cmd_balance_show(db: &Database, scope: Scope, limit: i64, json: bool) -> Result<()> {
    let balances = db.list_balances(scope, limit)?;

    if json {
        return print_json(&balances);
    }

    if balances.is_empty() {
        println!("No balances recorded. Set one with: cadence balance set <amount>");
        return Ok(());
    }

    println!();
    println!("💰 Balances ({})", scope);
    println!("   ─────────────────────────────");
    for record in balances {
        let note = if record.confirmed { "" } else { " (unconfirmed)" };
        println!(
            "   {} │ {:>12} {}{}",
            record.as_of,
            format_money(record.amount),
            record.currency,
            note
        );
    }
    Ok(())
}

pub fn cmd_income_set(
    db: &Database,
    scope: Scope,
    period: &str,
    amount: &str,
    granularity: &str,
) -> Result<()> {
    let granularity: Granularity = parse_enum(granularity)?;
    let period_start = parse_period(granularity, period)?;
    let amount = parse_amount(amount)?;
    db.set_expected_income(scope, granularity, period_start, amount)?;

    println!(
        "✅ Expected {} income from {}: {}",
        granularity.as_str(),
        period_start,
        format_money(amount)
    );
    Ok(())
}

pub fn cmd_income_clear(db: &Database, scope: Scope, period: &str, granularity: &str) -> Result<()> {
    let granularity: Granularity = parse_enum(granularity)?;
    let period_start = parse_period(granularity, period)?;

    if db.clear_expected_income(scope, granularity, period_start)? {
        println!("✅ Cleared expected income for {}", period_start);
    } else {
        println!("No expected income declared for {}", period_start);
    }
    Ok(())
}
