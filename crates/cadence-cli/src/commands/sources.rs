//! Recurring source and category command implementations

use anyhow::{bail, Context, Result};
use cadence_core::models::{parse_date, Direction, NewSource, Scope, SourceKind, SourceStatus};
use cadence_core::store::CatalogStore;
use cadence_core::Database;

use super::{date_or_today, parse_amount, parse_enum, print_json, truncate};

/// Arguments of `cadence sources add`
#[derive(Debug, Default)]
pub struct SourceSpec<'a> {
    pub kind: &'a str,
    pub name: &'a str,
    pub amount: &'a str,
    pub day: u32,
    pub start: Option<&'a str>,
    pub end: Option<&'a str>,
    pub direction: &'a str,
    pub category: Option<i64>,
    pub payments: Option<u32>,
    pub paid: u32,
    pub rate: Option<&'a str>,
    pub balance: Option<&'a str>,
    pub currency: &'a str,
}

/// Turn CLI arguments into a source for `scope`
pub fn build_source(scope: Scope, spec: &SourceSpec<'_>) -> Result<NewSource> {
    let amount = parse_amount(spec.amount)?;
    let start = date_or_today(spec.start)?;
    let direction: Direction = parse_enum(spec.direction)?;

    let mut source = match spec.kind {
        "fixed" => NewSource::fixed(scope, spec.name, amount, direction, spec.day, start),
        "installment" => {
            let payments = spec
                .payments
                .context("--payments is required for installments")?;
            NewSource::installment(
                scope, spec.name, amount, direction, spec.day, start, payments, spec.paid,
            )
        }
        "loan" => {
            let payments = spec.payments.context("--payments is required for loans")?;
            let rate = parse_amount(spec.rate.context("--rate is required for loans")?)?;
            let balance =
                parse_amount(spec.balance.context("--balance is required for loans")?)?;
            NewSource::loan(scope, spec.name, amount, spec.day, start, rate, payments, balance)
                .with_payments_made(spec.paid)
        }
        other => bail!("Unknown source kind: {} (valid: fixed, installment, loan)", other),
    };

    if let Some(end) = spec.end {
        source = source.ending(parse_date(end)?);
    }
    if let Some(category) = spec.category {
        source = source.with_category(category);
    }
    Ok(source.with_currency(spec.currency))
}

pub fn cmd_sources_add(db: &Database, scope: Scope, spec: &SourceSpec<'_>) -> Result<()> {
    let source = build_source(scope, spec)?;
    let id = db.insert_source(&source).context("Failed to add source")?;

    println!(
        "✅ Added {} source '{}' [{}]: ${:.2} on day {}",
        source.kind.source_type(),
        source.name,
        id,
        source.amount,
        source.day_of_month
    );
    Ok(())
}

pub fn cmd_sources_list(db: &Database, scope: Scope, all: bool, json: bool) -> Result<()> {
    let sources = db.list_sources(scope, !all)?;

    if json {
        return print_json(&sources);
    }

    if sources.is_empty() {
        println!("No recurring sources. Add one with:");
        println!("  cadence sources add --name Rent --amount 1200 --day 1");
        return Ok(());
    }

    println!();
    println!("🔁 Recurring Sources ({})", scope);
    println!("   ─────────────────────────────────────────────────────────────");

    for source in sources {
        let sign = match source.direction {
            Direction::Income => "+",
            Direction::Expense => "-",
        };
        let progress = match &source.kind {
            SourceKind::Fixed => String::new(),
            SourceKind::Installment {
                number_of_payments,
                payments_completed,
            } => format!(" {}/{} paid", payments_completed, number_of_payments),
            SourceKind::Loan {
                total_payments,
                payments_made,
                remaining_balance,
                ..
            } => format!(
                " {}/{} paid, ${:.2} owed",
                payments_made, total_payments, remaining_balance
            ),
        };
        let state = match (source.status, source.is_active) {
            (SourceStatus::Completed, _) => " ✔ completed",
            (_, false) => " ⏸ inactive",
            _ => "",
        };

        println!(
            "   [{}] {:<24} │ {}${:.2} {} │ day {:>2} │ {}{}{}",
            source.id,
            truncate(&source.name, 24),
            sign,
            source.amount,
            source.currency,
            source.day_of_month,
            source.source_type(),
            progress,
            state
        );
    }

    Ok(())
}

pub fn cmd_sources_set_active(db: &Database, scope: Scope, id: i64, active: bool) -> Result<()> {
    db.set_source_active(scope, id, active)?;
    if active {
        println!("▶️  Enabled source {}", id);
    } else {
        println!("⏸  Disabled source {}", id);
    }
    Ok(())
}

pub fn cmd_categories_list(db: &Database, scope: Scope, json: bool) -> Result<()> {
    let categories = db.list_categories(scope)?;

    if json {
        return print_json(&categories);
    }

    if categories.is_empty() {
        println!("No categories. Add one with: cadence categories add <name>");
        return Ok(());
    }

    println!();
    println!("🏷️  Categories ({})", scope);
    println!("   ─────────────────────────────");
    for category in categories {
        println!("   [{}] {}", category.id, category.name);
    }
    Ok(())
}

pub fn cmd_categories_add(db: &Database, scope: Scope, name: &str) -> Result<()> {
    let id = db.create_category(scope, name)?;
    println!("✅ Added category '{}' [{}]", name.trim(), id);
    Ok(())
}
