//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` / `open_service` - Shared utilities to open the database and engines
//! - argument parsing helpers (scope, dates, amounts, enums)
//! - output helpers (money formatting, JSON)
//! - `cmd_init` - Initialize the database

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use cadence_core::models::{parse_date, parse_month, Granularity, Scope};
use cadence_core::{Cadence, CoreConfig, Database};
use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Wrap an open database in the engines, using the layered config
pub fn open_service(db: Database, config_path: Option<&Path>) -> Result<Cadence<Database>> {
    let config = CoreConfig::load_from(config_path).context("Failed to load config")?;
    Ok(Cadence::new(Arc::new(db), config))
}

pub fn parse_scope(s: &str) -> Result<Scope> {
    s.parse::<Scope>()
        .with_context(|| format!("Invalid --scope '{}'", s))
}

/// Parse a YYYY-MM-DD argument, defaulting to today
pub fn date_or_today(s: Option<&str>) -> Result<NaiveDate> {
    match s {
        Some(s) => Ok(parse_date(s)?),
        None => Ok(Local::now().date_naive()),
    }
}

pub fn parse_amount(s: &str) -> Result<Decimal> {
    s.trim()
        .trim_start_matches('$')
        .parse::<Decimal>()
        .with_context(|| format!("Invalid amount '{}'", s))
}

/// Parse any core enum whose `FromStr` reports a message
pub fn parse_enum<T: FromStr<Err = String>>(s: &str) -> Result<T> {
    s.parse::<T>().map_err(|e| anyhow!(e))
}

/// Period start for expected income: YYYY-MM (or any day in the month) for
/// months, the week's first day for weeks
pub fn parse_period(granularity: Granularity, s: &str) -> Result<NaiveDate> {
    match granularity {
        Granularity::Month => match parse_month(s) {
            Ok(month) => Ok(month),
            Err(_) => {
                let day = parse_date(s)?;
                Ok(parse_month(&day.format("%Y-%m").to_string())?)
            }
        },
        Granularity::Week => Ok(parse_date(s)?),
    }
}

/// Format money with color: red when negative
pub fn format_money(amount: Decimal) -> String {
    if amount < Decimal::ZERO {
        format!("\x1b[31m-${:.2}\x1b[0m", amount.abs())
    } else {
        format!("${:.2}", amount)
    }
}

/// Signed amount with color: red for money out, green for money in
pub fn format_signed(amount: Decimal) -> String {
    if amount < Decimal::ZERO {
        format!("\x1b[31m-${:.2}\x1b[0m", amount.abs())
    } else {
        format!("\x1b[32m+${:.2}\x1b[0m", amount)
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let _db = open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Record a balance:  cadence balance set 2500");
    println!("  2. Add obligations:   cadence sources add --name Rent --amount 1200 --day 1");
    println!("  3. Run automation:    cadence daily");

    Ok(())
}
