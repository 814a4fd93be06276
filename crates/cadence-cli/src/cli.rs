//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Cadence - Recurring obligations, automated and forecast
#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Recurring-obligation automation, cash-flow forecasting and balance alerts", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "cadence.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set CADENCE_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Config file (defaults to ~/.local/share/cadence/config/cadence.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Owning scope: user:<id> or org:<id>
    #[arg(long, default_value = "user:1", global = true)]
    pub scope: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Show database status (encryption, size, counts)
    Status,

    /// Materialize recurring sources due on a date
    Run {
        /// Date to process (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Report what would be created without writing anything
        #[arg(long)]
        preview: bool,
    },

    /// Run automation, forecast and alert reconciliation for a date
    Daily {
        /// Date to process (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Project balances forward
    Forecast {
        #[command(subcommand)]
        kind: ForecastKind,
    },

    /// Manage alerts (list, read, dismiss)
    Alerts {
        #[command(subcommand)]
        action: Option<AlertsAction>,
    },

    /// Manage recurring sources (list, add, enable, disable)
    Sources {
        #[command(subcommand)]
        action: Option<SourcesAction>,
    },

    /// Manage categories (list, add)
    Categories {
        #[command(subcommand)]
        action: Option<CategoriesAction>,
    },

    /// Ledger transactions (list, add)
    Ledger {
        #[command(subcommand)]
        action: Option<LedgerAction>,
    },

    /// Confirmed balances (set, show)
    Balance {
        #[command(subcommand)]
        action: Option<BalanceAction>,
    },

    /// Declared expected income per period (set, clear)
    Income {
        #[command(subcommand)]
        action: IncomeAction,
    },

    /// Run the daily pipeline on an interval until interrupted
    Watch {
        /// Hours between runs
        #[arg(long, default_value = "24")]
        hours: u64,

        /// Scopes to process (comma-separated, defaults to --scope)
        #[arg(long, value_delimiter = ',')]
        scopes: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum ForecastKind {
    /// Month-by-month projection
    Monthly {
        /// First day to project (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        start: Option<String>,

        /// Number of months (defaults to the configured horizon)
        #[arg(short, long)]
        months: Option<u32>,
    },

    /// Week-by-week projection
    Weekly {
        /// First day to project (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        start: Option<String>,

        /// Number of weeks (defaults to the configured horizon)
        #[arg(short, long)]
        weeks: Option<u32>,
    },

    /// Totals over a monthly projection
    Summary {
        /// First day to project (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        start: Option<String>,

        /// Number of months (defaults to the configured horizon)
        #[arg(short, long)]
        months: Option<u32>,
    },
}

#[derive(Subcommand)]
pub enum AlertsAction {
    /// List alerts (unresolved and not dismissed by default)
    List {
        /// Only this severity: critical, warning, info
        #[arg(long)]
        severity: Option<String>,

        /// Only unread alerts
        #[arg(long)]
        unread: bool,

        /// Include dismissed and resolved alerts
        #[arg(long)]
        all: bool,
    },

    /// Mark an alert as read
    Read {
        /// Alert ID
        id: i64,
    },

    /// Dismiss an alert
    Dismiss {
        /// Alert ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum SourcesAction {
    /// List recurring sources
    List {
        /// Include inactive sources
        #[arg(long)]
        all: bool,
    },

    /// Add a recurring source
    Add {
        /// Source kind: fixed, installment, loan
        #[arg(long, default_value = "fixed")]
        kind: String,

        /// Display name
        #[arg(long)]
        name: String,

        /// Amount per occurrence (monthly payment for installments and loans)
        #[arg(long)]
        amount: String,

        /// Day of month it falls due (1-31, clamped to month end)
        #[arg(long)]
        day: u32,

        /// First date it can occur (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        start: Option<String>,

        /// Last date it can occur (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,

        /// income or expense (loans are always expenses)
        #[arg(long, default_value = "expense")]
        direction: String,

        /// Category ID
        #[arg(long)]
        category: Option<i64>,

        /// Installments: total number of payments; loans: total payments
        #[arg(long)]
        payments: Option<u32>,

        /// Payments already made
        #[arg(long, default_value = "0")]
        paid: u32,

        /// Loans: annual interest rate in percent
        #[arg(long)]
        rate: Option<String>,

        /// Loans: outstanding principal
        #[arg(long)]
        balance: Option<String>,

        /// ISO currency code
        #[arg(long, default_value = "USD")]
        currency: String,
    },

    /// Stop a source from materializing
    Disable {
        /// Source ID
        id: i64,
    },

    /// Resume a disabled source
    Enable {
        /// Source ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum CategoriesAction {
    /// List categories
    List,

    /// Add a category
    Add {
        /// Category name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum LedgerAction {
    /// List transactions in a date range
    List {
        /// Start date (YYYY-MM-DD, defaults to the first of this month)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        to: Option<String>,

        /// any, manual, generated
        #[arg(long, default_value = "any")]
        provenance: String,
    },

    /// Record a one-off transaction
    Add {
        /// Amount (positive magnitude)
        #[arg(long)]
        amount: String,

        /// income or expense
        #[arg(long, default_value = "expense")]
        direction: String,

        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Description
        #[arg(long)]
        description: String,

        /// Category ID
        #[arg(long)]
        category: Option<i64>,
    },
}

#[derive(Subcommand)]
pub enum BalanceAction {
    /// Record a confirmed balance
    Set {
        /// Balance amount
        amount: String,

        /// As-of date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// ISO currency code
        #[arg(long, default_value = "USD")]
        currency: String,
    },

    /// Show recent balances
    Show {
        /// Maximum records to show
        #[arg(short, long, default_value = "10")]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum IncomeAction {
    /// Declare expected income for one period
    Set {
        /// Period: YYYY-MM for months, YYYY-MM-DD (week start) for weeks
        period: String,

        /// Expected amount
        amount: String,

        /// month or week
        #[arg(long, default_value = "month")]
        granularity: String,
    },

    /// Remove a declared figure
    Clear {
        /// Period: YYYY-MM for months, YYYY-MM-DD (week start) for weeks
        period: String,

        /// month or week
        #[arg(long, default_value = "month")]
        granularity: String,
    },
}
