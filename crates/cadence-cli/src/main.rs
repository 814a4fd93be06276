//! Cadence CLI - Recurring obligations, automated and forecast
//!
//! Usage:
//!   cadence init                      Initialize database
//!   cadence sources add ...           Add a recurring source
//!   cadence run --date 2026-03-15     Materialize what is due
//!   cadence daily                     Automation, forecast and alerts for today
//!   cadence forecast monthly -m 6     Project balances forward

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use anyhow::Result;
use cadence_core::models::{parse_date, AlertFilter, Scope, Severity};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let scope = commands::parse_scope(&cli.scope)?;
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Status => commands::cmd_status(&cli.db, cli.no_encrypt, scope),
        Commands::Run { date, preview } => {
            let date = commands::date_or_today(date.as_deref())?;
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let cadence = commands::open_service(db, config_path)?;
            commands::cmd_run(&cadence, scope, date, preview, cli.json).await
        }
        Commands::Daily { date } => {
            let date = commands::date_or_today(date.as_deref())?;
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let cadence = commands::open_service(db, config_path)?;
            commands::cmd_daily(&cadence, scope, date, cli.json).await
        }
        Commands::Forecast { kind } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let cadence = commands::open_service(db, config_path)?;
            match kind {
                ForecastKind::Monthly { start, months } => {
                    let start = commands::date_or_today(start.as_deref())?;
                    commands::cmd_forecast_monthly(&cadence, scope, start, months, cli.json).await
                }
                ForecastKind::Weekly { start, weeks } => {
                    let start = commands::date_or_today(start.as_deref())?;
                    commands::cmd_forecast_weekly(&cadence, scope, start, weeks, cli.json).await
                }
                ForecastKind::Summary { start, months } => {
                    let start = commands::date_or_today(start.as_deref())?;
                    commands::cmd_forecast_summary(&cadence, scope, start, months, cli.json).await
                }
            }
        }
        Commands::Alerts { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let cadence = commands::open_service(db, config_path)?;
            match action {
                None => {
                    commands::cmd_alerts_list(&cadence, scope, AlertFilter::default(), cli.json)
                        .await
                }
                Some(AlertsAction::List {
                    severity,
                    unread,
                    all,
                }) => {
                    let severity = severity
                        .as_deref()
                        .map(commands::parse_enum::<Severity>)
                        .transpose()?;
                    let filter = AlertFilter {
                        severity,
                        unread_only: unread,
                        include_dismissed: all,
                        include_resolved: all,
                    };
                    commands::cmd_alerts_list(&cadence, scope, filter, cli.json).await
                }
                Some(AlertsAction::Read { id }) => {
                    commands::cmd_alerts_read(&cadence, scope, id).await
                }
                Some(AlertsAction::Dismiss { id }) => {
                    commands::cmd_alerts_dismiss(&cadence, scope, id).await
                }
            }
        }
        Commands::Sources { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None => commands::cmd_sources_list(&db, scope, false, cli.json),
                Some(SourcesAction::List { all }) => {
                    commands::cmd_sources_list(&db, scope, all, cli.json)
                }
                Some(SourcesAction::Add {
                    kind,
                    name,
                    amount,
                    day,
                    start,
                    end,
                    direction,
                    category,
                    payments,
                    paid,
                    rate,
                    balance,
                    currency,
                }) => {
                    let spec = commands::SourceSpec {
                        kind: &kind,
                        name: &name,
                        amount: &amount,
                        day,
                        start: start.as_deref(),
                        end: end.as_deref(),
                        direction: &direction,
                        category,
                        payments,
                        paid,
                        rate: rate.as_deref(),
                        balance: balance.as_deref(),
                        currency: &currency,
                    };
                    commands::cmd_sources_add(&db, scope, &spec)
                }
                Some(SourcesAction::Disable { id }) => {
                    commands::cmd_sources_set_active(&db, scope, id, false)
                }
                Some(SourcesAction::Enable { id }) => {
                    commands::cmd_sources_set_active(&db, scope, id, true)
                }
            }
        }
        Commands::Categories { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(CategoriesAction::List) => {
                    commands::cmd_categories_list(&db, scope, cli.json)
                }
                Some(CategoriesAction::Add { name }) => {
                    commands::cmd_categories_add(&db, scope, &name)
                }
            }
        }
        Commands::Ledger { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None => commands::cmd_ledger_list(&db, scope, None, None, "any", cli.json),
                Some(LedgerAction::List {
                    from,
                    to,
                    provenance,
                }) => {
                    let from = from.as_deref().map(parse_date).transpose()?;
                    let to = to.as_deref().map(parse_date).transpose()?;
                    commands::cmd_ledger_list(&db, scope, from, to, &provenance, cli.json)
                }
                Some(LedgerAction::Add {
                    amount,
                    direction,
                    date,
                    description,
                    category,
                }) => commands::cmd_ledger_add(
                    &db,
                    scope,
                    &amount,
                    &direction,
                    date.as_deref(),
                    &description,
                    category,
                ),
            }
        }
        Commands::Balance { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None => commands::cmd_balance_show(&db, scope, 10, cli.json),
                Some(BalanceAction::Set {
                    amount,
                    date,
                    currency,
                }) => commands::cmd_balance_set(&db, scope, &amount, date.as_deref(), &currency),
                Some(BalanceAction::Show { limit }) => {
                    commands::cmd_balance_show(&db, scope, limit, cli.json)
                }
            }
        }
        Commands::Income { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                IncomeAction::Set {
                    period,
                    amount,
                    granularity,
                } => commands::cmd_income_set(&db, scope, &period, &amount, &granularity),
                IncomeAction::Clear {
                    period,
                    granularity,
                } => commands::cmd_income_clear(&db, scope, &period, &granularity),
            }
        }
        Commands::Watch { hours, scopes } => {
            let scopes = if scopes.is_empty() {
                vec![scope]
            } else {
                scopes
                    .iter()
                    .map(|s| commands::parse_scope(s))
                    .collect::<Result<Vec<Scope>>>()?
            };
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let cadence = Arc::new(commands::open_service(db, config_path)?);
            commands::cmd_watch(cadence, hours, scopes).await
        }
    }
}
