//! Automation command implementations (run, daily, watch)

use std::sync::Arc;

use anyhow::{Context, Result};
use cadence_core::automation::{AutomationReport, RunMode};
use cadence_core::models::Scope;
use cadence_core::scheduler::{schedule_from_args, start_scheduler};
use cadence_core::{Cadence, Database, DailyRun};
use chrono::NaiveDate;

use super::{format_money, format_signed, print_json, truncate};

pub async fn cmd_run(
    cadence: &Cadence<Database>,
    scope: Scope,
    date: NaiveDate,
    preview: bool,
    json: bool,
) -> Result<()> {
    let report = if preview {
        cadence.preview(scope, date).await?
    } else {
        cadence.run_automation(scope, date).await?
    };

    if json {
        return print_json(&report);
    }
    print_report(&report);
    Ok(())
}

fn print_report(report: &AutomationReport) {
    println!();
    match report.mode {
        RunMode::Preview => println!("🔍 Automation preview for {} on {}", report.scope, report.as_of),
        RunMode::Commit => println!("⚙️  Automation for {} on {}", report.scope, report.as_of),
    }
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Due: {}", report.due);

    let verb = match report.mode {
        RunMode::Preview => "Would create",
        RunMode::Commit => "Created",
    };
    println!("   {}: {}", verb, report.created.len());
    for created in &report.created {
        let tx = &created.transaction;
        let id = created
            .id
            .map(|id| format!("[{}]", id))
            .unwrap_or_else(|| "[new]".to_string());
        println!(
            "     {} {} │ {:>12} │ {}",
            id,
            tx.occurrence_date,
            format_signed(tx.signed_amount()),
            truncate(&tx.description, 40)
        );
        if let Some(split) = &created.loan_split {
            println!(
                "            interest {} │ principal {}",
                format_money(split.interest),
                format_money(split.principal)
            );
        }
    }

    println!("   Already recorded: {}", report.skipped_existing);
    if !report.completed_sources.is_empty() {
        println!("   🎉 Completed sources: {:?}", report.completed_sources);
    }
    if report.has_errors() {
        println!();
        println!("   ⚠️  {} source(s) failed:", report.errors.len());
        for failure in &report.errors {
            let hint = if failure.retryable { " (retryable)" } else { "" };
            println!(
                "     [{}] {}: {}{}",
                failure.source_id, failure.source_name, failure.reason, hint
            );
        }
    }
    println!();
    println!("   Net change: {}", format_signed(report.net_amount()));
}

pub async fn cmd_daily(
    cadence: &Cadence<Database>,
    scope: Scope,
    date: NaiveDate,
    json: bool,
) -> Result<()> {
    let run: DailyRun = cadence.run_daily(scope, date).await?;

    if json {
        return print_json(&run);
    }

    print_report(&run.automation);

    println!();
    println!("📈 Forecast ({} months)", run.forecast.periods.len());
    println!(
        "   Ending balance: {}",
        format_money(run.forecast.closing_balance())
    );
    if let Some(first) = &run.forecast.first_negative_period {
        println!("   ⚠️  Balance goes negative in {}", first);
    }

    println!();
    println!(
        "🔔 Alerts: {} active ({} new, {} updated, {} resolved)",
        run.alerts.active.len(),
        run.alerts.created,
        run.alerts.refreshed,
        run.alerts.resolved.len()
    );
    for alert in &run.alerts.active {
        println!("   [{}] {} {}", alert.id, alert.severity, alert.title);
    }

    Ok(())
}

/// Run the daily pipeline on a schedule until Ctrl-C
pub async fn cmd_watch(cadence: Arc<Cadence<Database>>, hours: u64, scopes: Vec<Scope>) -> Result<()> {
    let config = schedule_from_args(hours, scopes)?;

    println!(
        "⏱️  Running daily pipeline every {} hour(s) for: {}",
        config.interval_hours,
        config
            .scopes
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("   Press Ctrl-C to stop.");

    let handle = start_scheduler(cadence, config);
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    handle.abort();

    println!();
    println!("👋 Stopped.");
    Ok(())
}
