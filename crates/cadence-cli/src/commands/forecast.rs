//! Forecast command implementations

use anyhow::Result;
use cadence_core::models::Scope;
use cadence_core::{Cadence, Database, Forecast};
use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{format_money, format_signed, print_json};

pub async fn cmd_forecast_monthly(
    cadence: &Cadence<Database>,
    scope: Scope,
    start: NaiveDate,
    months: Option<u32>,
    json: bool,
) -> Result<()> {
    let forecast = cadence.forecast_monthly(scope, start, months).await?;
    if json {
        return print_json(&forecast);
    }
    print_forecast("Monthly", &forecast);
    Ok(())
}

pub async fn cmd_forecast_weekly(
    cadence: &Cadence<Database>,
    scope: Scope,
    start: NaiveDate,
    weeks: Option<u32>,
    json: bool,
) -> Result<()> {
    let forecast = cadence.forecast_weekly(scope, start, weeks).await?;
    if json {
        return print_json(&forecast);
    }
    print_forecast("Weekly", &forecast);
    Ok(())
}

fn print_forecast(title: &str, forecast: &Forecast) {
    println!();
    println!("📈 {} forecast for {}", title, forecast.scope);
    println!("   ─────────────────────────────────────────────────────────────");
    match forecast.balance_as_of {
        Some(as_of) => println!(
            "   Starting balance: {} (confirmed {})",
            format_money(forecast.opening_balance_at_start),
            as_of
        ),
        None => println!("   Starting balance: $0.00 (no confirmed balance recorded)"),
    }
    if forecast.mixed_currencies {
        println!(
            "   ⚠️  Mixed currencies summed without conversion: {}",
            forecast.currencies.join(", ")
        );
    }
    println!();
    println!(
        "   {:<10} │ {:>12} │ {:>12} │ {:>12} │ {:>12}",
        "Period", "Income", "Expenses", "Net", "Closing"
    );

    for period in &forecast.periods {
        let marker = if period.closing_balance < Decimal::ZERO {
            " ⚠️"
        } else {
            ""
        };
        println!(
            "   {:<10} │ {:>12} │ {:>12} │ {:>12} │ {:>12}{}",
            period.label,
            format!("${:.2}", period.total_income),
            format!("${:.2}", period.total_expenses),
            format_signed(period.net_change),
            format_money(period.closing_balance),
            marker
        );
    }

    println!();
    match &forecast.first_negative_period {
        Some(first) => println!("   ⚠️  Balance goes negative in {}", first),
        None => println!("   ✅ Balance stays positive"),
    }
}

pub async fn cmd_forecast_summary(
    cadence: &Cadence<Database>,
    scope: Scope,
    start: NaiveDate,
    months: Option<u32>,
    json: bool,
) -> Result<()> {
    let summary = cadence.forecast_summary(scope, start, months).await?;
    if json {
        return print_json(&summary);
    }

    println!();
    println!(
        "📊 Forecast summary for {} ({} months from {})",
        summary.scope, summary.months, summary.start_date
    );
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Opening balance:   {}", format_money(summary.opening_balance));
    println!("   Total income:      ${:.2}", summary.total_income);
    println!("   Total expenses:    ${:.2}", summary.total_expenses);
    println!("   Net change:        {}", format_signed(summary.net_change));
    println!("   Average per month: {}", format_signed(summary.average_monthly_net));
    println!("   Ending balance:    {}", format_money(summary.ending_balance));
    if let Some(period) = &summary.lowest_period {
        println!(
            "   Lowest point:      {} in {}",
            format_money(summary.lowest_closing_balance),
            period
        );
    }
    if let Some(first) = &summary.first_negative_period {
        println!();
        println!("   ⚠️  Balance goes negative in {}", first);
    }
    Ok(())
}
