//! Alert command implementations

use anyhow::Result;
use cadence_core::models::{AlertFilter, Scope, Severity};
use cadence_core::{Cadence, Database};

use super::print_json;

pub async fn cmd_alerts_list(
    cadence: &Cadence<Database>,
    scope: Scope,
    filter: AlertFilter,
    json: bool,
) -> Result<()> {
    let alerts = cadence.list_alerts(scope, filter).await?;

    if json {
        return print_json(&alerts);
    }

    if alerts.is_empty() {
        println!("✅ No alerts. Run 'cadence daily' to refresh them.");
        return Ok(());
    }

    println!();
    println!("🔔 Alerts for {}", scope);
    println!("   ─────────────────────────────────────────────────────────────");

    for alert in alerts {
        let icon = match alert.severity {
            Severity::Critical => "🚨",
            Severity::Warning => "⚠️ ",
            Severity::Info => "💡",
        };
        let mut flags = Vec::new();
        if !alert.is_read {
            flags.push("new");
        }
        if alert.is_dismissed {
            flags.push("dismissed");
        }
        if alert.is_resolved() {
            flags.push("resolved");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" ({})", flags.join(", "))
        };

        println!("   {} [{}] {}{}", icon, alert.id, alert.title, flags);
        println!("      {}", alert.message);
    }

    println!();
    println!("   Use 'cadence alerts read <id>' or 'cadence alerts dismiss <id>'.");
    Ok(())
}

pub async fn cmd_alerts_read(cadence: &Cadence<Database>, scope: Scope, id: i64) -> Result<()> {
    cadence.mark_alert_read(scope, id).await?;
    println!("✅ Marked alert {} as read", id);
    Ok(())
}

pub async fn cmd_alerts_dismiss(cadence: &Cadence<Database>, scope: Scope, id: i64) -> Result<()> {
    cadence.dismiss_alert(scope, id).await?;
    println!("✅ Dismissed alert {}", id);
    Ok(())
}
