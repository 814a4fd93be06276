//! Background scheduler for the daily pipeline
//!
//! Optional; enabled via environment variables:
//!
//! - `CADENCE_SCHEDULE_HOURS`: Interval in hours (e.g., "24" for daily)
//! - `CADENCE_SCHEDULE_SCOPES`: Comma-separated scopes (e.g., "user:1,org:7")
//!
//! Each tick runs automation, forecast and alert reconciliation for every
//! configured scope as of the local date. A failing scope is logged and the
//! rest still run.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::models::Scope;
use crate::service::Cadence;
use crate::store::Store;

pub const SCHEDULE_HOURS_ENV: &str = "CADENCE_SCHEDULE_HOURS";
pub const SCHEDULE_SCOPES_ENV: &str = "CADENCE_SCHEDULE_SCOPES";

/// Configuration for the scheduled daily run
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    /// Interval between runs in hours
    pub interval_hours: u64,
    pub scopes: Vec<Scope>,
    /// Run once immediately instead of waiting a full interval
    pub run_on_start: bool,
}

impl ScheduleConfig {
    /// Parse configuration from environment variables
    ///
    /// Returns None if scheduling is not configured (CADENCE_SCHEDULE_HOURS
    /// not set, zero, or no valid scopes)
    pub fn from_env() -> Option<Self> {
        let interval_hours: u64 = std::env::var(SCHEDULE_HOURS_ENV)
            .ok()
            .and_then(|s| s.parse().ok())?;

        if interval_hours == 0 {
            warn!("{} is 0, scheduled runs disabled", SCHEDULE_HOURS_ENV);
            return None;
        }

        let raw = std::env::var(SCHEDULE_SCOPES_ENV).unwrap_or_default();
        let scopes = match parse_scopes(&raw) {
            Ok(scopes) if !scopes.is_empty() => scopes,
            Ok(_) => {
                warn!("{} is empty, scheduled runs disabled", SCHEDULE_SCOPES_ENV);
                return None;
            }
            Err(e) => {
                warn!("Invalid {}: {}", SCHEDULE_SCOPES_ENV, e);
                return None;
            }
        };

        Some(Self {
            interval_hours,
            scopes,
            run_on_start: false,
        })
    }
}

/// Parse a comma-separated scope list
pub fn parse_scopes(raw: &str) -> Result<Vec<Scope>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Scope>())
        .collect()
}

/// Start the scheduler as a background task
///
/// The task runs until the returned handle is aborted or the runtime shuts
/// down.
pub fn start_scheduler<S: Store>(cadence: Arc<Cadence<S>>, config: ScheduleConfig) -> JoinHandle<()> {
    info!(
        "Starting scheduler: every {} hours for {} scope(s)",
        config.interval_hours,
        config.scopes.len()
    );

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(config.interval_hours * 3600));

        // The first tick fires immediately
        if !config.run_on_start {
            ticker.tick().await;
        }

        loop {
            ticker.tick().await;
            let today = Local::now().date_naive();
            let failed = run_scheduled_pass(&cadence, &config.scopes, today).await;
            if failed > 0 {
                warn!("Scheduled run finished with {} failed scope(s)", failed);
            }
        }
    })
}

/// Run the daily pipeline for each scope; returns how many failed
pub async fn run_scheduled_pass<S: Store>(
    cadence: &Cadence<S>,
    scopes: &[Scope],
    as_of: NaiveDate,
) -> usize {
    let mut failed = 0;
    for &scope in scopes {
        info!(%scope, %as_of, "Running scheduled daily pass");
        match cadence.run_daily(scope, as_of).await {
            Ok(run) => {
                info!(
                    %scope,
                    created = run.automation.created.len(),
                    errors = run.automation.errors.len(),
                    alerts = run.alerts.active.len(),
                    "Scheduled pass completed"
                );
            }
            Err(e) => {
                failed += 1;
                let retryable = e.is_retryable();
                error!(%scope, error = %e, retryable, "Scheduled pass failed");
            }
        }
    }
    failed
}

/// Validate a schedule given on the command line
pub fn schedule_from_args(interval_hours: u64, scopes: Vec<Scope>) -> Result<ScheduleConfig> {
    if interval_hours == 0 {
        return Err(Error::Validation("interval must be at least one hour".into()));
    }
    if scopes.is_empty() {
        return Err(Error::Validation("at least one scope is required".into()));
    }
    Ok(ScheduleConfig {
        interval_hours,
        scopes,
        run_on_start: true,
    })
}
