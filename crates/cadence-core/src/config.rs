//! Core configuration
//!
//! Config is loaded with a three-layer resolution:
//! 1. Explicit path, or the override in the data dir
//!    (~/.local/share/cadence/config/cadence.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//! 3. Environment variables override individual settings

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::WeekStart;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/cadence.toml");

/// Environment overrides
pub const WEEK_START_ENV: &str = "CADENCE_WEEK_START";
pub const STORE_TIMEOUT_ENV: &str = "CADENCE_STORE_TIMEOUT_MS";
pub const LEASE_WAIT_ENV: &str = "CADENCE_LEASE_WAIT_MS";

/// Forecast defaults
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastConfig {
    pub week_start: WeekStart,
    pub horizon_months: u32,
    pub horizon_weeks: u32,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            week_start: WeekStart::Monday,
            horizon_months: 6,
            horizon_weeks: 8,
        }
    }
}

/// Alert derivation thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct AlertThresholds {
    /// Current balance below this raises a warning
    pub warning_balance: Decimal,
    /// Current balance below this raises a critical alert
    pub critical_balance: Decimal,
    /// Percent above trailing average that counts as a spike
    pub category_spike_percent: Decimal,
    /// Minimum trailing monthly average for spike detection
    pub category_spike_min_baseline: Decimal,
    /// Months of history behind the trailing average
    pub category_history_months: u32,
    /// Days a completed source keeps its "paid off" notice
    pub completion_notice_days: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            warning_balance: Decimal::from(500),
            critical_balance: Decimal::from(100),
            category_spike_percent: Decimal::from(50),
            category_spike_min_baseline: Decimal::from(50),
            category_history_months: 3,
            completion_notice_days: 30,
        }
    }
}

/// Store and lease timing
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub store_timeout: Duration,
    pub lease_wait: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_millis(5000),
            lease_wait: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoreConfig {
    pub forecast: ForecastConfig,
    pub alerts: AlertThresholds,
    pub runtime: RuntimeConfig,
}

impl CoreConfig {
    /// Load from the default override location (or embedded defaults), then
    /// apply environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load from an explicit file, falling back to the default resolution
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let content = read_config(path)?;
        let mut config = parse_config(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var(WEEK_START_ENV) {
            match v.parse() {
                Ok(ws) => self.forecast.week_start = ws,
                Err(e) => warn!("Ignoring {}: {}", WEEK_START_ENV, e),
            }
        }
        if let Some(ms) = env_millis(STORE_TIMEOUT_ENV) {
            self.runtime.store_timeout = ms;
        }
        if let Some(ms) = env_millis(LEASE_WAIT_ENV) {
            self.runtime.lease_wait = ms;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.alerts.critical_balance > self.alerts.warning_balance {
            return Err(Error::Config(format!(
                "critical_balance ({}) must not exceed warning_balance ({})",
                self.alerts.critical_balance, self.alerts.warning_balance
            )));
        }
        if self.forecast.horizon_months == 0 || self.forecast.horizon_weeks == 0 {
            return Err(Error::Config("forecast horizons must be positive".into()));
        }
        if self.runtime.store_timeout.is_zero() {
            return Err(Error::Config("store_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    let raw = std::env::var(key).ok()?;
    match raw.parse::<u64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
        _ => {
            warn!("Ignoring {}={} (expected positive milliseconds)", key, raw);
            None
        }
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("cadence").join("config").join("cadence.toml"))
}

fn read_config(path: Option<&Path>) -> Result<String> {
    let candidate = match path {
        Some(p) => Some(p.to_path_buf()),
        None => default_config_path(),
    };
    match candidate {
        Some(p) if p.exists() => {
            debug!("Loading config from {}", p.display());
            fs::read_to_string(&p)
                .map_err(|e| Error::Config(format!("Failed to read {}: {}", p.display(), e)))
        }
        _ => Ok(DEFAULT_CONFIG.to_string()),
    }
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    forecast: Option<RawForecast>,
    alerts: Option<RawAlerts>,
    runtime: Option<RawRuntime>,
}

#[derive(Debug, Deserialize)]
struct RawForecast {
    week_start: Option<String>,
    horizon_months: Option<u32>,
    horizon_weeks: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawAlerts {
    warning_balance: Option<Decimal>,
    critical_balance: Option<Decimal>,
    category_spike_percent: Option<Decimal>,
    category_spike_min_baseline: Option<Decimal>,
    category_history_months: Option<u32>,
    completion_notice_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawRuntime {
    store_timeout_ms: Option<u64>,
    lease_wait_ms: Option<u64>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<CoreConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = CoreConfig::default();

    if let Some(forecast) = raw.forecast {
        if let Some(ws) = forecast.week_start {
            config.forecast.week_start = ws.parse().map_err(Error::Config)?;
        }
        if let Some(m) = forecast.horizon_months {
            config.forecast.horizon_months = m;
        }
        if let Some(w) = forecast.horizon_weeks {
            config.forecast.horizon_weeks = w;
        }
    }

    if let Some(alerts) = raw.alerts {
        let t = &mut config.alerts;
        if let Some(v) = alerts.warning_balance {
            t.warning_balance = v;
        }
        if let Some(v) = alerts.critical_balance {
            t.critical_balance = v;
        }
        if let Some(v) = alerts.category_spike_percent {
            t.category_spike_percent = v;
        }
        if let Some(v) = alerts.category_spike_min_baseline {
            t.category_spike_min_baseline = v;
        }
        if let Some(v) = alerts.category_history_months {
            t.category_history_months = v;
        }
        if let Some(v) = alerts.completion_notice_days {
            t.completion_notice_days = v;
        }
    }

    if let Some(runtime) = raw.runtime {
        if let Some(ms) = runtime.store_timeout_ms {
            config.runtime.store_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = runtime.lease_wait_ms {
            config.runtime.lease_wait = Duration::from_millis(ms);
        }
    }

    Ok(config)
}
