//! Cadence Core Library
//!
//! Recurring financial obligations and what they do to the balance:
//! - Recurring source catalog (fixed, installment, loan)
//! - Automation engine that materializes due occurrences exactly once
//! - Cash-flow forecast by month or week
//! - Alert reconciliation against the forecast
//! - Encrypted SQLite store with bounded-time access
//! - Per-scope leases and an optional background scheduler

pub mod alerts;
pub mod automation;
pub mod config;
pub mod db;
pub mod error;
pub mod forecast;
pub mod lease;
pub mod models;
pub mod scheduler;
pub mod service;
pub mod sources;
pub mod store;

pub use alerts::{AlertReconciler, Reconciliation};
pub use automation::{AutomationEngine, AutomationReport, RunMode, SourceFailure};
pub use config::{AlertThresholds, CoreConfig, ForecastConfig, RuntimeConfig};
pub use db::Database;
pub use error::{Error, Result};
pub use forecast::{Forecast, ForecastEngine, ForecastPeriod, ForecastSummary};
pub use lease::{LeasePurpose, LeaseRegistry};
pub use scheduler::{start_scheduler, ScheduleConfig};
pub use service::{Cadence, DailyRun};
pub use store::{Store, StoreHandle};
