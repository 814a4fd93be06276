//! Service facade wiring the engines to one store
//!
//! [`Cadence`] owns the shared store handle and lease registry so that
//! automation and alert reconciliation for a scope are serialized across every
//! caller (CLI, scheduler, tests) that goes through the same instance.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::alerts::{AlertReconciler, Reconciliation};
use crate::automation::{AutomationEngine, AutomationReport, RunMode};
use crate::config::CoreConfig;
use crate::error::Result;
use crate::forecast::{Forecast, ForecastEngine, ForecastSummary};
use crate::lease::LeaseRegistry;
use crate::models::{Alert, AlertFilter, Scope};
use crate::store::{Store, StoreHandle};

/// Everything one daily pass produced
#[derive(Debug, Clone, Serialize)]
pub struct DailyRun {
    pub automation: AutomationReport,
    pub forecast: Forecast,
    pub alerts: Reconciliation,
}

pub struct Cadence<S> {
    store: StoreHandle<S>,
    automation: AutomationEngine<S>,
    forecast: ForecastEngine<S>,
    alerts: AlertReconciler<S>,
    config: CoreConfig,
}

impl<S: Store> Cadence<S> {
    pub fn new(store: Arc<S>, config: CoreConfig) -> Self {
        let handle = StoreHandle::new(store, config.runtime.store_timeout);
        let leases = Arc::new(LeaseRegistry::new(config.runtime.lease_wait));

        Self {
            automation: AutomationEngine::new(handle.clone(), Arc::clone(&leases)),
            forecast: ForecastEngine::new(handle.clone(), config.forecast.clone()),
            alerts: AlertReconciler::new(handle.clone(), leases, config.alerts.clone()),
            store: handle,
            config,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        self.store.inner()
    }

    /// Materialize everything due on `as_of`
    pub async fn run_automation(&self, scope: Scope, as_of: NaiveDate) -> Result<AutomationReport> {
        self.automation.process(scope, as_of, RunMode::Commit).await
    }

    /// Same as [`Self::run_automation`] without writing anything
    pub async fn preview(&self, scope: Scope, as_of: NaiveDate) -> Result<AutomationReport> {
        self.automation.process(scope, as_of, RunMode::Preview).await
    }

    pub async fn forecast_monthly(
        &self,
        scope: Scope,
        start: NaiveDate,
        months: Option<u32>,
    ) -> Result<Forecast> {
        self.forecast.monthly(scope, start, months).await
    }

    pub async fn forecast_weekly(
        &self,
        scope: Scope,
        start: NaiveDate,
        weeks: Option<u32>,
    ) -> Result<Forecast> {
        self.forecast.weekly(scope, start, weeks).await
    }

    pub async fn forecast_summary(
        &self,
        scope: Scope,
        start: NaiveDate,
        months: Option<u32>,
    ) -> Result<ForecastSummary> {
        self.forecast.summary(scope, start, months).await
    }

    /// Recompute alerts from a fresh monthly forecast
    pub async fn reconcile_alerts(
        &self,
        scope: Scope,
        as_of: NaiveDate,
        automation: Option<&AutomationReport>,
    ) -> Result<Reconciliation> {
        let forecast = self.forecast.monthly(scope, as_of, None).await?;
        let balance = self.current_balance(scope).await?;
        self.alerts
            .reconcile(scope, as_of, &forecast, balance, automation)
            .await
    }

    /// Latest confirmed balance; zero when none was recorded
    pub async fn current_balance(&self, scope: Scope) -> Result<Decimal> {
        let latest = self
            .store
            .call("latest_confirmed_balance", move |s| {
                s.latest_confirmed_balance(scope)
            })
            .await?;
        Ok(latest.map(|(amount, _)| amount).unwrap_or_default())
    }

    /// Automation, then forecast, then alert reconciliation for one date
    pub async fn run_daily(&self, scope: Scope, as_of: NaiveDate) -> Result<DailyRun> {
        let automation = self.automation.process(scope, as_of, RunMode::Commit).await?;
        // Forecast reads after automation committed, so it sees today's rows
        let forecast = self.forecast.monthly(scope, as_of, None).await?;
        let balance = self.current_balance(scope).await?;
        let alerts = self
            .alerts
            .reconcile(scope, as_of, &forecast, balance, Some(&automation))
            .await?;

        info!(
            %scope,
            %as_of,
            created = automation.created.len(),
            negative = forecast.has_negative_periods,
            active_alerts = alerts.active.len(),
            "Daily run complete"
        );

        Ok(DailyRun {
            automation,
            forecast,
            alerts,
        })
    }

    pub async fn list_alerts(&self, scope: Scope, filter: AlertFilter) -> Result<Vec<Alert>> {
        self.store
            .call("list_alerts", move |s| s.list_alerts(scope, &filter))
            .await
    }

    pub async fn mark_alert_read(&self, scope: Scope, id: i64) -> Result<()> {
        self.store
            .call("mark_alert_read", move |s| s.mark_alert_read(scope, id))
            .await
    }

    pub async fn dismiss_alert(&self, scope: Scope, id: i64) -> Result<()> {
        self.store
            .call("dismiss_alert", move |s| s.dismiss_alert(scope, id))
            .await
    }

    pub async fn count_unread_alerts(&self, scope: Scope) -> Result<i64> {
        self.store
            .call("count_unread_alerts", move |s| s.count_unread_alerts(scope))
            .await
    }
}
