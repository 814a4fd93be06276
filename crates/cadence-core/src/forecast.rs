//! Forecast Engine - projects balances across future months or weeks
//!
//! Projection is a pure function over a [`ForecastSnapshot`]. Each source is
//! simulated occurrence by occurrence with the same planning rules the
//! automation engine uses, so an installment or loan that completes
//! mid-horizon stops contributing from the following period on.
//!
//! Occurrences the automation engine already wrote inside the window are
//! counted from their ledger row instead of being planned again: the stored
//! progress of their source already includes them.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ForecastConfig;
use crate::error::{Error, Result};
use crate::models::{
    Direction, Granularity, LedgerTransaction, Period, Scope, SourceKind, WeekStart,
};
use crate::sources::Occurrence;
use crate::store::{ForecastSnapshot, Store, StoreHandle};

/// Upper bounds on a single projection
pub const MAX_HORIZON_MONTHS: u32 = 120;
pub const MAX_HORIZON_WEEKS: u32 = 520;

/// Income and expenses of one period, by origin
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodBreakdown {
    pub fixed_income: Decimal,
    pub fixed_expenses: Decimal,
    pub installment_income: Decimal,
    pub installment_expenses: Decimal,
    pub loan_payments: Decimal,
    pub one_time_income: Decimal,
    pub one_time_expenses: Decimal,
    pub expected_income: Decimal,
}

impl PeriodBreakdown {
    pub fn total_income(&self) -> Decimal {
        self.fixed_income + self.installment_income + self.expected_income + self.one_time_income
    }

    pub fn total_expenses(&self) -> Decimal {
        self.fixed_expenses + self.installment_expenses + self.loan_payments + self.one_time_expenses
    }

    fn add_scheduled(&mut self, kind: &SourceKind, direction: Direction, amount: Decimal) {
        match (kind, direction) {
            (SourceKind::Fixed, Direction::Income) => self.fixed_income += amount,
            (SourceKind::Fixed, Direction::Expense) => self.fixed_expenses += amount,
            (SourceKind::Installment { .. }, Direction::Income) => self.installment_income += amount,
            (SourceKind::Installment { .. }, Direction::Expense) => {
                self.installment_expenses += amount
            }
            (SourceKind::Loan { .. }, _) => self.loan_payments += amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPeriod {
    /// "2026-03" for months, the week's first day for weeks
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub opening_balance: Decimal,
    pub breakdown: PeriodBreakdown,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_change: Decimal,
    pub closing_balance: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Forecast {
    pub scope: Scope,
    pub granularity: Granularity,
    pub start_date: NaiveDate,
    /// Date of the confirmed balance the projection starts from
    pub balance_as_of: Option<NaiveDate>,
    pub opening_balance_at_start: Decimal,
    pub periods: Vec<ForecastPeriod>,
    pub has_negative_periods: bool,
    pub first_negative_period: Option<String>,
    /// Currencies seen in the inputs; amounts are summed without conversion
    pub currencies: Vec<String>,
    pub mixed_currencies: bool,
}

impl Forecast {
    pub fn closing_balance(&self) -> Decimal {
        self.periods
            .last()
            .map(|p| p.closing_balance)
            .unwrap_or(self.opening_balance_at_start)
    }

    pub fn negative_periods(&self) -> impl Iterator<Item = &ForecastPeriod> {
        self.periods
            .iter()
            .filter(|p| p.closing_balance < Decimal::ZERO)
    }
}

/// Totals over a monthly forecast
#[derive(Debug, Clone, Serialize)]
pub struct ForecastSummary {
    pub scope: Scope,
    pub start_date: NaiveDate,
    pub months: u32,
    pub opening_balance: Decimal,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_change: Decimal,
    pub ending_balance: Decimal,
    pub lowest_closing_balance: Decimal,
    pub lowest_period: Option<String>,
    pub average_monthly_net: Decimal,
    pub has_negative_periods: bool,
    pub first_negative_period: Option<String>,
    pub currencies: Vec<String>,
    pub mixed_currencies: bool,
}

impl ForecastSummary {
    pub fn from_forecast(forecast: &Forecast) -> Self {
        let total_income: Decimal = forecast.periods.iter().map(|p| p.total_income).sum();
        let total_expenses: Decimal = forecast.periods.iter().map(|p| p.total_expenses).sum();
        let net_change = total_income - total_expenses;

        let lowest = forecast
            .periods
            .iter()
            .min_by(|a, b| a.closing_balance.cmp(&b.closing_balance));

        let months = forecast.periods.len() as u32;
        let average_monthly_net = if months == 0 {
            Decimal::ZERO
        } else {
            (net_change / Decimal::from(months)).round_dp(2)
        };

        Self {
            scope: forecast.scope,
            start_date: forecast.start_date,
            months,
            opening_balance: forecast.opening_balance_at_start,
            total_income,
            total_expenses,
            net_change,
            ending_balance: forecast.closing_balance(),
            lowest_closing_balance: lowest
                .map(|p| p.closing_balance)
                .unwrap_or(forecast.opening_balance_at_start),
            lowest_period: lowest.map(|p| p.label.clone()),
            average_monthly_net,
            has_negative_periods: forecast.has_negative_periods,
            first_negative_period: forecast.first_negative_period.clone(),
            currencies: forecast.currencies.clone(),
            mixed_currencies: forecast.mixed_currencies,
        }
    }
}

/// What to project
#[derive(Debug, Clone, Copy)]
pub struct ForecastRequest {
    pub scope: Scope,
    pub start: NaiveDate,
    pub horizon: u32,
    pub granularity: Granularity,
    pub week_start: WeekStart,
}

impl ForecastRequest {
    pub fn validate(&self) -> Result<()> {
        let max = match self.granularity {
            Granularity::Month => MAX_HORIZON_MONTHS,
            Granularity::Week => MAX_HORIZON_WEEKS,
        };
        if self.horizon == 0 || self.horizon > max {
            return Err(Error::Validation(format!(
                "horizon must be between 1 and {} {}s, got {}",
                max,
                self.granularity.as_str(),
                self.horizon
            )));
        }
        Ok(())
    }

    /// Calendar periods covered; the first one is clipped to `start` when
    /// projecting
    pub fn periods(&self) -> Vec<Period> {
        let mut periods = Vec::with_capacity(self.horizon as usize);
        let mut period = Period::containing(self.start, self.granularity, self.week_start);
        for _ in 0..self.horizon {
            periods.push(period);
            period = period.next();
        }
        periods
    }
}

/// Project balances over the requested periods. Pure; reads nothing.
pub fn project(snapshot: &ForecastSnapshot, request: &ForecastRequest) -> Result<Forecast> {
    request.validate()?;

    let expected: HashMap<NaiveDate, Decimal> = snapshot
        .expected_income
        .iter()
        .filter(|e| e.granularity == request.granularity)
        .map(|e| (e.period_start, e.amount))
        .collect();

    let mut currencies = BTreeSet::new();
    for source in &snapshot.sources {
        currencies.insert(source.currency.clone());
    }
    for tx in &snapshot.one_time {
        currencies.insert(tx.currency.clone());
    }

    let materialized: HashMap<(i64, NaiveDate), &LedgerTransaction> = snapshot
        .generated
        .iter()
        .filter_map(|tx| {
            tx.provenance
                .as_ref()
                .map(|p| ((p.source_id, tx.occurrence_date), tx))
        })
        .collect();

    // Sources advance in memory as their occurrences are counted
    let mut sources = snapshot.sources.clone();
    let mut balance = snapshot.opening_balance;
    let mut periods = Vec::new();

    for period in request.periods() {
        let window_start = period.start.max(request.start);
        let mut breakdown = PeriodBreakdown::default();

        for source in sources.iter_mut() {
            for date in source.occurrences_between(window_start, period.end) {
                if let Some(row) = materialized.get(&(source.id, date)) {
                    breakdown.add_scheduled(&source.kind, row.direction, row.amount);
                    continue;
                }
                let Occurrence::Materialize {
                    transaction,
                    progress,
                    ..
                } = source.plan_occurrence(date)
                else {
                    break;
                };
                breakdown.add_scheduled(&source.kind, transaction.direction, transaction.amount);
                source.apply_progress(&progress);
            }
        }

        for tx in snapshot
            .one_time
            .iter()
            .filter(|tx| tx.provenance.is_none())
            .filter(|tx| tx.occurrence_date >= window_start && tx.occurrence_date <= period.end)
        {
            match tx.direction {
                Direction::Income => breakdown.one_time_income += tx.amount,
                Direction::Expense => breakdown.one_time_expenses += tx.amount,
            }
        }

        breakdown.expected_income = expected.get(&period.start).copied().unwrap_or_default();

        let total_income = breakdown.total_income();
        let total_expenses = breakdown.total_expenses();
        let net_change = total_income - total_expenses;
        let opening_balance = balance;
        let closing_balance = opening_balance + net_change;
        balance = closing_balance;

        periods.push(ForecastPeriod {
            label: period.label(),
            start: period.start,
            end: period.end,
            opening_balance,
            breakdown,
            total_income,
            total_expenses,
            net_change,
            closing_balance,
        });
    }

    let first_negative_period = periods
        .iter()
        .find(|p| p.closing_balance < Decimal::ZERO)
        .map(|p| p.label.clone());

    let currencies: Vec<String> = currencies.into_iter().collect();
    let mixed_currencies = currencies.len() > 1;
    if mixed_currencies {
        warn!(
            scope = %request.scope,
            currencies = ?currencies,
            "Projection mixes currencies; amounts summed without conversion"
        );
    }

    Ok(Forecast {
        scope: request.scope,
        granularity: request.granularity,
        start_date: request.start,
        balance_as_of: snapshot.balance_as_of,
        opening_balance_at_start: snapshot.opening_balance,
        has_negative_periods: first_negative_period.is_some(),
        first_negative_period,
        periods,
        currencies,
        mixed_currencies,
    })
}

/// Reads one consistent snapshot per projection and runs [`project`]
pub struct ForecastEngine<S> {
    store: StoreHandle<S>,
    config: ForecastConfig,
}

impl<S: Store> ForecastEngine<S> {
    pub fn new(store: StoreHandle<S>, config: ForecastConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Monthly projection; `months` defaults to the configured horizon
    pub async fn monthly(
        &self,
        scope: Scope,
        start: NaiveDate,
        months: Option<u32>,
    ) -> Result<Forecast> {
        let horizon = months.unwrap_or(self.config.horizon_months);
        self.project(scope, start, horizon, Granularity::Month).await
    }

    /// Weekly projection aligned to the configured week start
    pub async fn weekly(
        &self,
        scope: Scope,
        start: NaiveDate,
        weeks: Option<u32>,
    ) -> Result<Forecast> {
        let horizon = weeks.unwrap_or(self.config.horizon_weeks);
        self.project(scope, start, horizon, Granularity::Week).await
    }

    pub async fn summary(
        &self,
        scope: Scope,
        start: NaiveDate,
        months: Option<u32>,
    ) -> Result<ForecastSummary> {
        let forecast = self.monthly(scope, start, months).await?;
        Ok(ForecastSummary::from_forecast(&forecast))
    }

    pub async fn project(
        &self,
        scope: Scope,
        start: NaiveDate,
        horizon: u32,
        granularity: Granularity,
    ) -> Result<Forecast> {
        let request = ForecastRequest {
            scope,
            start,
            horizon,
            granularity,
            week_start: self.config.week_start,
        };
        // Reject bad input before touching the store
        request.validate()?;

        let periods = request.periods();
        let (from, to) = match (periods.first(), periods.last()) {
            (Some(first), Some(last)) => (first.start, last.end),
            _ => return Err(Error::Validation("empty forecast horizon".into())),
        };

        let snapshot = self
            .store
            .call("forecast_snapshot", move |s| {
                s.forecast_snapshot(scope, from, to, granularity)
            })
            .await?;

        let forecast = project(&snapshot, &request)?;
        debug!(
            %scope,
            granularity = granularity.as_str(),
            periods = forecast.periods.len(),
            negative = forecast.has_negative_periods,
            "Forecast projected"
        );
        Ok(forecast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        parse_date, ExpectedIncome, LedgerTransaction, Provenance, RecurringSource, SourceStatus,
        SourceType,
    };
    use chrono::{Datelike, Utc, Weekday};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn scope() -> Scope {
        Scope::user(1)
    }

    fn source(id: i64, amount: &str, direction: Direction, day: u32, kind: SourceKind) -> RecurringSource {
        RecurringSource {
            id,
            scope: scope(),
            name: format!("source {}", id),
            amount: dec(amount),
            currency: "USD".to_string(),
            direction,
            day_of_month: day,
            start_date: date("2025-01-01"),
            end_date: None,
            is_active: true,
            category_id: None,
            status: SourceStatus::Active,
            completed_at: None,
            kind,
        }
    }

    fn one_time(amount: &str, direction: Direction, on: &str, provenance: Option<Provenance>) -> LedgerTransaction {
        LedgerTransaction {
            id: 1,
            scope: scope(),
            amount: dec(amount),
            currency: "USD".to_string(),
            direction,
            category_id: None,
            occurrence_date: date(on),
            description: "one-off".to_string(),
            provenance,
            created_at: Utc::now(),
        }
    }

    fn monthly(start: &str, horizon: u32) -> ForecastRequest {
        ForecastRequest {
            scope: scope(),
            start: date(start),
            horizon,
            granularity: Granularity::Month,
            week_start: WeekStart::Monday,
        }
    }

    fn expected(period_start: &str, amount: &str) -> ExpectedIncome {
        ExpectedIncome {
            scope: scope(),
            granularity: Granularity::Month,
            period_start: date(period_start),
            amount: dec(amount),
        }
    }

    #[test]
    fn test_expected_income_against_fixed_expense() {
        let snapshot = ForecastSnapshot {
            sources: vec![source(1, "1200", Direction::Expense, 1, SourceKind::Fixed)],
            expected_income: vec![
                expected("2026-01-01", "1000"),
                expected("2026-02-01", "1000"),
                expected("2026-03-01", "1000"),
            ],
            ..Default::default()
        };

        let forecast = project(&snapshot, &monthly("2026-01-01", 3)).unwrap();
        let closings: Vec<Decimal> = forecast.periods.iter().map(|p| p.closing_balance).collect();
        assert_eq!(closings, vec![dec("-200"), dec("-400"), dec("-600")]);
        assert!(forecast.has_negative_periods);
        assert_eq!(forecast.first_negative_period.as_deref(), Some("2026-01"));
        assert_eq!(forecast.periods[0].breakdown.expected_income, dec("1000"));
        assert_eq!(forecast.periods[0].breakdown.fixed_expenses, dec("1200"));
    }

    #[test]
    fn test_balance_continuity() {
        let snapshot = ForecastSnapshot {
            opening_balance: dec("2500.50"),
            sources: vec![
                source(1, "3100", Direction::Income, 25, SourceKind::Fixed),
                source(2, "1450.25", Direction::Expense, 1, SourceKind::Fixed),
                source(
                    3,
                    "310",
                    Direction::Expense,
                    12,
                    SourceKind::Loan {
                        interest_rate: dec("6.5"),
                        total_payments: 60,
                        payments_made: 10,
                        remaining_balance: dec("14000"),
                    },
                ),
            ],
            one_time: vec![one_time("800", Direction::Expense, "2026-04-03", None)],
            ..Default::default()
        };

        let forecast = project(&snapshot, &monthly("2026-01-01", 12)).unwrap();
        assert_eq!(forecast.periods[0].opening_balance, dec("2500.50"));
        for pair in forecast.periods.windows(2) {
            assert_eq!(pair[1].opening_balance, pair[0].closing_balance);
        }
        for p in &forecast.periods {
            assert_eq!(
                p.closing_balance,
                p.opening_balance + p.total_income - p.total_expenses
            );
        }
    }

    #[test]
    fn test_income_installment_counts_as_income() {
        let snapshot = ForecastSnapshot {
            sources: vec![source(
                1,
                "200",
                Direction::Income,
                10,
                SourceKind::Installment {
                    number_of_payments: 12,
                    payments_completed: 0,
                },
            )],
            ..Default::default()
        };

        let forecast = project(&snapshot, &monthly("2026-01-01", 3)).unwrap();
        for p in &forecast.periods {
            assert_eq!(p.breakdown.installment_income, dec("200"));
            assert_eq!(p.breakdown.installment_expenses, Decimal::ZERO);
            assert_eq!(p.total_income, dec("200"));
            assert_eq!(p.total_expenses, Decimal::ZERO);
        }
    }

    #[test]
    fn test_installment_stops_after_final_payment() {
        let snapshot = ForecastSnapshot {
            sources: vec![source(
                1,
                "150",
                Direction::Expense,
                5,
                SourceKind::Installment {
                    number_of_payments: 6,
                    payments_completed: 4,
                },
            )],
            ..Default::default()
        };

        let forecast = project(&snapshot, &monthly("2026-01-01", 5)).unwrap();
        let paid: Vec<Decimal> = forecast
            .periods
            .iter()
            .map(|p| p.breakdown.installment_expenses)
            .collect();
        assert_eq!(
            paid,
            vec![dec("150"), dec("150"), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO]
        );
    }

    #[test]
    fn test_loan_stops_when_paid_off() {
        let snapshot = ForecastSnapshot {
            sources: vec![source(
                1,
                "400",
                Direction::Expense,
                1,
                SourceKind::Loan {
                    interest_rate: Decimal::ZERO,
                    total_payments: 3,
                    payments_made: 1,
                    remaining_balance: dec("700"),
                },
            )],
            ..Default::default()
        };

        let forecast = project(&snapshot, &monthly("2026-01-01", 4)).unwrap();
        let loan: Vec<Decimal> = forecast
            .periods
            .iter()
            .map(|p| p.breakdown.loan_payments)
            .collect();
        assert_eq!(loan, vec![dec("400"), dec("400"), Decimal::ZERO, Decimal::ZERO]);
    }

    #[test]
    fn test_materialized_occurrence_counted_from_ledger_row() {
        let row = |source_id: i64, amount: &str| {
            one_time(
                amount,
                Direction::Expense,
                "2026-03-15",
                Some(Provenance {
                    source_type: SourceType::Installment,
                    source_id,
                }),
            )
        };
        // Both were advanced by automation on the 15th; the first one finished
        let mut finished = source(
            1,
            "100",
            Direction::Expense,
            15,
            SourceKind::Installment {
                number_of_payments: 3,
                payments_completed: 3,
            },
        );
        finished.status = SourceStatus::Completed;
        finished.completed_at = Some(date("2026-03-15"));
        let midway = source(
            2,
            "40",
            Direction::Expense,
            15,
            SourceKind::Installment {
                number_of_payments: 3,
                payments_completed: 2,
            },
        );
        let snapshot = ForecastSnapshot {
            sources: vec![finished, midway],
            generated: vec![row(1, "100"), row(2, "40")],
            ..Default::default()
        };

        let forecast = project(&snapshot, &monthly("2026-03-15", 3)).unwrap();
        let paid: Vec<Decimal> = forecast
            .periods
            .iter()
            .map(|p| p.breakdown.installment_expenses)
            .collect();
        assert_eq!(paid, vec![dec("140"), dec("40"), Decimal::ZERO]);
        // Generated rows never show up as one-time entries
        assert_eq!(forecast.periods[0].breakdown.one_time_expenses, Decimal::ZERO);
    }

    #[test]
    fn test_one_time_excludes_generated_rows() {
        let generated = Some(Provenance {
            source_type: SourceType::Fixed,
            source_id: 9,
        });
        let snapshot = ForecastSnapshot {
            one_time: vec![
                one_time("75", Direction::Expense, "2026-01-20", None),
                one_time("300", Direction::Income, "2026-02-02", None),
                one_time("999", Direction::Expense, "2026-01-15", generated),
            ],
            ..Default::default()
        };

        let forecast = project(&snapshot, &monthly("2026-01-01", 2)).unwrap();
        assert_eq!(forecast.periods[0].breakdown.one_time_expenses, dec("75"));
        assert_eq!(forecast.periods[1].breakdown.one_time_income, dec("300"));
    }

    #[test]
    fn test_first_period_clipped_to_start() {
        let snapshot = ForecastSnapshot {
            sources: vec![
                source(1, "1000", Direction::Expense, 5, SourceKind::Fixed),
                source(2, "50", Direction::Expense, 20, SourceKind::Fixed),
            ],
            ..Default::default()
        };

        let forecast = project(&snapshot, &monthly("2026-01-10", 2)).unwrap();
        // Day 5 already passed in January
        assert_eq!(forecast.periods[0].breakdown.fixed_expenses, dec("50"));
        assert_eq!(forecast.periods[1].breakdown.fixed_expenses, dec("1050"));
        assert_eq!(forecast.periods[0].label, "2026-01");
    }

    #[test]
    fn test_weekly_periods_align_to_week_start() {
        let snapshot = ForecastSnapshot {
            sources: vec![source(1, "100", Direction::Expense, 15, SourceKind::Fixed)],
            ..Default::default()
        };
        let request = ForecastRequest {
            scope: scope(),
            start: date("2026-03-04"),
            horizon: 4,
            granularity: Granularity::Week,
            week_start: WeekStart::Sunday,
        };

        let forecast = project(&snapshot, &request).unwrap();
        assert_eq!(forecast.periods.len(), 4);
        for p in &forecast.periods {
            assert_eq!(p.start.weekday(), Weekday::Sun);
        }
        // 2026-03-15 is a Sunday and opens the third week
        let hit: Vec<&str> = forecast
            .periods
            .iter()
            .filter(|p| p.breakdown.fixed_expenses > Decimal::ZERO)
            .map(|p| p.label.as_str())
            .collect();
        assert_eq!(hit, vec!["2026-03-15"]);
    }

    #[test]
    fn test_mixed_currencies_flagged() {
        let mut eur = source(2, "10", Direction::Expense, 3, SourceKind::Fixed);
        eur.currency = "EUR".to_string();
        let snapshot = ForecastSnapshot {
            sources: vec![source(1, "10", Direction::Expense, 3, SourceKind::Fixed), eur],
            ..Default::default()
        };

        let forecast = project(&snapshot, &monthly("2026-01-01", 1)).unwrap();
        assert!(forecast.mixed_currencies);
        assert_eq!(forecast.currencies, vec!["EUR".to_string(), "USD".to_string()]);
        assert_eq!(forecast.periods[0].total_expenses, dec("20"));
    }

    #[test]
    fn test_invalid_horizon_rejected() {
        let snapshot = ForecastSnapshot::default();
        assert!(matches!(
            project(&snapshot, &monthly("2026-01-01", 0)),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            project(&snapshot, &monthly("2026-01-01", MAX_HORIZON_MONTHS + 1)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_summary_totals() {
        let snapshot = ForecastSnapshot {
            opening_balance: dec("1000"),
            sources: vec![
                source(1, "2000", Direction::Income, 1, SourceKind::Fixed),
                source(2, "2300", Direction::Expense, 2, SourceKind::Fixed),
            ],
            ..Default::default()
        };

        let forecast = project(&snapshot, &monthly("2026-01-01", 4)).unwrap();
        let summary = ForecastSummary::from_forecast(&forecast);
        assert_eq!(summary.months, 4);
        assert_eq!(summary.total_income, dec("8000"));
        assert_eq!(summary.total_expenses, dec("9200"));
        assert_eq!(summary.ending_balance, dec("-200"));
        assert_eq!(summary.lowest_closing_balance, dec("-200"));
        assert_eq!(summary.lowest_period.as_deref(), Some("2026-04"));
        assert_eq!(summary.average_monthly_net, dec("-300"));
        assert_eq!(summary.first_negative_period.as_deref(), Some("2026-04"));
    }
}
