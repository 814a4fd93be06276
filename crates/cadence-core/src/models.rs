//! Data models for Cadence

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Kind of owner a scope represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    User,
    Organization,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Organization => "org",
        }
    }
}

/// An owning user or organization. Every source, ledger entry, balance and
/// alert is partitioned by scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub kind: ScopeKind,
    pub id: i64,
}

impl Scope {
    pub fn user(id: i64) -> Self {
        Self {
            kind: ScopeKind::User,
            id,
        }
    }

    pub fn organization(id: i64) -> Self {
        Self {
            kind: ScopeKind::Organization,
            id,
        }
    }

    /// Storage key, e.g. "user:42"
    pub fn key(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.id)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| Error::Validation(format!("Invalid scope '{}' (use user:<id> or org:<id>)", s)))?;
        let kind = match kind {
            "user" => ScopeKind::User,
            "org" | "organization" => ScopeKind::Organization,
            _ => {
                return Err(Error::Validation(format!(
                    "Unknown scope kind '{}' (valid: user, org)",
                    kind
                )))
            }
        };
        let id = id
            .parse()
            .map_err(|_| Error::Validation(format!("Invalid scope id in '{}'", s)))?;
        Ok(Self { kind, id })
    }
}

/// Money flow direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Income,
    Expense,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    /// Apply the direction's sign to a non-negative magnitude
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            Self::Income => amount,
            Self::Expense => -amount,
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown direction: {}", s)),
        }
    }
}

/// Obligation variant, part of the idempotency key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Fixed,
    Installment,
    Loan,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Installment => "installment",
            Self::Loan => "loan",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "installment" => Ok(Self::Installment),
            "loan" => Ok(Self::Loan),
            _ => Err(format!("Unknown source type: {}", s)),
        }
    }
}

/// Lifecycle of a recurring source. `Completed` is terminal and only set by
/// the automation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Active,
    Completed,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for SourceStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Unknown source status: {}", s)),
        }
    }
}

/// Variant-specific state of a recurring source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceKind {
    Fixed,
    Installment {
        number_of_payments: u32,
        payments_completed: u32,
    },
    Loan {
        /// Annual rate in percent (5.5 = 5.5%)
        interest_rate: Decimal,
        total_payments: u32,
        payments_made: u32,
        remaining_balance: Decimal,
    },
}

impl SourceKind {
    pub fn source_type(&self) -> SourceType {
        match self {
            Self::Fixed => SourceType::Fixed,
            Self::Installment { .. } => SourceType::Installment,
            Self::Loan { .. } => SourceType::Loan,
        }
    }
}

/// A recurring obligation: fixed entry, installment plan or loan.
///
/// `amount` is the per-occurrence figure: the fixed amount, the installment's
/// monthly amount, or the loan's monthly payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringSource {
    pub id: i64,
    pub scope: Scope,
    pub name: String,
    pub amount: Decimal,
    pub currency: String,
    pub direction: Direction,
    pub day_of_month: u32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub category_id: Option<i64>,
    pub status: SourceStatus,
    pub completed_at: Option<NaiveDate>,
    pub kind: SourceKind,
}

impl RecurringSource {
    pub fn source_type(&self) -> SourceType {
        self.kind.source_type()
    }
}

/// A recurring source to be inserted (stands in for the external CRUD layer)
#[derive(Debug, Clone)]
pub struct NewSource {
    pub scope: Scope,
    pub name: String,
    pub amount: Decimal,
    pub currency: String,
    pub direction: Direction,
    pub day_of_month: u32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub category_id: Option<i64>,
    pub kind: SourceKind,
}

impl NewSource {
    pub fn fixed(
        scope: Scope,
        name: impl Into<String>,
        amount: Decimal,
        direction: Direction,
        day_of_month: u32,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            scope,
            name: name.into(),
            amount,
            currency: "USD".to_string(),
            direction,
            day_of_month,
            start_date,
            end_date: None,
            is_active: true,
            category_id: None,
            kind: SourceKind::Fixed,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn installment(
        scope: Scope,
        name: impl Into<String>,
        monthly_amount: Decimal,
        direction: Direction,
        day_of_month: u32,
        start_date: NaiveDate,
        number_of_payments: u32,
        payments_completed: u32,
    ) -> Self {
        Self {
            kind: SourceKind::Installment {
                number_of_payments,
                payments_completed,
            },
            ..Self::fixed(scope, name, monthly_amount, direction, day_of_month, start_date)
        }
    }

    /// Loans are always expenses
    #[allow(clippy::too_many_arguments)]
    pub fn loan(
        scope: Scope,
        name: impl Into<String>,
        monthly_payment: Decimal,
        day_of_month: u32,
        start_date: NaiveDate,
        interest_rate: Decimal,
        total_payments: u32,
        remaining_balance: Decimal,
    ) -> Self {
        Self {
            kind: SourceKind::Loan {
                interest_rate,
                total_payments,
                payments_made: 0,
                remaining_balance,
            },
            ..Self::fixed(
                scope,
                name,
                monthly_payment,
                Direction::Expense,
                day_of_month,
                start_date,
            )
        }
    }

    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn ending(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn with_payments_made(mut self, made: u32) -> Self {
        if let SourceKind::Loan { payments_made, .. } = &mut self.kind {
            *payments_made = made;
        }
        self
    }
}

/// A spending/income category owned by a scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub scope: Scope,
    pub name: String,
}

/// Machine-generated origin of a ledger transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    pub source_type: SourceType,
    pub source_id: i64,
}

/// Uniqueness basis preventing duplicate materialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey {
    pub source_type: SourceType,
    pub source_id: i64,
    pub occurrence_date: NaiveDate,
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.source_type, self.source_id, self.occurrence_date
        )
    }
}

/// A ledger entry. `amount` is a non-negative magnitude; `direction` carries
/// the sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: i64,
    pub scope: Scope,
    pub amount: Decimal,
    pub currency: String,
    pub direction: Direction,
    pub category_id: Option<i64>,
    pub occurrence_date: NaiveDate,
    pub description: String,
    pub provenance: Option<Provenance>,
    pub created_at: DateTime<Utc>,
}

impl LedgerTransaction {
    pub fn signed_amount(&self) -> Decimal {
        self.direction.signed(self.amount)
    }

    pub fn is_generated(&self) -> bool {
        self.provenance.is_some()
    }
}

/// A ledger entry to be written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLedgerTransaction {
    pub scope: Scope,
    pub amount: Decimal,
    pub currency: String,
    pub direction: Direction,
    pub category_id: Option<i64>,
    pub occurrence_date: NaiveDate,
    pub description: String,
    pub provenance: Option<Provenance>,
}

impl NewLedgerTransaction {
    /// A user-entered one-off transaction
    pub fn manual(
        scope: Scope,
        amount: Decimal,
        direction: Direction,
        occurrence_date: NaiveDate,
        description: impl Into<String>,
    ) -> Self {
        Self {
            scope,
            amount,
            currency: "USD".to_string(),
            direction,
            category_id: None,
            occurrence_date,
            description: description.into(),
            provenance: None,
        }
    }

    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn signed_amount(&self) -> Decimal {
        self.direction.signed(self.amount)
    }

    pub fn idempotency_key(&self) -> Option<IdempotencyKey> {
        self.provenance.map(|p| IdempotencyKey {
            source_type: p.source_type,
            source_id: p.source_id,
            occurrence_date: self.occurrence_date,
        })
    }
}

/// Ledger query filter on machine provenance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProvenanceFilter {
    #[default]
    Any,
    /// User-entered only
    Manual,
    /// Machine-generated only
    Generated,
}

impl FromStr for ProvenanceFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "any" | "all" => Ok(Self::Any),
            "manual" => Ok(Self::Manual),
            "generated" => Ok(Self::Generated),
            _ => Err(format!(
                "Unknown provenance filter: {} (valid: any, manual, generated)",
                s
            )),
        }
    }
}

/// A confirmed (or pending) account balance observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub id: i64,
    pub scope: Scope,
    pub as_of: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub confirmed: bool,
}

/// User-declared expected income for one forecast period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedIncome {
    pub scope: Scope,
    pub granularity: Granularity,
    pub period_start: NaiveDate,
    pub amount: Decimal,
}

/// Forecast period length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Month,
    Week,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Week => "week",
        }
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "month" | "monthly" => Ok(Self::Month),
            "week" | "weekly" => Ok(Self::Week),
            _ => Err(format!("Unknown granularity: {} (valid: month, week)", s)),
        }
    }
}

/// First day of a forecast week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

impl WeekStart {
    pub fn weekday(&self) -> Weekday {
        match self {
            Self::Monday => Weekday::Mon,
            Self::Sunday => Weekday::Sun,
        }
    }
}

impl FromStr for WeekStart {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monday" | "mon" => Ok(Self::Monday),
            "sunday" | "sun" => Ok(Self::Sunday),
            _ => Err(format!("Unknown week start: {} (valid: monday, sunday)", s)),
        }
    }
}

/// One forecast period: a calendar month, or a week aligned to the
/// configured week-start day. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub granularity: Granularity,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// The period containing `date`
    pub fn containing(date: NaiveDate, granularity: Granularity, week_start: WeekStart) -> Self {
        match granularity {
            Granularity::Month => {
                let start = first_of_month(date.year(), date.month());
                Self {
                    granularity,
                    start,
                    end: last_of_month(date.year(), date.month()),
                }
            }
            Granularity::Week => {
                let offset = (date.weekday().num_days_from_monday() + 7
                    - week_start.weekday().num_days_from_monday())
                    % 7;
                let start = date - Duration::days(offset as i64);
                Self {
                    granularity,
                    start,
                    end: start + Duration::days(6),
                }
            }
        }
    }

    pub fn next(&self) -> Self {
        let day_after = self.end + Duration::days(1);
        match self.granularity {
            Granularity::Month => Self {
                granularity: self.granularity,
                start: day_after,
                end: last_of_month(day_after.year(), day_after.month()),
            },
            Granularity::Week => Self {
                granularity: self.granularity,
                start: day_after,
                end: day_after + Duration::days(6),
            },
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Stable identifier: "2026-03" for months, the start date for weeks
    pub fn label(&self) -> String {
        match self.granularity {
            Granularity::Month => self.start.format("%Y-%m").to_string(),
            Granularity::Week => self.start.format("%Y-%m-%d").to_string(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

pub(crate) fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

pub(crate) fn last_of_month(year: i32, month: u32) -> NaiveDate {
    let (ny, nm) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    first_of_month(ny, nm)
        .pred_opt()
        .unwrap_or(NaiveDate::MIN)
}

/// Parse a YYYY-MM-DD date argument
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| Error::Validation(format!("Invalid date '{}', expected YYYY-MM-DD", s)))
}

/// Parse a YYYY-MM month argument into its first day
pub fn parse_month(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
        .map_err(|_| Error::Validation(format!("Invalid month '{}', expected YYYY-MM", s)))
}

/// Severity of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    /// Numeric priority for sorting (higher = more urgent)
    pub fn priority(&self) -> u8 {
        match self {
            Severity::Info => 1,
            Severity::Warning => 2,
            Severity::Critical => 3,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// Types of balance-risk alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// A forecast period closes below zero
    NegativeBalance,
    /// Current balance is under a configured threshold
    LowBalance,
    /// Spending in one category jumped well above its history
    CategorySpike,
    /// An installment or loan was fully paid
    SourceCompleted,
    /// The latest automation run could not materialize a source
    AutomationFailed,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NegativeBalance => "negative-balance",
            Self::LowBalance => "low-balance",
            Self::CategorySpike => "category-spike",
            Self::SourceCompleted => "source-completed",
            Self::AutomationFailed => "automation-failed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NegativeBalance => "Negative Balance",
            Self::LowBalance => "Low Balance",
            Self::CategorySpike => "Category Spike",
            Self::SourceCompleted => "Obligation Paid Off",
            Self::AutomationFailed => "Automation Failed",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "negative-balance" => Ok(Self::NegativeBalance),
            "low-balance" => Ok(Self::LowBalance),
            "category-spike" => Ok(Self::CategorySpike),
            "source-completed" => Ok(Self::SourceCompleted),
            "automation-failed" => Ok(Self::AutomationFailed),
            _ => Err(format!("Unknown alert type: {}", s)),
        }
    }
}

/// A stored alert. Merge identity is `(alert_type, scope_identifier)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub scope: Scope,
    pub alert_type: AlertType,
    pub scope_identifier: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub is_dismissed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the raising condition stopped holding; the row is kept
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn dedup_key(&self) -> (AlertType, &str) {
        (self.alert_type, self.scope_identifier.as_str())
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}

/// An alert the current state says should exist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertCandidate {
    pub alert_type: AlertType,
    pub scope_identifier: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

impl AlertCandidate {
    pub fn dedup_key(&self) -> (AlertType, &str) {
        (self.alert_type, self.scope_identifier.as_str())
    }
}

/// Alert listing filter
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub severity: Option<Severity>,
    pub unread_only: bool,
    pub include_dismissed: bool,
    pub include_resolved: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_scope_round_trip() {
        let scope: Scope = "user:42".parse().unwrap();
        assert_eq!(scope, Scope::user(42));
        assert_eq!(scope.key(), "user:42");

        let org: Scope = "org:7".parse().unwrap();
        assert_eq!(org, Scope::organization(7));
        assert_eq!(org.to_string(), "org:7");

        assert!("team:1".parse::<Scope>().is_err());
        assert!("user:abc".parse::<Scope>().is_err());
        assert!("user".parse::<Scope>().is_err());
    }

    #[test]
    fn test_direction_sign() {
        let amount = Decimal::new(1000, 0);
        assert_eq!(Direction::Income.signed(amount), amount);
        assert_eq!(Direction::Expense.signed(amount), -amount);
    }

    #[test]
    fn test_month_period() {
        let p = Period::containing(date("2024-02-17"), Granularity::Month, WeekStart::Monday);
        assert_eq!(p.start, date("2024-02-01"));
        assert_eq!(p.end, date("2024-02-29"));
        assert_eq!(p.label(), "2024-02");

        let next = p.next();
        assert_eq!(next.start, date("2024-03-01"));
        assert_eq!(next.end, date("2024-03-31"));

        let dec = Period::containing(date("2025-12-05"), Granularity::Month, WeekStart::Monday);
        assert_eq!(dec.next().label(), "2026-01");
    }

    #[test]
    fn test_week_period_monday_start() {
        // 2026-03-04 is a Wednesday
        let p = Period::containing(date("2026-03-04"), Granularity::Week, WeekStart::Monday);
        assert_eq!(p.start, date("2026-03-02"));
        assert_eq!(p.end, date("2026-03-08"));
        assert_eq!(p.start.weekday(), Weekday::Mon);
        assert_eq!(p.next().start, date("2026-03-09"));
    }

    #[test]
    fn test_week_period_sunday_start() {
        let p = Period::containing(date("2026-03-04"), Granularity::Week, WeekStart::Sunday);
        assert_eq!(p.start, date("2026-03-01"));
        assert_eq!(p.end, date("2026-03-07"));
        assert_eq!(p.start.weekday(), Weekday::Sun);

        // A Sunday starts its own week under Sunday alignment
        let sunday = Period::containing(date("2026-03-08"), Granularity::Week, WeekStart::Sunday);
        assert_eq!(sunday.start, date("2026-03-08"));
        // ...but closes the previous one under Monday alignment
        let monday = Period::containing(date("2026-03-08"), Granularity::Week, WeekStart::Monday);
        assert_eq!(monday.start, date("2026-03-02"));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(matches!(parse_date("2026-13-01"), Err(Error::Validation(_))));
        assert!(matches!(parse_date("15/03/2026"), Err(Error::Validation(_))));
        assert_eq!(parse_month("2026-03").unwrap(), date("2026-03-01"));
        assert!(parse_month("2026-3x").is_err());
    }

    #[test]
    fn test_alert_type_strings() {
        for t in [
            AlertType::NegativeBalance,
            AlertType::LowBalance,
            AlertType::CategorySpike,
            AlertType::SourceCompleted,
            AlertType::AutomationFailed,
        ] {
            assert_eq!(t.as_str().parse::<AlertType>().unwrap(), t);
        }
    }
}
