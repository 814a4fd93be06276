//! Balance records and declared expected income

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

use super::{get_date, get_decimal, get_enum, get_scope, Database};
use crate::error::{Error, Result};
use crate::models::{BalanceRecord, ExpectedIncome, Granularity, Scope};
use crate::store::BalanceStore;

pub(super) fn query_latest_balance(
    conn: &Connection,
    scope: Scope,
) -> Result<Option<(Decimal, NaiveDate)>> {
    let result = conn.query_row(
        "SELECT amount, as_of FROM balance_records \
         WHERE scope = ? AND confirmed = 1 \
         ORDER BY as_of DESC, id DESC LIMIT 1",
        params![scope.key()],
        |row| Ok((get_decimal(row, 0)?, get_date(row, 1)?)),
    );
    match result {
        Ok(found) => Ok(Some(found)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub(super) fn query_expected_income(
    conn: &Connection,
    scope: Scope,
    granularity: Granularity,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<ExpectedIncome>> {
    let mut stmt = conn.prepare(
        "SELECT scope, granularity, period_start, amount FROM expected_income \
         WHERE scope = ? AND granularity = ? AND period_start >= ? AND period_start <= ? \
         ORDER BY period_start",
    )?;
    let rows = stmt
        .query_map(
            params![
                scope.key(),
                granularity.as_str(),
                from.to_string(),
                to.to_string()
            ],
            |row| {
                Ok(ExpectedIncome {
                    scope: get_scope(row, 0)?,
                    granularity: get_enum(row, 1)?,
                    period_start: get_date(row, 2)?,
                    amount: get_decimal(row, 3)?,
                })
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl Database {
    /// Record a balance observation
    pub fn record_balance(
        &self,
        scope: Scope,
        as_of: NaiveDate,
        amount: Decimal,
        currency: &str,
        confirmed: bool,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO balance_records (scope, as_of, amount, currency, confirmed) \
             VALUES (?, ?, ?, ?, ?)",
            params![
                scope.key(),
                as_of.to_string(),
                amount.to_string(),
                currency,
                confirmed
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Balance history, newest first
    pub fn list_balances(&self, scope: Scope, limit: i64) -> Result<Vec<BalanceRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, scope, as_of, amount, currency, confirmed FROM balance_records \
             WHERE scope = ? ORDER BY as_of DESC, id DESC LIMIT ?",
        )?;
        let records = stmt
            .query_map(params![scope.key(), limit], |row| {
                Ok(BalanceRecord {
                    id: row.get(0)?,
                    scope: get_scope(row, 1)?,
                    as_of: get_date(row, 2)?,
                    amount: get_decimal(row, 3)?,
                    currency: row.get(4)?,
                    confirmed: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Declare expected income for the period starting at `period_start`,
    /// replacing any earlier figure
    pub fn set_expected_income(
        &self,
        scope: Scope,
        granularity: Granularity,
        period_start: NaiveDate,
        amount: Decimal,
    ) -> Result<()> {
        if amount.is_sign_negative() {
            return Err(Error::Validation("expected income must not be negative".into()));
        }
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO expected_income (scope, granularity, period_start, amount)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(scope, granularity, period_start) DO UPDATE SET
                amount = excluded.amount,
                updated_at = CURRENT_TIMESTAMP
            "#,
            params![
                scope.key(),
                granularity.as_str(),
                period_start.to_string(),
                amount.to_string()
            ],
        )?;
        Ok(())
    }

    /// Remove a declared figure; returns whether one existed
    pub fn clear_expected_income(
        &self,
        scope: Scope,
        granularity: Granularity,
        period_start: NaiveDate,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM expected_income WHERE scope = ? AND granularity = ? AND period_start = ?",
            params![scope.key(), granularity.as_str(), period_start.to_string()],
        )?;
        Ok(deleted > 0)
    }
}

impl BalanceStore for Database {
    fn latest_confirmed_balance(&self, scope: Scope) -> Result<Option<(Decimal, NaiveDate)>> {
        let conn = self.conn()?;
        query_latest_balance(&conn, scope)
    }

    fn expected_income(
        &self,
        scope: Scope,
        granularity: Granularity,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ExpectedIncome>> {
        let conn = self.conn()?;
        query_expected_income(&conn, scope, granularity, from, to)
    }
}
