//! Recurring source catalog operations

use chrono::{Datelike, NaiveDate};
use rusqlite::{params, Connection, Row};

use super::{get_date, get_decimal, get_enum, get_opt_date, get_opt_decimal, get_scope, Database};
use crate::error::{Error, Result};
use crate::models::{last_of_month, NewSource, RecurringSource, Scope, SourceKind, SourceType};
use crate::store::CatalogStore;

pub(super) const SOURCE_COLUMNS: &str = "id, scope, name, amount, currency, direction, \
    day_of_month, start_date, end_date, is_active, category_id, status, completed_at, \
    source_type, number_of_payments, payments_completed, interest_rate, total_payments, \
    payments_made, remaining_balance";

pub(super) fn row_to_source(row: &Row) -> rusqlite::Result<RecurringSource> {
    let source_type: SourceType = get_enum(row, 13)?;
    let kind = match source_type {
        SourceType::Fixed => SourceKind::Fixed,
        SourceType::Installment => SourceKind::Installment {
            number_of_payments: row.get::<_, Option<u32>>(14)?.unwrap_or(0),
            payments_completed: row.get::<_, Option<u32>>(15)?.unwrap_or(0),
        },
        SourceType::Loan => SourceKind::Loan {
            interest_rate: get_opt_decimal(row, 16)?.unwrap_or_default(),
            total_payments: row.get::<_, Option<u32>>(17)?.unwrap_or(0),
            payments_made: row.get::<_, Option<u32>>(18)?.unwrap_or(0),
            remaining_balance: get_opt_decimal(row, 19)?.unwrap_or_default(),
        },
    };

    Ok(RecurringSource {
        id: row.get(0)?,
        scope: get_scope(row, 1)?,
        name: row.get(2)?,
        amount: get_decimal(row, 3)?,
        currency: row.get(4)?,
        direction: get_enum(row, 5)?,
        day_of_month: row.get(6)?,
        start_date: get_date(row, 7)?,
        end_date: get_opt_date(row, 8)?,
        is_active: row.get(9)?,
        category_id: row.get(10)?,
        status: get_enum(row, 11)?,
        completed_at: get_opt_date(row, 12)?,
        kind,
    })
}

pub(super) fn query_sources(
    conn: &Connection,
    scope: Scope,
    active_only: bool,
) -> Result<Vec<RecurringSource>> {
    let query = if active_only {
        format!(
            "SELECT {} FROM recurring_sources \
             WHERE scope = ? AND is_active = 1 AND status = 'active' \
             ORDER BY day_of_month, id",
            SOURCE_COLUMNS
        )
    } else {
        format!(
            "SELECT {} FROM recurring_sources WHERE scope = ? ORDER BY day_of_month, id",
            SOURCE_COLUMNS
        )
    };
    let mut stmt = conn.prepare(&query)?;
    let sources = stmt
        .query_map(params![scope.key()], row_to_source)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(sources)
}

/// Sources a projection starting at `since` has to simulate: active ones, and
/// those whose final occurrence landed on or after `since`
pub(super) fn query_projected_sources(
    conn: &Connection,
    scope: Scope,
    since: NaiveDate,
) -> Result<Vec<RecurringSource>> {
    let query = format!(
        "SELECT {} FROM recurring_sources \
         WHERE scope = ? AND is_active = 1 \
         AND (status = 'active' OR (status = 'completed' AND completed_at >= ?)) \
         ORDER BY day_of_month, id",
        SOURCE_COLUMNS
    );
    let mut stmt = conn.prepare(&query)?;
    let sources = stmt
        .query_map(params![scope.key(), since.to_string()], row_to_source)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(sources)
}

impl Database {
    /// Insert a recurring source (stands in for the external CRUD layer)
    pub fn insert_source(&self, source: &NewSource) -> Result<i64> {
        if !(1..=31).contains(&source.day_of_month) {
            return Err(Error::Validation(format!(
                "day_of_month must be 1-31, got {}",
                source.day_of_month
            )));
        }
        if source.amount.is_sign_negative() {
            return Err(Error::Validation("amount must not be negative".into()));
        }
        if let Some(end) = source.end_date {
            if end < source.start_date {
                return Err(Error::Validation(format!(
                    "end_date {} is before start_date {}",
                    end, source.start_date
                )));
            }
        }

        let (number_of_payments, payments_completed, interest_rate, total_payments, payments_made, remaining_balance) =
            match &source.kind {
                SourceKind::Fixed => (None, None, None, None, None, None),
                SourceKind::Installment {
                    number_of_payments,
                    payments_completed,
                } => (
                    Some(*number_of_payments),
                    Some((*payments_completed).min(*number_of_payments)),
                    None,
                    None,
                    None,
                    None,
                ),
                SourceKind::Loan {
                    interest_rate,
                    total_payments,
                    payments_made,
                    remaining_balance,
                } => (
                    None,
                    None,
                    Some(interest_rate.to_string()),
                    Some(*total_payments),
                    Some(*payments_made),
                    Some((*remaining_balance).max(rust_decimal::Decimal::ZERO).to_string()),
                ),
            };

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO recurring_sources (
                scope, source_type, name, amount, currency, direction, day_of_month,
                start_date, end_date, is_active, category_id,
                number_of_payments, payments_completed,
                interest_rate, total_payments, payments_made, remaining_balance
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                source.scope.key(),
                source.kind.source_type().as_str(),
                source.name,
                source.amount.to_string(),
                source.currency,
                source.direction.as_str(),
                source.day_of_month,
                source.start_date.to_string(),
                source.end_date.map(|d| d.to_string()),
                source.is_active,
                source.category_id,
                number_of_payments,
                payments_completed,
                interest_rate,
                total_payments,
                payments_made,
                remaining_balance,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Toggle a source's active flag
    pub fn set_source_active(&self, scope: Scope, id: i64, active: bool) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE recurring_sources SET is_active = ?, updated_at = CURRENT_TIMESTAMP \
             WHERE id = ? AND scope = ?",
            params![active, id, scope.key()],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("source {} in {}", id, scope)));
        }
        Ok(())
    }
}

impl CatalogStore for Database {
    fn get_source(&self, scope: Scope, id: i64) -> Result<Option<RecurringSource>> {
        let conn = self.conn()?;
        let query = format!(
            "SELECT {} FROM recurring_sources WHERE id = ? AND scope = ?",
            SOURCE_COLUMNS
        );
        match conn.query_row(&query, params![id, scope.key()], row_to_source) {
            Ok(source) => Ok(Some(source)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_sources(&self, scope: Scope, active_only: bool) -> Result<Vec<RecurringSource>> {
        let conn = self.conn()?;
        query_sources(&conn, scope, active_only)
    }

    fn due_sources(&self, scope: Scope, date: NaiveDate) -> Result<Vec<RecurringSource>> {
        let conn = self.conn()?;
        let day = date.day();
        let month_end = last_of_month(date.year(), date.month()).day();

        // On the last day of a short month, later trigger days clamp onto it
        let query = format!(
            "SELECT {} FROM recurring_sources \
             WHERE scope = ?1 AND is_active = 1 AND status = 'active' \
             AND (day_of_month = ?2 OR (?2 = ?3 AND day_of_month > ?3)) \
             ORDER BY id",
            SOURCE_COLUMNS
        );
        let mut stmt = conn.prepare(&query)?;
        let sources = stmt
            .query_map(params![scope.key(), day, month_end], row_to_source)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sources.into_iter().filter(|s| s.is_due_on(date)).collect())
    }

    fn recently_completed(&self, scope: Scope, since: NaiveDate) -> Result<Vec<RecurringSource>> {
        let conn = self.conn()?;
        let query = format!(
            "SELECT {} FROM recurring_sources \
             WHERE scope = ? AND status = 'completed' AND completed_at >= ? \
             ORDER BY completed_at DESC, id",
            SOURCE_COLUMNS
        );
        let mut stmt = conn.prepare(&query)?;
        let sources = stmt
            .query_map(params![scope.key(), since.to_string()], row_to_source)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sources)
    }
}
