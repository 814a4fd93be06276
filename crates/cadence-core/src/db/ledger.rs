//! Ledger transaction operations

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

use super::{get_date, get_decimal, get_enum, get_scope, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    IdempotencyKey, LedgerTransaction, NewLedgerTransaction, Provenance, ProvenanceFilter, Scope,
    SourceType,
};
use crate::store::LedgerStore;

const LEDGER_COLUMNS: &str = "id, scope, amount, currency, direction, category_id, \
    occurrence_date, description, source_type, source_id, created_at";

fn row_to_transaction(row: &Row) -> rusqlite::Result<LedgerTransaction> {
    let source_type: Option<String> = row.get(8)?;
    let source_id: Option<i64> = row.get(9)?;
    let provenance = match (source_type, source_id) {
        (Some(t), Some(id)) => Some(Provenance {
            source_type: t.parse::<SourceType>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, e.into())
            })?,
            source_id: id,
        }),
        _ => None,
    };
    let created_at: String = row.get(10)?;

    Ok(LedgerTransaction {
        id: row.get(0)?,
        scope: get_scope(row, 1)?,
        amount: get_decimal(row, 2)?,
        currency: row.get(3)?,
        direction: get_enum(row, 4)?,
        category_id: row.get(5)?,
        occurrence_date: get_date(row, 6)?,
        description: row.get(7)?,
        provenance,
        created_at: parse_datetime(&created_at),
    })
}

pub(super) fn query_transactions(
    conn: &Connection,
    scope: Scope,
    from: NaiveDate,
    to: NaiveDate,
    filter: ProvenanceFilter,
) -> Result<Vec<LedgerTransaction>> {
    if from > to {
        return Err(Error::Validation(format!(
            "range start {} is after end {}",
            from, to
        )));
    }
    let provenance_clause = match filter {
        ProvenanceFilter::Any => "",
        ProvenanceFilter::Manual => " AND source_id IS NULL",
        ProvenanceFilter::Generated => " AND source_id IS NOT NULL",
    };
    let query = format!(
        "SELECT {} FROM ledger_transactions \
         WHERE scope = ? AND occurrence_date >= ? AND occurrence_date <= ?{} \
         ORDER BY occurrence_date, id",
        LEDGER_COLUMNS, provenance_clause
    );
    let mut stmt = conn.prepare(&query)?;
    let txs = stmt
        .query_map(
            params![scope.key(), from.to_string(), to.to_string()],
            row_to_transaction,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(txs)
}

/// Insert one ledger row; a duplicate occurrence surfaces as `Conflict`
pub(super) fn insert_transaction(conn: &Connection, tx: &NewLedgerTransaction) -> Result<i64> {
    if tx.amount.is_sign_negative() {
        return Err(Error::Validation(
            "transaction amount must be a non-negative magnitude".into(),
        ));
    }
    conn.execute(
        r#"
        INSERT INTO ledger_transactions (
            scope, amount, currency, direction, category_id, occurrence_date,
            description, source_type, source_id
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            tx.scope.key(),
            tx.amount.to_string(),
            tx.currency,
            tx.direction.as_str(),
            tx.category_id,
            tx.occurrence_date.to_string(),
            tx.description,
            tx.provenance.map(|p| p.source_type.as_str()),
            tx.provenance.map(|p| p.source_id),
        ],
    )
    .map_err(|e| {
        let what = match tx.idempotency_key() {
            Some(key) => format!("occurrence {} already materialized", key),
            None => "duplicate ledger row".to_string(),
        };
        Error::from_insert(e, what)
    })?;
    Ok(conn.last_insert_rowid())
}

impl LedgerStore for Database {
    fn find_generated(&self, key: &IdempotencyKey) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            "SELECT id FROM ledger_transactions \
             WHERE source_type = ? AND source_id = ? AND occurrence_date = ?",
            params![
                key.source_type.as_str(),
                key.source_id,
                key.occurrence_date.to_string()
            ],
            |row| row.get(0),
        );
        match result {
            Ok(id) => Ok(Some(id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_transactions(
        &self,
        scope: Scope,
        from: NaiveDate,
        to: NaiveDate,
        filter: ProvenanceFilter,
    ) -> Result<Vec<LedgerTransaction>> {
        let conn = self.conn()?;
        query_transactions(&conn, scope, from, to, filter)
    }

    fn create_transaction(&self, tx: &NewLedgerTransaction) -> Result<i64> {
        let conn = self.conn()?;
        insert_transaction(&conn, tx)
    }
}
