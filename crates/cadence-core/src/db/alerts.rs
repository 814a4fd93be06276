//! Alert storage and merge application

use rusqlite::{params, Row};

use super::{get_enum, get_scope, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Alert, AlertFilter, Scope};
use crate::store::{AlertMerge, AlertStore};

const ALERT_COLUMNS: &str = "id, scope, alert_type, scope_identifier, severity, title, message, \
    is_read, is_dismissed, created_at, updated_at, resolved_at";

fn row_to_alert(row: &Row) -> rusqlite::Result<Alert> {
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    let resolved_at: Option<String> = row.get(11)?;

    Ok(Alert {
        id: row.get(0)?,
        scope: get_scope(row, 1)?,
        alert_type: get_enum(row, 2)?,
        scope_identifier: row.get(3)?,
        severity: get_enum(row, 4)?,
        title: row.get(5)?,
        message: row.get(6)?,
        is_read: row.get(7)?,
        is_dismissed: row.get(8)?,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
        resolved_at: resolved_at.map(|s| parse_datetime(&s)),
    })
}

impl Database {
    /// Fetch one alert by id within a scope
    pub fn get_alert(&self, scope: Scope, id: i64) -> Result<Option<Alert>> {
        let conn = self.conn()?;
        let query = format!("SELECT {} FROM alerts WHERE id = ? AND scope = ?", ALERT_COLUMNS);
        match conn.query_row(&query, params![id, scope.key()], row_to_alert) {
            Ok(alert) => Ok(Some(alert)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn update_alert_flag(&self, scope: Scope, id: i64, column: &str) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            &format!(
                "UPDATE alerts SET {} = 1, updated_at = CURRENT_TIMESTAMP WHERE id = ? AND scope = ?",
                column
            ),
            params![id, scope.key()],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("alert {} in {}", id, scope)));
        }
        Ok(())
    }
}

impl AlertStore for Database {
    fn list_unresolved_alerts(&self, scope: Scope) -> Result<Vec<Alert>> {
        let conn = self.conn()?;
        let query = format!(
            "SELECT {} FROM alerts WHERE scope = ? AND resolved_at IS NULL ORDER BY id",
            ALERT_COLUMNS
        );
        let mut stmt = conn.prepare(&query)?;
        let alerts = stmt
            .query_map(params![scope.key()], row_to_alert)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(alerts)
    }

    fn apply_alert_merge(&self, scope: Scope, merge: &AlertMerge) -> Result<()> {
        if merge.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let key = scope.key();

        // Resolve first so a resolved key can be raised again in the same pass
        for id in &merge.resolve {
            tx.execute(
                "UPDATE alerts SET resolved_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP \
                 WHERE id = ? AND scope = ? AND resolved_at IS NULL",
                params![id, key],
            )?;
        }

        for (id, candidate) in &merge.refresh {
            tx.execute(
                "UPDATE alerts SET severity = ?, title = ?, message = ?, updated_at = CURRENT_TIMESTAMP \
                 WHERE id = ? AND scope = ? AND resolved_at IS NULL",
                params![
                    candidate.severity.as_str(),
                    candidate.title,
                    candidate.message,
                    id,
                    key
                ],
            )?;
        }

        for candidate in &merge.create {
            tx.execute(
                "INSERT INTO alerts (scope, alert_type, scope_identifier, severity, title, message) \
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    key,
                    candidate.alert_type.as_str(),
                    candidate.scope_identifier,
                    candidate.severity.as_str(),
                    candidate.title,
                    candidate.message
                ],
            )
            .map_err(|e| {
                Error::from_insert(
                    e,
                    format!(
                        "unresolved alert {}:{} already exists",
                        candidate.alert_type, candidate.scope_identifier
                    ),
                )
            })?;
        }

        tx.commit()?;
        Ok(())
    }

    fn list_alerts(&self, scope: Scope, filter: &AlertFilter) -> Result<Vec<Alert>> {
        let conn = self.conn()?;

        let mut conditions = vec!["scope = ?".to_string()];
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(scope.key())];

        if let Some(severity) = filter.severity {
            conditions.push("severity = ?".to_string());
            params_vec.push(Box::new(severity.as_str()));
        }
        if filter.unread_only {
            conditions.push("is_read = 0".to_string());
        }
        if !filter.include_dismissed {
            conditions.push("is_dismissed = 0".to_string());
        }
        if !filter.include_resolved {
            conditions.push("resolved_at IS NULL".to_string());
        }

        let query = format!(
            r#"
            SELECT {} FROM alerts
            WHERE {}
            ORDER BY CASE severity WHEN 'critical' THEN 0 WHEN 'warning' THEN 1 ELSE 2 END,
                     created_at DESC, id DESC
            "#,
            ALERT_COLUMNS,
            conditions.join(" AND ")
        );

        let mut stmt = conn.prepare(&query)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let alerts = stmt
            .query_map(params_refs.as_slice(), row_to_alert)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(alerts)
    }

    fn mark_alert_read(&self, scope: Scope, id: i64) -> Result<()> {
        self.update_alert_flag(scope, id, "is_read")
    }

    fn dismiss_alert(&self, scope: Scope, id: i64) -> Result<()> {
        self.update_alert_flag(scope, id, "is_dismissed")
    }

    fn count_unread_alerts(&self, scope: Scope) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM alerts \
             WHERE scope = ? AND is_read = 0 AND is_dismissed = 0 AND resolved_at IS NULL",
            params![scope.key()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
