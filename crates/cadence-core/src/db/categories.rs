//! Category operations

use rusqlite::params;

use super::{get_scope, Database};
use crate::error::{Error, Result};
use crate::models::{Category, Scope};
use crate::store::CategoryStore;

impl Database {
    /// Create a category owned by `scope`
    pub fn create_category(&self, scope: Scope, name: &str) -> Result<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("category name must not be empty".into()));
        }
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO categories (scope, name) VALUES (?, ?)",
            params![scope.key(), name],
        )
        .map_err(|e| Error::from_insert(e, format!("category '{}' already exists in {}", name, scope)))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_categories(&self, scope: Scope) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, scope, name FROM categories WHERE scope = ? ORDER BY name")?;
        let categories = stmt
            .query_map(params![scope.key()], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    scope: get_scope(row, 1)?,
                    name: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }
}

impl CategoryStore for Database {
    fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            "SELECT id, scope, name FROM categories WHERE id = ?",
            params![id],
            |row| {
                Ok(Category {
                    id: row.get(0)?,
                    scope: get_scope(row, 1)?,
                    name: row.get(2)?,
                })
            },
        );
        match result {
            Ok(category) => Ok(Some(category)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
