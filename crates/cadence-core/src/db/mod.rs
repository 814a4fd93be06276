//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `sources` - Recurring source catalog
//! - `categories` - Scope-owned categories
//! - `ledger` - Ledger transactions
//! - `balances` - Balance records and expected income
//! - `alerts` - Alert storage and merge application
//! - `snapshot` - Multi-table operations (occurrence commit, forecast snapshot)

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Scope;

mod alerts;
mod balances;
mod categories;
mod ledger;
mod snapshot;
mod sources;


pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "CADENCE_DB_KEY";

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path. This allows moving/renaming/restoring the database freely.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Fixed application salt - changing this would invalidate all existing encrypted databases
    const APP_SALT: &[u8; 16] = b"cadence-salt-v1!";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

fn invalid_column(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
}

/// Amounts are stored as TEXT to keep exact decimal values
pub(crate) fn get_decimal(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = row.get(idx)?;
    s.parse()
        .map_err(|e: rust_decimal::Error| invalid_column(idx, e.to_string()))
}

pub(crate) fn get_opt_decimal(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|e: rust_decimal::Error| invalid_column(idx, e.to_string())),
        None => Ok(None),
    }
}

pub(crate) fn get_date(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| invalid_column(idx, e.to_string()))
}

pub(crate) fn get_opt_date(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| invalid_column(idx, e.to_string())),
        None => Ok(None),
    }
}

pub(crate) fn get_scope(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Scope> {
    let s: String = row.get(idx)?;
    s.parse::<Scope>()
        .map_err(|e| invalid_column(idx, e.to_string()))
}

/// Parse a stored enum column via its `FromStr`
pub(crate) fn get_enum<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let s: String = row.get(idx)?;
    s.parse::<T>().map_err(|e| invalid_column(idx, e))
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `CADENCE_DB_KEY` environment variable to be set.
    /// The database will be encrypted using SQLCipher with a key derived
    /// from the passphrase via Argon2.
    ///
    /// Returns an error if `CADENCE_DB_KEY` is not set. Use `new_unencrypted()`
    /// for development/testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        let encryption_key = std::env::var(DB_KEY_ENV).ok();
        match encryption_key {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases (not recommended for production).",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    ///
    /// WARNING: This creates an unencrypted database. Only use for development
    /// or testing. For production, use `new()` with `CADENCE_DB_KEY` set.
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let key_pragma = match passphrase {
            Some(pass) => Some(format!("PRAGMA key = 'x\"{}\"';", derive_key(pass)?)),
            None => None,
        };

        // Every pooled connection gets the key, FK enforcement and a busy timeout
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            if let Some(pragma) = &key_pragma {
                conn.execute_batch(pragma)?;
            }
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            Ok(())
        });

        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;
        debug!(path, encrypted = passphrase.is_some(), "Database opened");

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create an in-memory database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because SQLCipher
    /// has issues with in-memory databases in the connection pool.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "cadence_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let path = path.to_string_lossy().to_string();

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block writers, and a read transaction
            -- sees one consistent snapshot
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Categories (owned by one scope)
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                scope TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(scope, name)
            );

            CREATE INDEX IF NOT EXISTS idx_categories_scope ON categories(scope);

            -- Recurring sources: fixed entries, installments, loans
            -- Variant columns are NULL for the variants that don't use them
            CREATE TABLE IF NOT EXISTS recurring_sources (
                id INTEGER PRIMARY KEY,
                scope TEXT NOT NULL,
                source_type TEXT NOT NULL,                 -- fixed, installment, loan
                name TEXT NOT NULL,
                amount TEXT NOT NULL,                      -- decimal, per occurrence
                currency TEXT NOT NULL DEFAULT 'USD',
                direction TEXT NOT NULL,                   -- income, expense
                day_of_month INTEGER NOT NULL CHECK (day_of_month BETWEEN 1 AND 31),
                start_date DATE NOT NULL,
                end_date DATE,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                category_id INTEGER,                       -- checked for scope at materialization
                status TEXT NOT NULL DEFAULT 'active',     -- active, completed
                completed_at DATE,
                number_of_payments INTEGER,                -- installment
                payments_completed INTEGER,                -- installment
                interest_rate TEXT,                        -- loan, annual percent
                total_payments INTEGER,                    -- loan
                payments_made INTEGER,                     -- loan
                remaining_balance TEXT,                    -- loan
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_sources_scope_day
                ON recurring_sources(scope, is_active, status, day_of_month);

            -- Ledger transactions; source_type/source_id present only when generated
            CREATE TABLE IF NOT EXISTS ledger_transactions (
                id INTEGER PRIMARY KEY,
                scope TEXT NOT NULL,
                amount TEXT NOT NULL,                      -- decimal magnitude
                currency TEXT NOT NULL DEFAULT 'USD',
                direction TEXT NOT NULL,
                category_id INTEGER REFERENCES categories(id),
                occurrence_date DATE NOT NULL,
                description TEXT NOT NULL,
                source_type TEXT,
                source_id INTEGER REFERENCES recurring_sources(id),
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_ledger_scope_date
                ON ledger_transactions(scope, occurrence_date);

            -- At most one generated transaction per occurrence
            CREATE UNIQUE INDEX IF NOT EXISTS idx_ledger_occurrence
                ON ledger_transactions(source_type, source_id, occurrence_date)
                WHERE source_id IS NOT NULL;

            -- Balance observations
            CREATE TABLE IF NOT EXISTS balance_records (
                id INTEGER PRIMARY KEY,
                scope TEXT NOT NULL,
                as_of DATE NOT NULL,
                amount TEXT NOT NULL,
                currency TEXT NOT NULL DEFAULT 'USD',
                confirmed BOOLEAN NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_balance_scope_date
                ON balance_records(scope, confirmed, as_of);

            -- Declared expected income per forecast period
            CREATE TABLE IF NOT EXISTS expected_income (
                scope TEXT NOT NULL,
                granularity TEXT NOT NULL,                 -- month, week
                period_start DATE NOT NULL,
                amount TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (scope, granularity, period_start)
            );

            -- Alerts; resolved rows are kept with resolved_at set
            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY,
                scope TEXT NOT NULL,
                alert_type TEXT NOT NULL,
                scope_identifier TEXT NOT NULL,
                severity TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                is_read BOOLEAN NOT NULL DEFAULT 0,
                is_dismissed BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                resolved_at DATETIME
            );

            CREATE INDEX IF NOT EXISTS idx_alerts_scope ON alerts(scope, resolved_at);

            -- One unresolved alert per dedup key
            CREATE UNIQUE INDEX IF NOT EXISTS idx_alerts_dedup
                ON alerts(scope, alert_type, scope_identifier)
                WHERE resolved_at IS NULL;
            "#,
        )?;

        debug!("Database migrations complete");
        Ok(())
    }
}
