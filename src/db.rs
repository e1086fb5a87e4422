use std::str::FromStr;
use std::sync::Arc;

use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL DEFAULT '',
    first_name TEXT NOT NULL DEFAULT '',
    last_name TEXT NOT NULL DEFAULT '',
    is_staff INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    date_joined TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS asset_categories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    parent_id TEXT REFERENCES asset_categories(id) ON DELETE CASCADE,
    icon TEXT NOT NULL DEFAULT '',
    color TEXT NOT NULL DEFAULT '#007bff',
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_categories_parent ON asset_categories(parent_id);

CREATE TABLE IF NOT EXISTS assets (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    symbol TEXT NOT NULL UNIQUE,
    asset_type TEXT NOT NULL,
    category_id TEXT REFERENCES asset_categories(id) ON DELETE SET NULL,
    description TEXT NOT NULL DEFAULT '',
    company_name TEXT NOT NULL DEFAULT '',
    website_url TEXT NOT NULL DEFAULT '',
    current_price TEXT NOT NULL,
    currency TEXT NOT NULL DEFAULT 'USD',
    market_cap TEXT,
    risk_level TEXT NOT NULL DEFAULT 'MEDIUM',
    beta TEXT,
    dividend_yield TEXT,
    status TEXT NOT NULL DEFAULT 'ACTIVE',
    exchange TEXT NOT NULL DEFAULT '',
    isin TEXT UNIQUE,
    price_last_updated TEXT,
    day_high TEXT,
    day_low TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_assets_type ON assets(asset_type);
CREATE INDEX IF NOT EXISTS idx_assets_status ON assets(status);

CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    asset_id TEXT NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
    transaction_type TEXT NOT NULL,
    quantity TEXT NOT NULL,
    price_per_unit TEXT NOT NULL,
    total_amount TEXT NOT NULL,
    fees TEXT NOT NULL DEFAULT '0',
    tax TEXT NOT NULL DEFAULT '0',
    order_type TEXT NOT NULL DEFAULT 'MARKET',
    limit_price TEXT,
    stop_price TEXT,
    status TEXT NOT NULL DEFAULT 'PENDING',
    transaction_date TEXT NOT NULL,
    settlement_date TEXT,
    notes TEXT NOT NULL DEFAULT '',
    external_id TEXT NOT NULL DEFAULT '',
    broker TEXT NOT NULL DEFAULT '',
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, transaction_date);
CREATE INDEX IF NOT EXISTS idx_transactions_asset_date ON transactions(asset_id, transaction_date);
CREATE INDEX IF NOT EXISTS idx_transactions_status_date ON transactions(status, transaction_date);

CREATE TABLE IF NOT EXISTS reports (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    report_type TEXT NOT NULL,
    data TEXT NOT NULL,
    parameters TEXT NOT NULL,
    format TEXT NOT NULL DEFAULT 'JSON',
    status TEXT NOT NULL DEFAULT 'GENERATING',
    generated_at TEXT NOT NULL,
    completed_at TEXT,
    expires_at TEXT,
    period_start TEXT,
    period_end TEXT,
    file_size INTEGER,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_reports_user_type ON reports(user_id, report_type);
CREATE INDEX IF NOT EXISTS idx_reports_status ON reports(status, generated_at);
";

/// Shared handle to the single SQLite connection.
#[derive(Clone)]
pub struct DatabasePool(pub Arc<Mutex<rusqlite::Connection>>);

impl DatabasePool {
    /// Open (or create) the database file and make sure the schema exists.
    pub fn open(path: &str) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// A private in-memory database, used by tests.
    pub fn in_memory() -> Result<Self, rusqlite::Error> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, rusqlite::Error> {
        init_schema(&conn)?;
        Ok(Self(Arc::new(Mutex::new(conn))))
    }
}

pub fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(SCHEMA)
}

fn conversion_error<E>(row: &Row<'_>, column: &str, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let index = row.as_ref().column_index(column).unwrap_or_default();
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
}

/// Decimals are stored as text so no precision is lost.
pub fn decimal_column(row: &Row<'_>, column: &str) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(column)?;
    Decimal::from_str(&raw).map_err(|e| conversion_error(row, column, e))
}

pub fn opt_decimal_column(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|value| Decimal::from_str(&value).map_err(|e| conversion_error(row, column, e)))
        .transpose()
}

pub fn uuid_column(row: &Row<'_>, column: &str) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(column)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(row, column, e))
}

pub fn opt_uuid_column(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|value| Uuid::parse_str(&value).map_err(|e| conversion_error(row, column, e)))
        .transpose()
}

/// True when the error is a UNIQUE constraint failure on `table.column`.
pub fn is_unique_violation(err: &rusqlite::Error, table: &str, column: &str) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, Some(message)) => {
            code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                && message.contains(&format!("{table}.{column}"))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('users', 'asset_categories', 'assets', 'transactions', 'reports')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 5);
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn decimal_columns_keep_precision() {
        let conn = Connection::open_in_memory().unwrap();
        let value = conn
            .query_row("SELECT '0.00000001' AS q, NULL AS n", [], |row| {
                Ok((decimal_column(row, "q")?, opt_decimal_column(row, "n")?))
            })
            .unwrap();
        assert_eq!(value.0, Decimal::new(1, 8));
        assert_eq!(value.1, None);
    }

    #[test]
    fn bad_uuid_is_a_conversion_error() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn
            .query_row("SELECT 'nope' AS id", [], |row| uuid_column(row, "id"))
            .unwrap_err();
        assert!(matches!(err, rusqlite::Error::FromSqlConversionFailure(..)));
    }
}
