//! Row loaders feeding the metric folds. Each returns plain structs so the
//! folds themselves stay free of SQL.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::{decimal_column, opt_decimal_column, uuid_column};
use crate::error::ApiResult;
use crate::models::{AssetType, RiskLevel, TransactionType};

#[derive(Debug, Clone, PartialEq)]
pub struct UserFact {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetFact {
    pub id: Uuid,
    pub name: String,
    pub symbol: String,
    pub asset_type: AssetType,
    pub current_price: Decimal,
    pub market_cap: Option<Decimal>,
    pub risk_level: RiskLevel,
}

/// A completed, active transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeFact {
    pub user_id: Uuid,
    pub asset_id: Uuid,
    pub transaction_type: TransactionType,
    pub quantity: Decimal,
    pub total_amount: Decimal,
    pub fees: Decimal,
    pub transaction_date: DateTime<Utc>,
}

/// Which completed trades to load.
#[derive(Debug, Clone, Copy)]
pub enum TradeScope {
    All,
    Between(DateTime<Utc>, DateTime<Utc>),
    Asset(Uuid),
    User(Uuid),
}

pub fn active_users(conn: &Connection) -> ApiResult<Vec<UserFact>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, first_name, last_name, date_joined FROM users WHERE is_active = 1",
    )?;
    let users = stmt
        .query_map([], |row| {
            let first: String = row.get("first_name")?;
            let last: String = row.get("last_name")?;
            Ok(UserFact {
                id: uuid_column(row, "id")?,
                username: row.get("username")?,
                full_name: format!("{first} {last}").trim().to_string(),
                date_joined: row.get("date_joined")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn active_assets(conn: &Connection) -> ApiResult<Vec<AssetFact>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, symbol, asset_type, current_price, market_cap, risk_level
         FROM assets WHERE is_active = 1",
    )?;
    let assets = stmt
        .query_map([], |row| {
            Ok(AssetFact {
                id: uuid_column(row, "id")?,
                name: row.get("name")?,
                symbol: row.get("symbol")?,
                asset_type: row.get("asset_type")?,
                current_price: decimal_column(row, "current_price")?,
                market_cap: opt_decimal_column(row, "market_cap")?,
                risk_level: row.get("risk_level")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(assets)
}

fn map_trade(row: &Row<'_>) -> rusqlite::Result<TradeFact> {
    Ok(TradeFact {
        user_id: uuid_column(row, "user_id")?,
        asset_id: uuid_column(row, "asset_id")?,
        transaction_type: row.get("transaction_type")?,
        quantity: decimal_column(row, "quantity")?,
        total_amount: decimal_column(row, "total_amount")?,
        fees: decimal_column(row, "fees")?,
        transaction_date: row.get("transaction_date")?,
    })
}

pub fn completed_trades(conn: &Connection, scope: TradeScope) -> ApiResult<Vec<TradeFact>> {
    const BASE: &str = "SELECT user_id, asset_id, transaction_type, quantity, total_amount, fees,
             transaction_date
         FROM transactions WHERE status = 'COMPLETED' AND is_active = 1";

    let trades = match scope {
        TradeScope::All => conn
            .prepare(&format!("{BASE} ORDER BY transaction_date"))?
            .query_map([], map_trade)?
            .collect::<Result<Vec<_>, _>>()?,
        TradeScope::Between(start, end) => conn
            .prepare(&format!(
                "{BASE} AND transaction_date >= ?1 AND transaction_date <= ?2 ORDER BY transaction_date"
            ))?
            .query_map(params![start, end], map_trade)?
            .collect::<Result<Vec<_>, _>>()?,
        TradeScope::Asset(id) => conn
            .prepare(&format!("{BASE} AND asset_id = ?1 ORDER BY transaction_date"))?
            .query_map([id.to_string()], map_trade)?
            .collect::<Result<Vec<_>, _>>()?,
        TradeScope::User(id) => conn
            .prepare(&format!("{BASE} AND user_id = ?1 ORDER BY transaction_date"))?
            .query_map([id.to_string()], map_trade)?
            .collect::<Result<Vec<_>, _>>()?,
    };
    Ok(trades)
}

/// Active transactions of any status, for the dashboard head count.
pub fn active_transaction_count(conn: &Connection) -> ApiResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE is_active = 1",
        [],
        |row| row.get(0),
    )?)
}
