use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{assets, order_by, users, Conditions};
use crate::db::{decimal_column, opt_decimal_column, uuid_column};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    OrderType, Transaction, TransactionDetail, TransactionListItem, TransactionStatus,
    TransactionType, User, UserSummary,
};

const COLUMNS: &str = "t.id, t.user_id, t.asset_id, t.transaction_type, t.quantity, \
    t.price_per_unit, t.total_amount, t.fees, t.tax, t.order_type, t.limit_price, t.stop_price, \
    t.status, t.transaction_date, t.settlement_date, t.notes, t.external_id, t.broker, \
    t.is_active, t.created_at, t.updated_at";

const ORDERING: &[(&str, &str)] = &[
    ("transaction_date", "t.transaction_date"),
    ("created_at", "t.created_at"),
    ("total_amount", "CAST(t.total_amount AS REAL)"),
];

#[derive(Debug, Default, Clone)]
pub struct TransactionFilter {
    /// Restricts rows to one owner; `None` means every user.
    pub owner: Option<Uuid>,
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub asset: Option<Uuid>,
    pub order_type: Option<OrderType>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub limit: Option<u32>,
}

fn map_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: uuid_column(row, "id")?,
        user_id: uuid_column(row, "user_id")?,
        asset_id: uuid_column(row, "asset_id")?,
        transaction_type: row.get("transaction_type")?,
        quantity: decimal_column(row, "quantity")?,
        price_per_unit: decimal_column(row, "price_per_unit")?,
        total_amount: decimal_column(row, "total_amount")?,
        fees: decimal_column(row, "fees")?,
        tax: decimal_column(row, "tax")?,
        order_type: row.get("order_type")?,
        limit_price: opt_decimal_column(row, "limit_price")?,
        stop_price: opt_decimal_column(row, "stop_price")?,
        status: row.get("status")?,
        transaction_date: row.get("transaction_date")?,
        settlement_date: row.get("settlement_date")?,
        notes: row.get("notes")?,
        external_id: row.get("external_id")?,
        broker: row.get("broker")?,
        is_active: row.get("is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn insert(conn: &Connection, tx: &Transaction) -> ApiResult<()> {
    conn.execute(
        "INSERT INTO transactions (id, user_id, asset_id, transaction_type, quantity,
             price_per_unit, total_amount, fees, tax, order_type, limit_price, stop_price,
             status, transaction_date, settlement_date, notes, external_id, broker, is_active,
             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
             ?18, ?19, ?20, ?21)",
        params![
            tx.id.to_string(),
            tx.user_id.to_string(),
            tx.asset_id.to_string(),
            tx.transaction_type,
            tx.quantity.to_string(),
            tx.price_per_unit.to_string(),
            tx.total_amount.to_string(),
            tx.fees.to_string(),
            tx.tax.to_string(),
            tx.order_type,
            tx.limit_price.map(|p| p.to_string()),
            tx.stop_price.map(|p| p.to_string()),
            tx.status,
            tx.transaction_date,
            tx.settlement_date,
            tx.notes,
            tx.external_id,
            tx.broker,
            tx.is_active,
            tx.created_at,
            tx.updated_at,
        ],
    )?;
    Ok(())
}

pub fn update(conn: &Connection, tx: &Transaction) -> ApiResult<()> {
    let changed = conn.execute(
        "UPDATE transactions SET asset_id = ?2, transaction_type = ?3, quantity = ?4,
             price_per_unit = ?5, total_amount = ?6, fees = ?7, tax = ?8, order_type = ?9,
             limit_price = ?10, stop_price = ?11, status = ?12, transaction_date = ?13,
             settlement_date = ?14, notes = ?15, external_id = ?16, broker = ?17,
             is_active = ?18, updated_at = ?19
         WHERE id = ?1",
        params![
            tx.id.to_string(),
            tx.asset_id.to_string(),
            tx.transaction_type,
            tx.quantity.to_string(),
            tx.price_per_unit.to_string(),
            tx.total_amount.to_string(),
            tx.fees.to_string(),
            tx.tax.to_string(),
            tx.order_type,
            tx.limit_price.map(|p| p.to_string()),
            tx.stop_price.map(|p| p.to_string()),
            tx.status,
            tx.transaction_date,
            tx.settlement_date,
            tx.notes,
            tx.external_id,
            tx.broker,
            tx.is_active,
            tx.updated_at,
        ],
    )?;
    if changed == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(())
}

pub fn get(conn: &Connection, id: Uuid) -> ApiResult<Option<Transaction>> {
    let tx = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM transactions t WHERE t.id = ?1"),
            [id.to_string()],
            map_transaction,
        )
        .optional()?;
    Ok(tx)
}

/// Active transaction visible to `caller`; anything else reads as missing.
pub fn find_visible(conn: &Connection, id: Uuid, caller: &User) -> ApiResult<Transaction> {
    get(conn, id)?
        .filter(|tx| tx.is_active && (caller.is_staff || tx.user_id == caller.id))
        .ok_or(ApiError::NotFound)
}

pub fn delete(conn: &Connection, id: Uuid) -> ApiResult<()> {
    let removed = conn.execute("DELETE FROM transactions WHERE id = ?1", [id.to_string()])?;
    if removed == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(())
}

pub fn list(conn: &Connection, filter: &TransactionFilter) -> ApiResult<Vec<TransactionListItem>> {
    let mut conditions = Conditions::new();
    conditions.push_raw("t.is_active = 1");
    if let Some(owner) = filter.owner {
        conditions.push("t.user_id = ?", owner.to_string());
    }
    if let Some(kind) = filter.transaction_type {
        conditions.push("t.transaction_type = ?", kind.as_str().to_string());
    }
    if let Some(status) = filter.status {
        conditions.push("t.status = ?", status.as_str().to_string());
    }
    if let Some(asset) = filter.asset {
        conditions.push("t.asset_id = ?", asset.to_string());
    }
    if let Some(order_type) = filter.order_type {
        conditions.push("t.order_type = ?", order_type.as_str().to_string());
    }
    if let Some(from) = filter.date_from {
        conditions.push("date(t.transaction_date) >= ?", from.to_string());
    }
    if let Some(to) = filter.date_to {
        conditions.push("date(t.transaction_date) <= ?", to.to_string());
    }
    if let Some(term) = &filter.search {
        conditions.push_search(&["a.name", "a.symbol", "t.notes", "t.external_id"], term);
    }

    let mut sql = format!(
        "SELECT {COLUMNS}, a.name AS asset_name, a.symbol AS asset_symbol, u.username AS user_username
         FROM transactions t
         JOIN assets a ON a.id = t.asset_id
         JOIN users u ON u.id = t.user_id{}{}",
        conditions.sql(),
        order_by(filter.ordering.as_deref(), ORDERING, "t.transaction_date DESC"),
    );
    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params_from_iter(conditions.into_values()), |row| {
            let tx = map_transaction(row)?;
            Ok(TransactionListItem {
                id: tx.id,
                transaction_type: tx.transaction_type,
                asset_name: row.get("asset_name")?,
                asset_symbol: row.get("asset_symbol")?,
                user_username: row.get("user_username")?,
                quantity: tx.quantity,
                price_per_unit: tx.price_per_unit,
                total_amount: tx.total_amount,
                net_amount: tx.net_amount(),
                status: tx.status,
                transaction_date: tx.transaction_date,
                created_at: tx.created_at,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

pub fn count_with_status(conn: &Connection, owner: Uuid, status: TransactionStatus) -> ApiResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE user_id = ?1 AND status = ?2 AND is_active = 1",
        params![owner.to_string(), status],
        |row| row.get(0),
    )?)
}

/// A referenced asset has to exist and be active.
pub fn check_asset(conn: &Connection, asset_id: Uuid) -> ApiResult<()> {
    match assets::get(conn, asset_id)? {
        Some(asset) if asset.is_active => Ok(()),
        _ => Err(ApiError::field(
            "asset",
            format!("Invalid pk \"{asset_id}\" - object does not exist."),
        )),
    }
}

pub fn detail(conn: &Connection, transaction: Transaction) -> ApiResult<TransactionDetail> {
    let asset = assets::get(conn, transaction.asset_id)?.ok_or_else(|| {
        ApiError::Internal(format!("transaction {} references a missing asset", transaction.id))
    })?;
    let owner = users::get(conn, transaction.user_id)?.ok_or_else(|| {
        ApiError::Internal(format!("transaction {} references a missing user", transaction.id))
    })?;
    Ok(TransactionDetail {
        net_amount: transaction.net_amount(),
        profit_loss: transaction.profit_loss(asset.current_price),
        asset: assets::list_item(conn, &asset)?,
        user: UserSummary::from(&owner),
        transaction,
    })
}
