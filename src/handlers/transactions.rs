use axum::{extract::State, http::StatusCode, Json};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analytics::facts::{self, TradeScope};
use crate::analytics::metrics::{self, UserTradeSummary};
use crate::auth::CurrentUser;
use crate::db::DatabasePool;
use crate::error::ApiError;
use crate::extract::{choice, lenient, ApiJson, ApiPath, ApiQuery};
use crate::models::{TransactionDetail, TransactionInput, TransactionListItem, TransactionStatus};
use crate::repo::transactions::{self, TransactionFilter};

const RECENT_TRANSACTIONS: u32 = 5;

#[derive(Deserialize, Debug, Default)]
pub struct TransactionQuery {
    pub transaction_type: Option<String>,
    pub status: Option<String>,
    pub asset: Option<String>,
    pub order_type: Option<String>,
    pub user: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

impl TransactionQuery {
    fn into_filter(self, caller: &CurrentUser) -> Result<TransactionFilter, ApiError> {
        Ok(TransactionFilter {
            owner: caller.owner_scope(lenient(self.user.as_deref())),
            transaction_type: choice("transaction_type", self.transaction_type.as_deref())?,
            status: choice("status", self.status.as_deref())?,
            asset: lenient(self.asset.as_deref()),
            order_type: choice("order_type", self.order_type.as_deref())?,
            date_from: lenient::<NaiveDate>(self.date_from.as_deref()),
            date_to: lenient::<NaiveDate>(self.date_to.as_deref()),
            search: self.search,
            ordering: self.ordering,
            limit: None,
        })
    }
}

#[derive(Serialize, Debug)]
pub struct TransactionSummaryResponse {
    pub summary: UserTradeSummary,
    pub recent_transactions: Vec<TransactionListItem>,
}

pub async fn list_transactions(
    State(pool): State<DatabasePool>,
    caller: CurrentUser,
    ApiQuery(query): ApiQuery<TransactionQuery>,
) -> Result<(StatusCode, Json<Vec<TransactionListItem>>), ApiError> {
    let filter = query.into_filter(&caller)?;
    let conn = pool.0.lock().await;
    Ok((StatusCode::OK, Json(transactions::list(&conn, &filter)?)))
}

/// Records a transaction owned by the caller.
#[axum::debug_handler]
pub async fn create_transaction(
    State(pool): State<DatabasePool>,
    caller: CurrentUser,
    ApiJson(input): ApiJson<TransactionInput>,
) -> Result<(StatusCode, Json<TransactionDetail>), ApiError> {
    let transaction = input.into_new(caller.0.id, Utc::now())?;

    let conn = pool.0.lock().await;
    transactions::check_asset(&conn, transaction.asset_id)?;
    transactions::insert(&conn, &transaction)?;
    tracing::info!(
        "Recorded {} of {} for {} totalling {}",
        transaction.transaction_type,
        transaction.asset_id,
        caller.0.username,
        transaction.total_amount
    );
    Ok((StatusCode::CREATED, Json(transactions::detail(&conn, transaction)?)))
}

pub async fn get_transaction(
    State(pool): State<DatabasePool>,
    caller: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<(StatusCode, Json<TransactionDetail>), ApiError> {
    let conn = pool.0.lock().await;
    let transaction = transactions::find_visible(&conn, id, &caller.0)?;
    Ok((StatusCode::OK, Json(transactions::detail(&conn, transaction)?)))
}

/// Partial update, used for both PUT and PATCH. The total is recomputed.
#[axum::debug_handler]
pub async fn update_transaction(
    State(pool): State<DatabasePool>,
    caller: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<TransactionInput>,
) -> Result<(StatusCode, Json<TransactionDetail>), ApiError> {
    let conn = pool.0.lock().await;
    let mut transaction = transactions::find_visible(&conn, id, &caller.0)?;
    input.apply(&mut transaction, Utc::now())?;
    transactions::check_asset(&conn, transaction.asset_id)?;
    transactions::update(&conn, &transaction)?;
    Ok((StatusCode::OK, Json(transactions::detail(&conn, transaction)?)))
}

pub async fn delete_transaction(
    State(pool): State<DatabasePool>,
    caller: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    let conn = pool.0.lock().await;
    transactions::find_visible(&conn, id, &caller.0)?;
    transactions::delete(&conn, id)?;
    tracing::info!("Deleted transaction {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Completed volume and pending count for the caller, with their latest activity.
pub async fn transaction_summary(
    State(pool): State<DatabasePool>,
    caller: CurrentUser,
) -> Result<(StatusCode, Json<TransactionSummaryResponse>), ApiError> {
    let conn = pool.0.lock().await;
    let trades = facts::completed_trades(&conn, TradeScope::User(caller.0.id))?;
    let pending = transactions::count_with_status(&conn, caller.0.id, TransactionStatus::Pending)?;
    let recent_transactions = transactions::list(
        &conn,
        &TransactionFilter {
            owner: Some(caller.0.id),
            limit: Some(RECENT_TRANSACTIONS),
            ..Default::default()
        },
    )?;

    Ok((
        StatusCode::OK,
        Json(TransactionSummaryResponse {
            summary: metrics::user_trade_summary(&trades, pending.max(0) as u64)?,
            recent_transactions,
        }),
    ))
}
