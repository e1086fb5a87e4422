use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analytics::facts::{self, TradeScope};
use crate::analytics::metrics::{self, TradeSummary};
use crate::auth::CurrentUser;
use crate::db::DatabasePool;
use crate::error::ApiError;
use crate::extract::{choice, lenient, ApiJson, ApiPath, ApiQuery};
use crate::models::{AssetDetail, AssetInput, AssetListItem, PriceUpdate, TransactionListItem, TransactionStatus};
use crate::repo::assets::{self, AssetFilter};
use crate::repo::transactions::{self, TransactionFilter};

const RECENT_TRANSACTIONS: u32 = 10;

#[derive(Deserialize, Debug, Default)]
pub struct AssetQuery {
    pub asset_type: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub risk_level: Option<String>,
    pub currency: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

impl AssetQuery {
    fn into_filter(self) -> Result<AssetFilter, ApiError> {
        Ok(AssetFilter {
            asset_type: choice("asset_type", self.asset_type.as_deref())?,
            status: choice("status", self.status.as_deref())?,
            category: lenient(self.category.as_deref()),
            risk_level: choice("risk_level", self.risk_level.as_deref())?,
            currency: self.currency.filter(|c| !c.trim().is_empty()),
            min_price: lenient::<Decimal>(self.min_price.as_deref()),
            max_price: lenient::<Decimal>(self.max_price.as_deref()),
            search: self.search,
            ordering: self.ordering,
        })
    }
}

#[derive(Serialize, Debug)]
pub struct AssetStatisticsResponse {
    pub asset: AssetListItem,
    pub statistics: TradeSummary,
    pub recent_transactions: Vec<TransactionListItem>,
}

pub async fn list_assets(
    State(pool): State<DatabasePool>,
    _caller: CurrentUser,
    ApiQuery(query): ApiQuery<AssetQuery>,
) -> Result<(StatusCode, Json<Vec<AssetListItem>>), ApiError> {
    let filter = query.into_filter()?;
    let conn = pool.0.lock().await;
    Ok((StatusCode::OK, Json(assets::list(&conn, &filter)?)))
}

#[axum::debug_handler]
pub async fn create_asset(
    State(pool): State<DatabasePool>,
    _caller: CurrentUser,
    ApiJson(input): ApiJson<AssetInput>,
) -> Result<(StatusCode, Json<AssetDetail>), ApiError> {
    let now = Utc::now();
    let asset = input.into_new(now)?;

    let conn = pool.0.lock().await;
    assets::check_category(&conn, asset.category_id)?;
    assets::insert(&conn, &asset)?;
    tracing::info!("Created asset {} ({})", asset.symbol, asset.id);
    Ok((StatusCode::CREATED, Json(assets::detail(&conn, asset, now)?)))
}

pub async fn get_asset(
    State(pool): State<DatabasePool>,
    _caller: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<(StatusCode, Json<AssetDetail>), ApiError> {
    let conn = pool.0.lock().await;
    let asset = assets::find_active(&conn, id)?;
    Ok((StatusCode::OK, Json(assets::detail(&conn, asset, Utc::now())?)))
}

/// Partial update, used for both PUT and PATCH.
#[axum::debug_handler]
pub async fn update_asset(
    State(pool): State<DatabasePool>,
    _caller: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<AssetInput>,
) -> Result<(StatusCode, Json<AssetDetail>), ApiError> {
    let now = Utc::now();
    let conn = pool.0.lock().await;
    let mut asset = assets::find_active(&conn, id)?;
    input.apply(&mut asset, now)?;
    assets::check_category(&conn, asset.category_id)?;
    assets::update(&conn, &asset)?;
    Ok((StatusCode::OK, Json(assets::detail(&conn, asset, now)?)))
}

pub async fn delete_asset(
    State(pool): State<DatabasePool>,
    _caller: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    let conn = pool.0.lock().await;
    assets::find_active(&conn, id)?;
    assets::delete(&conn, id)?;
    tracing::info!("Deleted asset {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Moves the quoted price of an asset, optionally widening its day range.
#[axum::debug_handler]
pub async fn update_price(
    State(pool): State<DatabasePool>,
    _caller: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<PriceUpdate>,
) -> Result<(StatusCode, Json<AssetDetail>), ApiError> {
    let price = body
        .price
        .ok_or_else(|| ApiError::field("price", "Price is required"))?;
    if price <= Decimal::ZERO {
        return Err(ApiError::field("price", "Price must be greater than zero"));
    }

    let now = Utc::now();
    let mut conn = pool.0.lock().await;
    let tx = conn.transaction()?;
    let mut asset = assets::find_active(&tx, id)?;
    asset.apply_price(price, body.update_high_low, now);
    asset.validate()?;
    assets::update(&tx, &asset)?;
    tx.commit()?;

    tracing::info!("Updated price of {} to {}", asset.symbol, price);
    Ok((StatusCode::OK, Json(assets::detail(&conn, asset, now)?)))
}

/// Completed-trade statistics for one asset.
pub async fn asset_statistics(
    State(pool): State<DatabasePool>,
    _caller: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<(StatusCode, Json<AssetStatisticsResponse>), ApiError> {
    let conn = pool.0.lock().await;
    let asset = assets::find_active(&conn, id)?;
    let trades = facts::completed_trades(&conn, TradeScope::Asset(asset.id))?;
    let recent_transactions = transactions::list(
        &conn,
        &TransactionFilter {
            asset: Some(asset.id),
            status: Some(TransactionStatus::Completed),
            limit: Some(RECENT_TRANSACTIONS),
            ..Default::default()
        },
    )?;

    Ok((
        StatusCode::OK,
        Json(AssetStatisticsResponse {
            asset: assets::list_item(&conn, &asset)?,
            statistics: metrics::trade_summary(&trades)?,
            recent_transactions,
        }),
    ))
}
