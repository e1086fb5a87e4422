use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::analytics::{self, metrics::MarketOverview, Dashboard, DateWindow, GraphInfo, GraphKind};
use crate::auth::CurrentUser;
use crate::db::DatabasePool;
use crate::error::ApiError;
use crate::extract::ApiQuery;

#[derive(Deserialize, Debug, Default)]
pub struct GraphQuery {
    pub days: Option<String>,
    pub graph_type: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct AvailableGraphs {
    pub available_graphs: Vec<GraphInfo>,
}

/// Dashboard graphs over the trailing `days` (default 30, at most 365).
pub async fn graphs(
    State(pool): State<DatabasePool>,
    _caller: CurrentUser,
    ApiQuery(query): ApiQuery<GraphQuery>,
) -> Result<(StatusCode, Json<Dashboard>), ApiError> {
    let window = DateWindow::parse(Utc::now(), query.days.as_deref())?;
    let only = query
        .graph_type
        .as_deref()
        .filter(|value| !value.is_empty())
        .map(str::parse::<GraphKind>)
        .transpose()?;

    let conn = pool.0.lock().await;
    let dashboard = analytics::dashboard(&conn, window, only)?;
    tracing::info!("Generated analytics data for {} days", window.days);
    Ok((StatusCode::OK, Json(dashboard)))
}

pub async fn available_graphs(_caller: CurrentUser) -> (StatusCode, Json<AvailableGraphs>) {
    (
        StatusCode::OK,
        Json(AvailableGraphs {
            available_graphs: analytics::available_graphs(),
        }),
    )
}

pub async fn market_overview(
    State(pool): State<DatabasePool>,
    _caller: CurrentUser,
) -> Result<(StatusCode, Json<MarketOverview>), ApiError> {
    let conn = pool.0.lock().await;
    Ok((StatusCode::OK, Json(analytics::market_overview(&conn, Utc::now())?)))
}
