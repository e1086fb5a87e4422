use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::db::DatabasePool;
use crate::error::ApiError;
use crate::extract::{choice, lenient, ApiJson, ApiPath, ApiQuery, OptionalJson};
use crate::models::{CompleteReport, FailReport, ReportInput, ReportView};
use crate::repo::reports::{self, ReportFilter};

#[derive(Deserialize, Debug, Default)]
pub struct ReportQuery {
    pub report_type: Option<String>,
    pub status: Option<String>,
    pub format: Option<String>,
    pub user: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

impl ReportQuery {
    fn into_filter(self, caller: &CurrentUser) -> Result<ReportFilter, ApiError> {
        Ok(ReportFilter {
            owner: caller.owner_scope(lenient(self.user.as_deref())),
            report_type: choice("report_type", self.report_type.as_deref())?,
            status: choice("status", self.status.as_deref())?,
            format: choice("format", self.format.as_deref())?,
            search: self.search,
            ordering: self.ordering,
        })
    }
}

pub async fn list_reports(
    State(pool): State<DatabasePool>,
    caller: CurrentUser,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> Result<(StatusCode, Json<Vec<ReportView>>), ApiError> {
    let filter = query.into_filter(&caller)?;
    let now = Utc::now();
    let conn = pool.0.lock().await;
    let views = reports::list(&conn, &filter)?
        .into_iter()
        .map(|report| reports::view(&conn, report, now))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((StatusCode::OK, Json(views)))
}

/// Requests a report; it starts out generating with empty data.
#[axum::debug_handler]
pub async fn create_report(
    State(pool): State<DatabasePool>,
    caller: CurrentUser,
    ApiJson(input): ApiJson<ReportInput>,
) -> Result<(StatusCode, Json<ReportView>), ApiError> {
    let now = Utc::now();
    let report = input.into_new(caller.0.id, now)?;

    let conn = pool.0.lock().await;
    reports::insert(&conn, &report)?;
    tracing::info!("Report {} requested by {}", report.id, caller.0.username);
    Ok((StatusCode::CREATED, Json(reports::view(&conn, report, now)?)))
}

pub async fn get_report(
    State(pool): State<DatabasePool>,
    caller: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<(StatusCode, Json<ReportView>), ApiError> {
    let conn = pool.0.lock().await;
    let report = reports::find_visible(&conn, id, &caller.0)?;
    Ok((StatusCode::OK, Json(reports::view(&conn, report, Utc::now())?)))
}

/// Partial update, used for both PUT and PATCH.
#[axum::debug_handler]
pub async fn update_report(
    State(pool): State<DatabasePool>,
    caller: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<ReportInput>,
) -> Result<(StatusCode, Json<ReportView>), ApiError> {
    let now = Utc::now();
    let conn = pool.0.lock().await;
    let mut report = reports::find_visible(&conn, id, &caller.0)?;
    input.apply(&mut report, now)?;
    reports::update(&conn, &report)?;
    Ok((StatusCode::OK, Json(reports::view(&conn, report, now)?)))
}

pub async fn delete_report(
    State(pool): State<DatabasePool>,
    caller: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    let conn = pool.0.lock().await;
    reports::find_visible(&conn, id, &caller.0)?;
    reports::delete(&conn, id)?;
    tracing::info!("Deleted report {}", id);
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn complete_report(
    State(pool): State<DatabasePool>,
    caller: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    OptionalJson(body): OptionalJson<CompleteReport>,
) -> Result<(StatusCode, Json<ReportView>), ApiError> {
    let data = body.and_then(|body| body.data);
    let now = Utc::now();
    let conn = pool.0.lock().await;
    let mut report = reports::find_visible(&conn, id, &caller.0)?;
    report.mark_completed(data, now);
    reports::update(&conn, &report)?;
    tracing::info!("Report {} completed", id);
    Ok((StatusCode::OK, Json(reports::view(&conn, report, now)?)))
}

#[axum::debug_handler]
pub async fn fail_report(
    State(pool): State<DatabasePool>,
    caller: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    OptionalJson(body): OptionalJson<FailReport>,
) -> Result<(StatusCode, Json<ReportView>), ApiError> {
    let error = body.and_then(|body| body.error);
    let now = Utc::now();
    let conn = pool.0.lock().await;
    let mut report = reports::find_visible(&conn, id, &caller.0)?;
    report.mark_failed(error, now);
    reports::update(&conn, &report)?;
    tracing::warn!("Report {} marked as failed", id);
    Ok((StatusCode::OK, Json(reports::view(&conn, report, now)?)))
}
