use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{order_by, users, Conditions};
use crate::db::uuid_column;
use crate::error::{ApiError, ApiResult};
use crate::models::{Report, ReportFormat, ReportStatus, ReportType, ReportView, User, UserSummary};

const COLUMNS: &str = "id, user_id, title, description, report_type, data, parameters, format, \
    status, generated_at, completed_at, expires_at, period_start, period_end, file_size, \
    is_active, created_at, updated_at";

const ORDERING: &[(&str, &str)] = &[
    ("generated_at", "generated_at"),
    ("completed_at", "completed_at"),
];

#[derive(Debug, Default, Clone)]
pub struct ReportFilter {
    pub owner: Option<Uuid>,
    pub report_type: Option<ReportType>,
    pub status: Option<ReportStatus>,
    pub format: Option<ReportFormat>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

fn map_report(row: &Row<'_>) -> rusqlite::Result<Report> {
    Ok(Report {
        id: uuid_column(row, "id")?,
        user_id: uuid_column(row, "user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        report_type: row.get("report_type")?,
        data: row.get("data")?,
        parameters: row.get("parameters")?,
        format: row.get("format")?,
        status: row.get("status")?,
        generated_at: row.get("generated_at")?,
        completed_at: row.get("completed_at")?,
        expires_at: row.get("expires_at")?,
        period_start: row.get("period_start")?,
        period_end: row.get("period_end")?,
        file_size: row.get("file_size")?,
        is_active: row.get("is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn insert(conn: &Connection, report: &Report) -> ApiResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO reports ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
        ),
        params![
            report.id.to_string(),
            report.user_id.to_string(),
            report.title,
            report.description,
            report.report_type,
            report.data,
            report.parameters,
            report.format,
            report.status,
            report.generated_at,
            report.completed_at,
            report.expires_at,
            report.period_start,
            report.period_end,
            report.file_size,
            report.is_active,
            report.created_at,
            report.updated_at,
        ],
    )?;
    Ok(())
}

pub fn update(conn: &Connection, report: &Report) -> ApiResult<()> {
    let changed = conn.execute(
        "UPDATE reports SET title = ?2, description = ?3, report_type = ?4, data = ?5,
             parameters = ?6, format = ?7, status = ?8, completed_at = ?9, expires_at = ?10,
             period_start = ?11, period_end = ?12, file_size = ?13, is_active = ?14,
             updated_at = ?15
         WHERE id = ?1",
        params![
            report.id.to_string(),
            report.title,
            report.description,
            report.report_type,
            report.data,
            report.parameters,
            report.format,
            report.status,
            report.completed_at,
            report.expires_at,
            report.period_start,
            report.period_end,
            report.file_size,
            report.is_active,
            report.updated_at,
        ],
    )?;
    if changed == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(())
}

pub fn get(conn: &Connection, id: Uuid) -> ApiResult<Option<Report>> {
    let report = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM reports WHERE id = ?1"),
            [id.to_string()],
            map_report,
        )
        .optional()?;
    Ok(report)
}

pub fn find_visible(conn: &Connection, id: Uuid, caller: &User) -> ApiResult<Report> {
    get(conn, id)?
        .filter(|report| report.is_active && (caller.is_staff || report.user_id == caller.id))
        .ok_or(ApiError::NotFound)
}

pub fn delete(conn: &Connection, id: Uuid) -> ApiResult<()> {
    let removed = conn.execute("DELETE FROM reports WHERE id = ?1", [id.to_string()])?;
    if removed == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(())
}

pub fn list(conn: &Connection, filter: &ReportFilter) -> ApiResult<Vec<Report>> {
    let mut conditions = Conditions::new();
    conditions.push_raw("is_active = 1");
    if let Some(owner) = filter.owner {
        conditions.push("user_id = ?", owner.to_string());
    }
    if let Some(report_type) = filter.report_type {
        conditions.push("report_type = ?", report_type.as_str().to_string());
    }
    if let Some(status) = filter.status {
        conditions.push("status = ?", status.as_str().to_string());
    }
    if let Some(format) = filter.format {
        conditions.push("format = ?", format.as_str().to_string());
    }
    if let Some(term) = &filter.search {
        conditions.push_search(&["title", "description"], term);
    }

    let sql = format!(
        "SELECT {COLUMNS} FROM reports{}{}",
        conditions.sql(),
        order_by(filter.ordering.as_deref(), ORDERING, "generated_at DESC"),
    );
    let mut stmt = conn.prepare(&sql)?;
    let reports = stmt
        .query_map(params_from_iter(conditions.into_values()), map_report)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(reports)
}

pub fn view(conn: &Connection, report: Report, now: DateTime<Utc>) -> ApiResult<ReportView> {
    let owner = users::get(conn, report.user_id)?.ok_or_else(|| {
        ApiError::Internal(format!("report {} references a missing user", report.id))
    })?;
    Ok(ReportView::new(report, UserSummary::from(&owner), now))
}
