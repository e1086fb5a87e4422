use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{check_required_text, double_option, required};
use crate::error::{ApiError, ApiResult, ValidationErrors};
use crate::models::UserSummary;

db_enum! {
    pub enum ReportType ("report type") {
        PortfolioSummary => "PORTFOLIO_SUMMARY",
        Performance => "PERFORMANCE",
        TaxReport => "TAX_REPORT",
        TransactionHistory => "TRANSACTION_HISTORY",
        AssetAllocation => "ASSET_ALLOCATION",
        MonthlySummary => "MONTHLY_SUMMARY",
        QuarterlySummary => "QUARTERLY_SUMMARY",
        YearlySummary => "YEARLY_SUMMARY",
        Custom => "CUSTOM",
    }
}

db_enum! {
    pub enum ReportStatus ("report status") {
        Generating => "GENERATING",
        Completed => "COMPLETED",
        Failed => "FAILED",
        Expired => "EXPIRED",
    }
}

db_enum! {
    pub enum ReportFormat ("report format") {
        Json => "JSON",
        Pdf => "PDF",
        Csv => "CSV",
        Xlsx => "XLSX",
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Report {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub report_type: ReportType,
    pub data: Value,
    pub parameters: Value,
    pub format: ReportFormat,
    pub status: ReportStatus,
    pub generated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub file_size: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    pub fn validate(&self) -> ApiResult<()> {
        let mut errors = ValidationErrors::new();
        check_required_text(&mut errors, "title", &self.title, 200);
        if !self.parameters.is_object() {
            errors.add("parameters", "Parameters must be a JSON object.");
        }
        if let (Some(start), Some(end)) = (self.period_start, self.period_end) {
            if start > end {
                errors.add("period_end", "Period end cannot be before period start");
            }
        }
        if matches!(self.file_size, Some(size) if size < 0) {
            errors.add("file_size", "Ensure this value is greater than or equal to 0.");
        }
        errors.into_result()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }

    pub fn file_size_mb(&self) -> Option<f64> {
        self.file_size
            .map(|bytes| (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0)
    }

    /// Seconds between generation start and completion.
    pub fn duration(&self) -> Option<f64> {
        self.completed_at
            .map(|done| (done - self.generated_at).num_milliseconds() as f64 / 1000.0)
    }

    pub fn mark_completed(&mut self, data: Option<Value>, now: DateTime<Utc>) {
        self.status = ReportStatus::Completed;
        self.completed_at = Some(now);
        if let Some(data) = data {
            self.data = data;
        }
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, error_message: Option<String>, now: DateTime<Utc>) {
        self.status = ReportStatus::Failed;
        if let Some(message) = error_message {
            self.data = json!({ "error": message });
        }
        self.updated_at = now;
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct ReportView {
    #[serde(flatten)]
    pub report: Report,
    pub user: UserSummary,
    pub is_expired: bool,
    pub file_size_mb: Option<f64>,
    pub duration: Option<f64>,
}

impl ReportView {
    pub fn new(report: Report, user: UserSummary, now: DateTime<Utc>) -> Self {
        ReportView {
            is_expired: report.is_expired(now),
            file_size_mb: report.file_size_mb(),
            duration: report.duration(),
            report,
            user,
        }
    }
}

/// Create and partial update payload. `status`, `data` and `file_size` are
/// ignored on create: new reports always start out generating and empty.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ReportInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub report_type: Option<ReportType>,
    pub format: Option<ReportFormat>,
    pub parameters: Option<Value>,
    #[serde(default, deserialize_with = "double_option")]
    pub period_start: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub period_end: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub status: Option<ReportStatus>,
    pub data: Option<Value>,
    #[serde(default, deserialize_with = "double_option")]
    pub file_size: Option<Option<i64>>,
    pub is_active: Option<bool>,
}

impl ReportInput {
    pub fn into_new(self, user_id: Uuid, now: DateTime<Utc>) -> ApiResult<Report> {
        let mut errors = ValidationErrors::new();
        let title = required(&mut errors, "title", self.title);
        let report_type = required(&mut errors, "report_type", self.report_type);
        let (Some(title), Some(report_type)) = (title, report_type) else {
            return Err(ApiError::Validation(errors));
        };

        let report = Report {
            id: Uuid::new_v4(),
            user_id,
            title: title.trim().to_string(),
            description: self.description.unwrap_or_default(),
            report_type,
            data: Value::Object(Map::new()),
            parameters: self.parameters.unwrap_or_else(|| Value::Object(Map::new())),
            format: self.format.unwrap_or(ReportFormat::Json),
            status: ReportStatus::Generating,
            generated_at: now,
            completed_at: None,
            expires_at: self.expires_at.flatten(),
            period_start: self.period_start.flatten(),
            period_end: self.period_end.flatten(),
            file_size: None,
            is_active: self.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        report.validate()?;
        Ok(report)
    }

    pub fn apply(self, report: &mut Report, now: DateTime<Utc>) -> ApiResult<()> {
        if let Some(title) = self.title {
            report.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            report.description = description;
        }
        if let Some(report_type) = self.report_type {
            report.report_type = report_type;
        }
        if let Some(format) = self.format {
            report.format = format;
        }
        if let Some(parameters) = self.parameters {
            report.parameters = parameters;
        }
        if let Some(period_start) = self.period_start {
            report.period_start = period_start;
        }
        if let Some(period_end) = self.period_end {
            report.period_end = period_end;
        }
        if let Some(expires_at) = self.expires_at {
            report.expires_at = expires_at;
        }
        if let Some(data) = self.data {
            report.data = data;
        }
        if let Some(file_size) = self.file_size {
            report.file_size = file_size;
        }
        if let Some(is_active) = self.is_active {
            report.is_active = is_active;
        }
        if let Some(status) = self.status {
            if status == ReportStatus::Completed && report.completed_at.is_none() {
                report.completed_at = Some(now);
            }
            report.status = status;
        }
        report.updated_at = now;
        report.validate()
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct CompleteReport {
    pub data: Option<Value>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct FailReport {
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn monthly() -> ReportInput {
        ReportInput {
            title: Some("March".into()),
            report_type: Some(ReportType::MonthlySummary),
            ..Default::default()
        }
    }

    #[test]
    fn create_starts_generating_with_empty_data() {
        let mut input = monthly();
        input.status = Some(ReportStatus::Completed);
        input.data = Some(json!({"smuggled": true}));
        let report = input.into_new(Uuid::new_v4(), Utc::now()).unwrap();
        assert_eq!(report.status, ReportStatus::Generating);
        assert_eq!(report.data, json!({}));
        assert_eq!(report.parameters, json!({}));
        assert_eq!(report.format, ReportFormat::Json);
    }

    #[test]
    fn period_must_be_ordered() {
        let mut input = monthly();
        input.period_start = Some(NaiveDate::from_ymd_opt(2024, 3, 31));
        input.period_end = Some(NaiveDate::from_ymd_opt(2024, 3, 1));
        match input.into_new(Uuid::new_v4(), Utc::now()) {
            Err(ApiError::Validation(errors)) => assert!(errors.has("period_end")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn lifecycle_completed_and_failed() {
        let start = Utc::now();
        let mut report = monthly().into_new(Uuid::new_v4(), start).unwrap();
        report.mark_completed(Some(json!({"rows": 3})), start + Duration::seconds(90));
        assert_eq!(report.status, ReportStatus::Completed);
        assert_eq!(report.duration(), Some(90.0));
        assert_eq!(report.data["rows"], 3);

        report.mark_failed(Some("disk full".into()), start + Duration::seconds(100));
        assert_eq!(report.status, ReportStatus::Failed);
        assert_eq!(report.data, json!({"error": "disk full"}));
    }

    #[test]
    fn expiry_and_file_size() {
        let now = Utc::now();
        let mut report = monthly().into_new(Uuid::new_v4(), now).unwrap();
        assert!(!report.is_expired(now));
        report.expires_at = Some(now - Duration::minutes(1));
        assert!(report.is_expired(now));

        report.file_size = Some(3 * 1024 * 1024 + 512 * 1024);
        assert_eq!(report.file_size_mb(), Some(3.5));
    }

    #[test]
    fn status_update_stamps_completion() {
        let now = Utc::now();
        let mut report = monthly().into_new(Uuid::new_v4(), now).unwrap();
        let update = ReportInput {
            status: Some(ReportStatus::Completed),
            ..Default::default()
        };
        update.apply(&mut report, now).unwrap();
        assert_eq!(report.completed_at, Some(now));
    }
}
