use std::error::Error as StdError;
use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bistro_api_types::{ErrorResponse, ValidationIssue};
use time::OffsetDateTime;

use crate::application::error::{ErrorDetailPolicy, ErrorReport};
use crate::application::reports::GenerationError;
use crate::domain::types::ReportType;

pub mod messages {
    pub const INVALID_REPORT_TYPE: &str = "Invalid report type";
    pub const INVALID_PARAMETERS: &str = "Invalid request parameters";
    pub const INVALID_DATE_RANGE: &str = "Invalid date range";
    pub const UNKNOWN_ACTION: &str = "Unknown cache action";
    pub const GENERATION_FAILED: &str = "Failed to generate report";
    pub const GENERATION_TIMED_OUT: &str = "Report generation timed out";
    pub const INTERNAL: &str = "Internal server error";
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    valid_types: Option<Vec<String>>,
    details: Option<Vec<ValidationIssue>>,
    generation_time: Option<f64>,
    report: ErrorReport,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>, report: ErrorReport) -> Self {
        Self {
            status,
            error: error.into(),
            valid_types: None,
            details: None,
            generation_time: None,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn invalid_report_type(raw: &str) -> Self {
        let report = ErrorReport::from_message(
            "infra::http::api::report_type",
            StatusCode::BAD_REQUEST,
            format!("unknown report type `{raw}`"),
        );
        let mut err = Self::new(StatusCode::BAD_REQUEST, messages::INVALID_REPORT_TYPE, report);
        err.valid_types = Some(ReportType::valid_names());
        err
    }

    pub fn invalid_parameters(details: Vec<ValidationIssue>) -> Self {
        let summary = details
            .iter()
            .map(|issue| format!("{}: {}", issue.field, issue.message))
            .collect::<Vec<_>>()
            .join("; ");
        let report = ErrorReport::from_message(
            "infra::http::api::validation",
            StatusCode::BAD_REQUEST,
            summary,
        );
        let mut err = Self::new(StatusCode::BAD_REQUEST, messages::INVALID_PARAMETERS, report);
        err.details = Some(details);
        err
    }

    pub fn invalid_date_range(detail: impl Into<String>) -> Self {
        let report = ErrorReport::from_message(
            "infra::http::api::validation",
            StatusCode::BAD_REQUEST,
            detail,
        );
        Self::new(StatusCode::BAD_REQUEST, messages::INVALID_DATE_RANGE, report)
    }

    pub fn unknown_action(action: &str) -> Self {
        let detail = format!("`{action}` is not one of invalidate, warm, cleanup, stats");
        let report = ErrorReport::from_message(
            "infra::http::api::cache",
            StatusCode::BAD_REQUEST,
            detail.clone(),
        );
        let mut err = Self::new(StatusCode::BAD_REQUEST, messages::UNKNOWN_ACTION, report);
        err.details = Some(vec![ValidationIssue::new("action", detail)]);
        err
    }

    /// Generation failure. Timeouts answer 504; the message is gated by `policy`.
    pub fn generation(err: &GenerationError, elapsed: Duration, policy: ErrorDetailPolicy) -> Self {
        let (status, generic) = match err {
            GenerationError::Timeout(_) => {
                (StatusCode::GATEWAY_TIMEOUT, messages::GENERATION_TIMED_OUT)
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, messages::GENERATION_FAILED),
        };
        let report = ErrorReport::from_error("infra::http::api::reports", status, err);
        let mut api = Self::new(status, policy.public_message(err, generic), report);
        api.generation_time = Some(elapsed.as_secs_f64() * 1000.0);
        api
    }

    /// Internal failure with a fixed public message.
    pub fn internal(source: &'static str, err: &dyn StdError) -> Self {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        Self::new(status, messages::INTERNAL, ErrorReport::from_error(source, status, err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: self.error,
            valid_types: self.valid_types,
            details: self.details,
            generation_time: self.generation_time,
            timestamp: OffsetDateTime::now_utc(),
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}
