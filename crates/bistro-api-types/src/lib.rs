//! Wire types for the `/api/reports` endpoints.
//!
//! Field names are camelCase on the wire. Dates travel as strings and are
//! parsed by the server, so a client can send either `YYYY-MM-DD` or a full
//! RFC 3339 timestamp.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Query string of `GET /api/reports/{type}`. Every field arrives as text.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub compare_from: Option<String>,
    pub compare_to: Option<String>,
    pub timezone: Option<String>,
    pub include_projections: Option<String>,
    pub export: Option<String>,
    pub include_charts: Option<String>,
    pub include_raw_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DateRangeBody {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfigBody {
    pub date_range: DateRangeBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_period: Option<DateRangeBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_projections: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptionsBody {
    pub format: String,
    #[serde(default)]
    pub include_charts: bool,
    #[serde(default)]
    pub include_raw_data: bool,
}

/// Body of `POST /api/reports/{type}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportRequestBody {
    pub config: ReportConfigBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportOptionsBody>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    pub success: bool,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<usize>,
    /// Base64-encoded file content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportResult>,
    /// Milliseconds since the request started.
    pub generation_time: f64,
    pub cached: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationIssue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_time: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Body of `POST /api/reports/cache`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheActionRequest {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

/// Body of `PUT /api/reports/cache`. Required fields are optional here so a
/// missing one is reported by name.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartInvalidationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_date_range: Option<DateRangeBody>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheActionResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_body_accepts_minimal_config() {
        let body: ReportRequestBody = serde_json::from_str(
            r#"{ "config": { "dateRange": { "from": "2024-01-01", "to": "2024-01-31" } } }"#,
        )
        .expect("minimal body");
        assert_eq!(body.config.date_range.from, "2024-01-01");
        assert!(body.config.timezone.is_none());
        assert!(body.export.is_none());
    }

    #[test]
    fn post_body_rejects_wrong_types() {
        let result = serde_json::from_str::<ReportRequestBody>(
            r#"{ "config": { "dateRange": { "from": "2024-01-01", "to": "2024-01-31" }, "includeProjections": "yes" } }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn error_response_omits_empty_fields() {
        let body = ErrorResponse {
            success: false,
            error: "Invalid date range".to_string(),
            valid_types: None,
            details: None,
            generation_time: None,
            timestamp: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["success"], false);
        assert!(json.get("validTypes").is_none());
        assert_eq!(json["timestamp"], "1970-01-01T00:00:00Z");
    }
}
