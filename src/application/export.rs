//! Report export.
//!
//! Exports are produced after the report is served from cache or generated and
//! never affect whether the report itself is returned.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::error::DomainError;
use crate::domain::reports::Report;
use crate::domain::types::ReportType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Pdf,
    Excel,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Csv, ExportFormat::Pdf, ExportFormat::Excel];

    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Excel => "excel",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Excel => "xlsx",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Excel => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ExportFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == value)
            .ok_or_else(|| DomainError::unknown("export format", value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub include_charts: bool,
    pub include_raw_data: bool,
}

impl ExportOptions {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            include_charts: false,
            include_raw_data: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub format: ExportFormat,
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported export format `{0}`")]
    Unsupported(ExportFormat),
    #[error("export failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(
        &self,
        report_type: ReportType,
        report: &Report,
        options: &ExportOptions,
    ) -> Result<ExportArtifact, ExportError>;
}

/// Flattens the report payload into `field,value` rows.
///
/// Nested objects become dotted paths and array items are indexed
/// (`sections.daily[0].netSales`). Without `include_raw_data` array items are
/// skipped and only summary figures are written. Charts have no CSV form.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvExporter;

#[async_trait]
impl Exporter for CsvExporter {
    async fn export(
        &self,
        report_type: ReportType,
        report: &Report,
        options: &ExportOptions,
    ) -> Result<ExportArtifact, ExportError> {
        if options.format != ExportFormat::Csv {
            return Err(ExportError::Unsupported(options.format));
        }

        let mut rows = Vec::new();
        flatten(report.payload(), String::new(), options.include_raw_data, &mut rows);

        let mut body = String::from("field,value\n");
        for (field, value) in rows {
            body.push_str(&csv_field(&field));
            body.push(',');
            body.push_str(&csv_field(&value));
            body.push('\n');
        }

        Ok(ExportArtifact {
            format: ExportFormat::Csv,
            filename: format!("{report_type}.{}", ExportFormat::Csv.extension()),
            content_type: ExportFormat::Csv.content_type(),
            bytes: body.into_bytes(),
        })
    }
}

fn flatten(value: &Value, path: String, include_arrays: bool, rows: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (name, child) in map {
                let child_path = if path.is_empty() {
                    name.clone()
                } else {
                    format!("{path}.{name}")
                };
                flatten(child, child_path, include_arrays, rows);
            }
        }
        Value::Array(items) => {
            if include_arrays {
                for (index, child) in items.iter().enumerate() {
                    flatten(child, format!("{path}[{index}]"), include_arrays, rows);
                }
            }
        }
        Value::Null => rows.push((path, String::new())),
        Value::String(text) => rows.push((path, text.clone())),
        other => rows.push((path, other.to_string())),
    }
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn report() -> Report {
        Report::new(json!({
            "totals": { "netSales": 1200.5, "label": "Main, Street" },
            "daily": [ { "netSales": 600 }, { "netSales": 600.5 } ],
            "note": null
        }))
    }

    async fn export(options: ExportOptions) -> Result<ExportArtifact, ExportError> {
        CsvExporter
            .export(ReportType::SalesSummary, &report(), &options)
            .await
    }

    #[tokio::test]
    async fn csv_flattens_nested_fields() {
        let mut options = ExportOptions::new(ExportFormat::Csv);
        options.include_raw_data = true;
        let artifact = export(options).await.expect("csv");
        let body = String::from_utf8(artifact.bytes).expect("utf-8");

        assert_eq!(artifact.filename, "sales-summary.csv");
        assert!(body.starts_with("field,value\n"));
        assert!(body.contains("totals.netSales,1200.5\n"));
        assert!(body.contains("daily[1].netSales,600.5\n"));
        assert!(body.contains("totals.label,\"Main, Street\"\n"));
        assert!(body.contains("note,\n"));
    }

    #[tokio::test]
    async fn summary_only_skips_array_rows() {
        let artifact = export(ExportOptions::new(ExportFormat::Csv)).await.expect("csv");
        let body = String::from_utf8(artifact.bytes).expect("utf-8");

        assert!(!body.contains("daily["));
        assert!(body.contains("totals.netSales"));
    }

    #[tokio::test]
    async fn binary_formats_are_unsupported() {
        for format in [ExportFormat::Pdf, ExportFormat::Excel] {
            let err = export(ExportOptions::new(format)).await.expect_err("unsupported");
            assert!(matches!(err, ExportError::Unsupported(f) if f == format));
        }
    }

    #[test]
    fn format_parses_wire_names() {
        assert_eq!("excel".parse::<ExportFormat>().expect("format"), ExportFormat::Excel);
        assert!("docx".parse::<ExportFormat>().is_err());
    }
}
