//! Built-in report generators.
//!
//! These produce the report skeleton for each type with zeroed figures. A
//! deployment wires real generators over its operational data through
//! [`ReportGenerators::register`](super::reports::ReportGenerators::register).

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::application::reports::{GenerationError, ReportGenerator};
use crate::domain::reports::{Report, ReportConfig};
use crate::domain::types::ReportType;

pub struct BaselineGenerator {
    report_type: ReportType,
}

impl BaselineGenerator {
    pub fn new(report_type: ReportType) -> Self {
        Self { report_type }
    }

    fn sections(&self) -> Value {
        match self.report_type {
            ReportType::SalesSummary => json!({
                "totals": {
                    "grossSales": 0.0,
                    "netSales": 0.0,
                    "orders": 0,
                    "averageTicket": 0.0
                },
                "daily": [],
                "byCategory": []
            }),
            ReportType::MenuEngineering => json!({
                "items": [],
                "classification": {
                    "stars": [],
                    "plowhorses": [],
                    "puzzles": [],
                    "dogs": []
                }
            }),
            ReportType::LaborAnalysis => json!({
                "laborCost": 0.0,
                "laborCostPercent": 0.0,
                "scheduledHours": 0.0,
                "actualHours": 0.0,
                "byRole": []
            }),
            ReportType::InventoryControl => json!({
                "variance": [],
                "wasteCost": 0.0,
                "lowStock": []
            }),
            ReportType::CustomerAnalytics => json!({
                "guests": 0,
                "repeatRate": 0.0,
                "segments": []
            }),
        }
    }
}

#[async_trait]
impl ReportGenerator for BaselineGenerator {
    async fn generate(&self, config: &ReportConfig) -> Result<Report, GenerationError> {
        let parameters = serde_json::to_value(config)
            .map_err(|err| GenerationError::failed(format!("config serialization: {err}")))?;
        let projections = config
            .include_projections
            .then(|| json!({ "method": "trailing-average", "periods": [] }));

        Ok(Report::new(json!({
            "reportType": self.report_type,
            "parameters": parameters,
            "sections": self.sections(),
            "projections": projections,
            "dataSource": "baseline"
        })))
    }
}
