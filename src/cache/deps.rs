//! Which reports consume which operational data.
//!
//! This table is a business rule: a write to a data category stales every report
//! type listed for it, and nothing else.

use crate::domain::types::{DataType, ReportType};

/// Dependent report types per data category.
pub const REPORT_DEPENDENCIES: [(DataType, &[ReportType]); 5] = [
    (
        DataType::Sales,
        &[ReportType::SalesSummary, ReportType::CustomerAnalytics],
    ),
    (
        DataType::Menu,
        &[ReportType::MenuEngineering, ReportType::SalesSummary],
    ),
    (DataType::Labor, &[ReportType::LaborAnalysis]),
    (DataType::Inventory, &[ReportType::InventoryControl]),
    (DataType::Customer, &[ReportType::CustomerAnalytics]),
];

/// Report types that must be invalidated when `data_type` changes.
pub fn dependents(data_type: DataType) -> &'static [ReportType] {
    REPORT_DEPENDENCIES
        .iter()
        .find(|(source, _)| *source == data_type)
        .map(|(_, reports)| *reports)
        .unwrap_or(&[])
}
