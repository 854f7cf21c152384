//! Closed enumerations shared by the cache, the services, and the HTTP layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Analytics report families served under `/api/reports/{type}`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ReportType {
    SalesSummary,
    MenuEngineering,
    LaborAnalysis,
    InventoryControl,
    CustomerAnalytics,
}

impl ReportType {
    pub const ALL: [ReportType; 5] = [
        ReportType::SalesSummary,
        ReportType::MenuEngineering,
        ReportType::LaborAnalysis,
        ReportType::InventoryControl,
        ReportType::CustomerAnalytics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportType::SalesSummary => "sales-summary",
            ReportType::MenuEngineering => "menu-engineering",
            ReportType::LaborAnalysis => "labor-analysis",
            ReportType::InventoryControl => "inventory-control",
            ReportType::CustomerAnalytics => "customer-analytics",
        }
    }

    /// Every accepted wire name, in declaration order.
    pub fn valid_names() -> Vec<String> {
        Self::ALL.iter().map(|t| t.as_str().to_string()).collect()
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == value)
            .ok_or_else(|| DomainError::unknown("report type", value))
    }
}

/// Categories of operational data whose writes can stale cached reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Sales,
    Menu,
    Labor,
    Inventory,
    Customer,
}

impl DataType {
    pub const ALL: [DataType; 5] = [
        DataType::Sales,
        DataType::Menu,
        DataType::Labor,
        DataType::Inventory,
        DataType::Customer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Sales => "sales",
            DataType::Menu => "menu",
            DataType::Labor => "labor",
            DataType::Inventory => "inventory",
            DataType::Customer => "customer",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == value)
            .ok_or_else(|| DomainError::unknown("data type", value))
    }
}
