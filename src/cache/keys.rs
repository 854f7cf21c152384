//! Cache key derivation.
//!
//! A key is the report type plus a SHA-256 fingerprint of the canonical text form
//! of a [`ReportConfig`]. The fingerprint is stable across processes, so it can be
//! shared with an external store.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::domain::reports::{DateRange, ReportConfig};
use crate::domain::types::ReportType;

/// Identifies one cached report.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    report_type: ReportType,
    fingerprint: String,
}

impl CacheKey {
    pub fn new(report_type: ReportType, config: &ReportConfig) -> Self {
        Self {
            report_type,
            fingerprint: fingerprint(config),
        }
    }

    pub fn report_type(&self) -> ReportType {
        self.report_type
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "report:{}:{}", self.report_type, self.fingerprint)
    }
}

/// Hex SHA-256 over [`canonical_form`].
pub fn fingerprint(config: &ReportConfig) -> String {
    let digest = Sha256::digest(canonical_form(config).as_bytes());
    hex::encode(digest)
}

/// Field-ordered text serialization of a config. Every field participates.
pub fn canonical_form(config: &ReportConfig) -> String {
    let comparison = config
        .comparison_period
        .as_ref()
        .map(window)
        .unwrap_or_else(|| "-".to_string());

    format!(
        "range={};compare={};tz={};projections={}",
        window(&config.date_range),
        comparison,
        config.timezone.name(),
        config.include_projections,
    )
}

fn window(range: &DateRange) -> String {
    format!(
        "{}..{}",
        range.from().unix_timestamp_nanos(),
        range.to().unix_timestamp_nanos()
    )
}

#[cfg(test)]
mod tests {
    use chrono_tz::Tz;
    use time::macros::datetime;

    use super::*;

    fn january() -> ReportConfig {
        ReportConfig::new(
            DateRange::new(datetime!(2024-01-01 0:00 UTC), datetime!(2024-01-31 0:00 UTC))
                .expect("valid range"),
        )
    }

    #[test]
    fn same_config_same_key() {
        let a = CacheKey::new(ReportType::SalesSummary, &january());
        let b = CacheKey::new(ReportType::SalesSummary, &january());
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn report_type_is_part_of_the_key() {
        let a = CacheKey::new(ReportType::SalesSummary, &january());
        let b = CacheKey::new(ReportType::LaborAnalysis, &january());
        assert_ne!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn every_field_changes_the_fingerprint() {
        let base = fingerprint(&january());
        let comparison = DateRange::new(
            datetime!(2023-12-01 0:00 UTC),
            datetime!(2023-12-31 0:00 UTC),
        )
        .expect("valid range");

        let variants = [
            january().with_timezone(Tz::Europe__Berlin),
            january().with_projections(true),
            january().with_comparison(comparison),
        ];

        for variant in variants {
            assert_ne!(fingerprint(&variant), base, "variant {variant:?}");
        }
    }

    #[test]
    fn equal_instants_in_different_offsets_share_a_key() {
        let shifted = ReportConfig::new(
            DateRange::new(
                datetime!(2024-01-01 1:00 +1),
                datetime!(2024-01-31 1:00 +1),
            )
            .expect("valid range"),
        );
        assert_eq!(fingerprint(&shifted), fingerprint(&january()));
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let value = fingerprint(&january());
        assert_eq!(value.len(), 64);
        assert!(value.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
