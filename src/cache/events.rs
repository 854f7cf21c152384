//! Data-mutation events that drive smart invalidation.

use time::OffsetDateTime;

use crate::domain::reports::DateRange;
use crate::domain::types::DataType;

/// A write to operational data. Consumed immediately, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationEvent {
    pub data_type: DataType,
    pub timestamp: OffsetDateTime,
    pub affected_range: Option<DateRange>,
}

impl InvalidationEvent {
    pub fn new(data_type: DataType, timestamp: OffsetDateTime) -> Self {
        Self {
            data_type,
            timestamp,
            affected_range: None,
        }
    }

    pub fn with_affected_range(mut self, range: DateRange) -> Self {
        self.affected_range = Some(range);
        self
    }
}
