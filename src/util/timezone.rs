//! Timezone-aware parsing of the date inputs accepted by the report API.

use chrono::{NaiveDate, TimeZone};
use chrono_tz::Tz;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time};

use crate::domain::error::DomainError;

/// Midnight of `date` in `tz`, expressed as an instant.
///
/// Zones that skip midnight on a DST transition resolve to the first valid local
/// time after it.
pub fn local_midnight(date: Date, tz: Tz) -> Option<OffsetDateTime> {
    let naive = NaiveDate::from_ymd_opt(
        date.year(),
        u32::from(u8::from(date.month())),
        u32::from(date.day()),
    )?
    .and_hms_opt(0, 0, 0)?;

    let local = tz.from_local_datetime(&naive).earliest().or_else(|| {
        tz.from_local_datetime(&(naive + chrono::Duration::hours(1)))
            .earliest()
    })?;

    OffsetDateTime::from_unix_timestamp(local.timestamp()).ok()
}

/// Parse an RFC 3339 timestamp, or a bare `YYYY-MM-DD` date taken as midnight in `tz`.
pub fn parse_instant(input: &str, tz: Tz) -> Result<OffsetDateTime, DomainError> {
    let input = input.trim();
    if let Ok(instant) = OffsetDateTime::parse(input, &Rfc3339) {
        return Ok(instant);
    }

    let date = Date::parse(input, format_description!("[year]-[month]-[day]")).map_err(|_| {
        DomainError::validation(format!(
            "`{input}` is not an ISO 8601 date (YYYY-MM-DD) or RFC 3339 timestamp"
        ))
    })?;

    local_midnight(date, tz)
        .ok_or_else(|| DomainError::validation(format!("`{input}` has no midnight in {tz}")))
}

pub fn parse_timezone(name: &str) -> Result<Tz, DomainError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| DomainError::unknown("timezone", name))
}

/// Start of the current UTC day.
pub fn today_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc().replace_time(Time::MIDNIGHT)
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use super::*;

    #[test]
    fn bare_dates_are_midnight_in_the_requested_zone() {
        let utc = parse_instant("2024-01-10", Tz::UTC).expect("utc date");
        assert_eq!(utc, datetime!(2024-01-10 0:00 UTC));

        let tokyo = parse_instant("2024-01-10", Tz::Asia__Tokyo).expect("tokyo date");
        assert_eq!(tokyo, datetime!(2024-01-09 15:00 UTC));
    }

    #[test]
    fn rfc3339_timestamps_are_taken_verbatim() {
        let parsed = parse_instant("2024-03-01T12:30:00+02:00", Tz::America__New_York)
            .expect("timestamp");
        assert_eq!(parsed, datetime!(2024-03-01 10:30 UTC));
    }

    #[test]
    fn garbage_is_a_validation_error() {
        let err = parse_instant("last tuesday", Tz::UTC).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn midnight_gap_resolves_forward() {
        // Santiago skipped 00:00 -> 01:00 on 2023-09-03.
        let resolved =
            local_midnight(date!(2023 - 09 - 03), Tz::America__Santiago).expect("resolved");
        assert_eq!(resolved, datetime!(2023-09-03 4:00 UTC));
    }

    #[test]
    fn timezone_names_are_validated() {
        assert_eq!(parse_timezone("Europe/Paris").expect("paris"), Tz::Europe__Paris);
        assert!(parse_timezone("Mars/Olympus").is_err());
    }
}
