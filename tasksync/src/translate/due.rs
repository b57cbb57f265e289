//! Due-date conversion to and from the remote format.
//!
//! A due instant that falls on local midnight in the owning zone is an
//! all-day due date and is sent as a bare calendar date. Anything else is a
//! timed due date, sent as a UTC timestamp with microseconds plus the zone
//! name.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tasksync_proto::command::Due;

use super::TranslateError;

/// Calendar-date format for all-day due dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// UTC timestamp format for timed due dates and completion times.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Converts a due instant to the remote representation.
#[must_use]
pub fn to_remote(due: DateTime<Utc>, zone: Tz) -> Due {
    let local = due.with_timezone(&zone);
    if local.hour() == 0 && local.minute() == 0 && local.second() == 0 {
        Due {
            date: local.format(DATE_FORMAT).to_string(),
            timezone: None,
            is_recurring: false,
        }
    } else {
        Due {
            date: format_timestamp(due),
            timezone: Some(zone.name().to_string()),
            is_recurring: false,
        }
    }
}

/// Reconstructs the due instant from its remote representation.
///
/// All-day dates become local midnight in `zone`. Timed values carry their
/// own zone name, which wins over `zone` only for naming purposes: the
/// timestamp itself is already UTC.
///
/// # Errors
///
/// Returns [`TranslateError::InvalidDue`] if the string matches neither
/// format, or if midnight does not exist on that date in `zone`.
pub fn from_remote(due: &Due, zone: Tz) -> Result<DateTime<Utc>, TranslateError> {
    let invalid = || TranslateError::InvalidDue(due.date.clone());
    if due.is_date_only() {
        let date = NaiveDate::parse_from_str(&due.date, DATE_FORMAT).map_err(|_| invalid())?;
        let local = zone
            .from_local_datetime(&date.and_time(NaiveTime::MIN))
            .earliest()
            .ok_or_else(invalid)?;
        Ok(local.with_timezone(&Utc))
    } else {
        parse_timestamp(&due.date).ok_or_else(invalid)
    }
}

/// Formats an instant as `YYYY-MM-DDTHH:MM:SS.ffffffZ`.
#[must_use]
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

/// Parses a `...Z` UTC timestamp with optional fractional seconds.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.fZ")
        .ok()
        .map(|naive| naive.and_utc())
}
