//! Fixed daily window
//!
//! Quota resets at midnight in the timezone of the supplied clock reading,
//! not 24 hours after the last use.

use chrono::{DateTime, Days, NaiveDateTime, TimeZone, Utc};

/// Start of the calendar day containing `now`
///
/// When midnight does not exist locally (DST gap) the earliest valid instant
/// of the day is used.
pub fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    local_midnight(&now.timezone(), now.date_naive().and_hms_opt(0, 0, 0))
        .unwrap_or_else(|| now.with_timezone(&Utc))
}

/// Start of the next calendar day after `now`
pub fn next_reset<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let tomorrow = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .and_then(|d| d.and_hms_opt(0, 0, 0));

    local_midnight(&now.timezone(), tomorrow)
        .unwrap_or_else(|| now.with_timezone(&Utc) + chrono::Duration::days(1))
}

fn local_midnight<Tz: TimeZone>(tz: &Tz, midnight: Option<NaiveDateTime>) -> Option<DateTime<Utc>> {
    let midnight = midnight?;

    if let Some(dt) = tz.from_local_datetime(&midnight).earliest() {
        return Some(dt.with_timezone(&Utc));
    }

    // Gap at midnight: walk forward to the first representable minute.
    (1..=180).find_map(|minutes| {
        tz.from_local_datetime(&(midnight + chrono::Duration::minutes(minutes)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    })
}
