use time::{macros::format_description, OffsetDateTime};

/*
    Fixed-width RFC3339 in UTC with millisecond precision, the same shape SQLite's
    strftime('%Y-%m-%dT%H:%M:%fZ') produces, so stored timestamps sort as text.
*/
fn format(dt: OffsetDateTime) -> String {
    let layout = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    );
    dt.format(layout)
        .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}

/// Current instant in UTC formatted as RFC3339 (e.g. "2025-11-02T12:34:56.123Z").
pub fn now_timestamp() -> String {
    format(OffsetDateTime::now_utc())
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Renders an epoch-millisecond timestamp as RFC3339, `None` if out of range.
pub fn epoch_millis_to_rfc3339(millis: i64) -> Option<String> {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
        .ok()
        .map(format)
}
