use time::OffsetDateTime;

/// Milliseconds since the Unix epoch.
pub fn unix_millis() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}

/// Fresh session id in the helper's `web_<millis>` form.
pub fn new_session_id() -> String {
    format!("web_{}", unix_millis())
}
