//! Timestamp and position formatting utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Format a playback position as `M:SS.mmm` (or `H:MM:SS.mmm` past one hour)
///
/// # Examples
///
/// ```
/// use twinview_common::time::format_position;
///
/// assert_eq!(format_position(0), "0:00.000");
/// assert_eq!(format_position(65_250), "1:05.250");
/// assert_eq!(format_position(3_723_004), "1:02:03.004");
/// ```
pub fn format_position(position_ms: u64) -> String {
    let millis = position_ms % 1000;
    let total_secs = position_ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;

    if total_mins >= 60 {
        format!("{}:{:02}:{:02}.{:03}", total_mins / 60, total_mins % 60, secs, millis)
    } else {
        format!("{}:{:02}.{:03}", total_mins, secs, millis)
    }
}

/// Format a signed drift as `+Nms` / `-Nms`
pub fn format_drift(drift_ms: i64) -> String {
    format!("{:+}ms", drift_ms)
}
