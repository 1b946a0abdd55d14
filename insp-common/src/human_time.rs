//! Human-readable duration formatting
//!
//! Stay durations are shown as `{d}d {h}h {m}m`. Leading zero units are
//! dropped; minutes are always present.

const MINUTES_PER_HOUR: i64 = 60;
const MINUTES_PER_DAY: i64 = 24 * MINUTES_PER_HOUR;

/// Format a duration in whole minutes.
///
/// Negative input is clamped to zero: a stay can not end before it started.
///
/// # Examples
///
/// ```
/// use insp_common::human_time::format_minutes;
///
/// assert_eq!(format_minutes(0), "0m");
/// assert_eq!(format_minutes(45), "45m");
/// assert_eq!(format_minutes(61), "1h 1m");
/// assert_eq!(format_minutes(1440), "1d 0h 0m");
/// assert_eq!(format_minutes(1505), "1d 1h 5m");
/// ```
pub fn format_minutes(minutes: i64) -> String {
    let minutes = minutes.max(0);
    let days = minutes / MINUTES_PER_DAY;
    let hours = (minutes % MINUTES_PER_DAY) / MINUTES_PER_HOUR;
    let mins = minutes % MINUTES_PER_HOUR;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, mins)
    } else if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}

/// Format an optional duration, `None` stays `None`.
pub fn format_minutes_opt(minutes: Option<i64>) -> Option<String> {
    minutes.map(format_minutes)
}
