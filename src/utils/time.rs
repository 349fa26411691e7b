use chrono::{Duration, NaiveDate};

/// This is the standard way of converting a date to a string in stempeluhr.
pub fn date_to_backup_name(date: NaiveDate) -> String {
    format!("backup-{}.json", date.format("%Y-%m-%d"))
}

/// Clamps a possibly negative duration at zero. Wall clock reads can go backwards.
pub fn non_negative(duration: Duration) -> Duration {
    duration.max(Duration::zero())
}

/// `a + b`, pinned to [Duration::MAX] or [Duration::MIN] instead of overflowing. Stored durations
/// come from a file people may edit by hand.
pub fn saturating_add(a: Duration, b: Duration) -> Duration {
    a.checked_add(&b).unwrap_or(if b < Duration::zero() {
        Duration::MIN
    } else {
        Duration::MAX
    })
}

pub fn saturating_sum(durations: impl IntoIterator<Item = Duration>) -> Duration {
    durations
        .into_iter()
        .fold(Duration::zero(), saturating_add)
}

/// Formats a duration the same way the tray shows it: `1h 2m 3s`. Partial seconds are dropped.
pub fn format_duration(duration: Duration) -> String {
    let seconds = non_negative(duration).num_seconds();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    format!("{}h {}m {}s", hours, minutes % 60, seconds % 60)
}

/// Milliseconds expressed as fractional hours.
pub fn as_hours(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 3_600_000.
}
