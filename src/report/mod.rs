//! Derived views over stored sessions: daily totals, overtime and the CSV export. Nothing here is
//! persisted.

pub mod export;

use std::{collections::BTreeSet, fmt::Display};

use chrono::{Duration, NaiveDate, TimeZone};

use crate::{
    storage::entities::Session,
    utils::time::{as_hours, format_duration, saturating_add, saturating_sum},
};

/// Expected work per day that has at least one session.
pub const WORKDAY: Duration = Duration::hours(8);

fn local_date<Tz: TimeZone>(session: &Session, tz: &Tz) -> NaiveDate {
    session.start.with_timezone(tz).date_naive()
}

/// Sum of sessions that started on `date` in `tz`.
pub fn total_on<Tz: TimeZone>(sessions: &[Session], date: NaiveDate, tz: &Tz) -> Duration {
    saturating_sum(
        sessions
            .iter()
            .filter(|s| local_date(s, tz) == date)
            .map(|s| s.duration),
    )
}

pub fn total(sessions: &[Session]) -> Duration {
    saturating_sum(sessions.iter().map(|s| s.duration))
}

/// Number of distinct calendar days with at least one session.
pub fn workdays<Tz: TimeZone>(sessions: &[Session], tz: &Tz) -> usize {
    sessions
        .iter()
        .map(|s| local_date(s, tz))
        .collect::<BTreeSet<_>>()
        .len()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub today: Duration,
    pub total: Duration,
    pub workdays: usize,
    /// Worked time beyond [WORKDAY] per workday. Negative when behind.
    pub overtime: Duration,
}

impl Summary {
    pub fn of<Tz: TimeZone>(sessions: &[Session], today: NaiveDate, tz: &Tz) -> Self {
        let total = total(sessions);
        let workdays = workdays(sessions, tz);
        Self {
            today: total_on(sessions, today, tz),
            total,
            workdays,
            overtime: saturating_add(total, -expected_work(workdays)),
        }
    }
}

fn expected_work(workdays: usize) -> Duration {
    i32::try_from(workdays)
        .ok()
        .and_then(|days| WORKDAY.checked_mul(days))
        .unwrap_or(Duration::MAX)
}

impl Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.overtime < Duration::zero() { "-" } else { "" };
        writeln!(f, "Today:\t\t{}", format_duration(self.today))?;
        writeln!(f, "Total:\t\t{}", format_duration(self.total))?;
        writeln!(f, "Workdays:\t{}", self.workdays)?;
        write!(f, "Overtime:\t{sign}{}", format_duration(self.overtime.abs()))
    }
}

/// One line per session for terminal listings.
pub fn session_row<Tz: TimeZone>(index: usize, session: &Session, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    let start = session.start.with_timezone(tz);
    let end = session.end.with_timezone(tz);
    format!(
        "{index}\t{}\t{}\t{}\t{}\t{:.2}h\t{} pauses",
        start.format("%Y-%m-%d"),
        start.format("%H:%M:%S"),
        end.format("%H:%M:%S"),
        format_duration(session.duration),
        as_hours(session.duration),
        session.pauses.len(),
    )
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, NaiveDate, Utc};

    use crate::storage::entities::Session;

    use super::{session_row, total, total_on, workdays, Summary};

    fn session(start: &str, hours: i64) -> Session {
        let start = DateTime::parse_from_rfc3339(start).unwrap().to_utc();
        Session::without_pauses(start, start + Duration::hours(hours))
    }

    fn sessions() -> Vec<Session> {
        vec![
            session("2025-03-03T08:00:00Z", 5),
            session("2025-03-03T14:00:00Z", 4),
            session("2025-03-04T09:00:00Z", 6),
        ]
    }

    #[test]
    fn test_total_on_day() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        assert_eq!(total_on(&sessions(), date, &Utc), Duration::hours(9));
    }

    #[test]
    fn test_workdays_are_distinct_dates() {
        assert_eq!(workdays(&sessions(), &Utc), 2);
        assert_eq!(workdays(&[], &Utc), 0);
    }

    #[test]
    fn test_overtime() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let summary = Summary::of(&sessions(), today, &Utc);

        assert_eq!(summary.today, Duration::hours(6));
        assert_eq!(summary.total, Duration::hours(15));
        assert_eq!(summary.overtime, Duration::hours(-1));
        assert!(summary.to_string().contains("Overtime:\t-1h 0m 0s"));
    }

    #[test]
    fn test_huge_durations_saturate() {
        let start = DateTime::parse_from_rfc3339("2025-03-03T08:00:00Z").unwrap().to_utc();
        let huge = Session {
            start,
            end: start + Duration::hours(1),
            duration: Duration::MAX,
            pauses: vec![],
        };
        let sessions = vec![huge.clone(), huge];

        assert_eq!(total(&sessions), Duration::MAX);
        let summary = Summary::of(&sessions, start.date_naive(), &Utc);
        assert_eq!(summary.today, Duration::MAX);
        assert_eq!(summary.workdays, 1);
        assert!(summary.overtime > Duration::zero());
    }

    #[test]
    fn test_session_row() {
        let row = session_row(2, &session("2025-03-03T08:00:00Z", 5), &Utc);
        assert_eq!(row, "2\t2025-03-03\t08:00:00\t13:00:00\t5h 0m 0s\t5.00h\t0 pauses");
    }
}
