use std::{fmt::Display, io::Write};

use chrono::TimeZone;

use crate::{storage::entities::Session, utils::time::as_hours};

pub const CSV_HEADER: &str = "Datum,Start,Ende,Dauer (Stunden),Pausen";

/// Writes sessions as CSV with German date and time formats. Pauses are exported as a count.
pub fn write_csv<Tz: TimeZone>(
    sessions: &[Session],
    tz: &Tz,
    mut out: impl Write,
) -> std::io::Result<()>
where
    Tz::Offset: Display,
{
    writeln!(out, "{CSV_HEADER}")?;
    for session in sessions {
        let start = session.start.with_timezone(tz);
        let end = session.end.with_timezone(tz);
        writeln!(
            out,
            "{},{},{},{:.2},{}",
            start.format("%d.%m.%Y"),
            start.format("%H:%M:%S"),
            end.format("%H:%M:%S"),
            as_hours(session.duration),
            session.pauses.len()
        )?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{DateTime, Duration, Utc};

    use crate::storage::entities::{Pause, Session};

    use super::write_csv;

    #[test]
    fn test_csv_export() -> Result<()> {
        let start = DateTime::parse_from_rfc3339("2025-03-03T08:00:00Z")?.to_utc();
        let sessions = vec![
            Session {
                start,
                end: start + Duration::hours(9),
                duration: Duration::hours(8) + Duration::minutes(20),
                pauses: vec![
                    Pause::between(start + Duration::hours(3), start + Duration::minutes(200)),
                    Pause::between(start + Duration::hours(5), start + Duration::minutes(320)),
                ],
            },
            Session::without_pauses(
                start + Duration::days(1),
                start + Duration::days(1) + Duration::minutes(45),
            ),
        ];

        let mut out = Vec::new();
        write_csv(&sessions, &Utc, &mut out)?;

        assert_eq!(
            String::from_utf8(out)?,
            "Datum,Start,Ende,Dauer (Stunden),Pausen\n\
             03.03.2025,08:00:00,17:00:00,8.33,2\n\
             04.03.2025,08:00:00,08:45:00,0.75,0\n"
        );
        Ok(())
    }

    #[test]
    fn test_csv_export_empty() -> Result<()> {
        let mut out = Vec::new();
        write_csv(&[], &Utc, &mut out)?;
        assert_eq!(String::from_utf8(out)?, "Datum,Start,Ende,Dauer (Stunden),Pausen\n");
        Ok(())
    }
}
