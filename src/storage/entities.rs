use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::time::saturating_sum;

/// One suspension within a session. `duration` is stored redundantly so the file stays readable
/// for people editing it by hand.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct Pause {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl Pause {
    /// Closes a pause. An `end` before `start` (clock went backwards) collapses to an empty pause.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let end = end.max(start);
        Self {
            start,
            end,
            duration: end - start,
        }
    }
}

/// A finished work interval.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct Session {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end: DateTime<Utc>,
    /// Worked time: `end - start` without the pauses.
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    #[serde(default)]
    pub pauses: Vec<Pause>,
}

impl Session {
    /// Builds a session without pauses, as used by manual corrections.
    pub fn without_pauses(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            duration: (end - start).max(Duration::zero()),
            pauses: vec![],
        }
    }

    pub fn total_pause_time(&self) -> Duration {
        saturating_sum(self.pauses.iter().map(|pause| pause.duration))
    }
}

/// Named options persisted next to the sessions. Unknown options are kept as they are so that
/// loading and saving never drops them.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    #[serde(rename = "notifyOnHour", default = "default_notify_on_hour")]
    pub notify_on_hour: bool,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

fn default_notify_on_hour() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notify_on_hour: default_notify_on_hour(),
            other: BTreeMap::new(),
        }
    }
}

/// The persisted document. Sessions keep append order; edits never re-sort them.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone, Default)]
pub struct Store {
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub settings: Settings,
}

mod duration_ms {
    use chrono::Duration;
    use serde::{self, de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_milliseconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = i64::deserialize(deserializer)?;
        Duration::try_milliseconds(ms)
            .ok_or_else(|| D::Error::custom(format!("duration of {ms}ms is out of range")))
    }
}
