//! In-memory tracking of the session currently being worked on.
//!
//! [SessionTracker] is a small state machine: Idle, Running or Paused. Every operation receives
//! the current time from the caller, so the tracker itself never reads a clock and never does
//! I/O. Calls that don't apply to the current state are ignored.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, trace};

use crate::{
    storage::entities::{Pause, Session},
    utils::time::non_negative,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackerState {
    Idle,
    Running,
    Paused,
}

/// Work interval that hasn't been finished yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    start: DateTime<Utc>,
    /// Closed pauses only. The open one lives in `pause_start`.
    pauses: Vec<Pause>,
    pause_start: Option<DateTime<Utc>>,
    total_pause_time: Duration,
}

impl ActiveSession {
    fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            pauses: vec![],
            pause_start: None,
            total_pause_time: Duration::zero(),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn is_paused(&self) -> bool {
        self.pause_start.is_some()
    }

    /// `now - start - closed pauses - open pause`. The open pause ends at `now`, so while paused
    /// this is the time worked up to `pause_start`.
    fn worked(&self, now: DateTime<Utc>) -> Duration {
        let until = self.pause_start.unwrap_or(now);
        non_negative(until - self.start - self.total_pause_time)
    }

    /// Latest instant already recorded in this session. Incoming timestamps never go below it.
    fn latest(&self) -> DateTime<Utc> {
        let last_pause_end = self.pauses.last().map(|pause| pause.end);
        self.start
            .max(self.pause_start.unwrap_or(self.start))
            .max(last_pause_end.unwrap_or(self.start))
    }

    fn close_pause(&mut self, now: DateTime<Utc>) {
        let now = now.max(self.latest());
        if let Some(pause_start) = self.pause_start.take() {
            let pause = Pause::between(pause_start, now);
            self.total_pause_time += pause.duration;
            self.pauses.push(pause);
        }
    }
}

/// Point-in-time view of the tracker, as shown in the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSession {
    pub active: bool,
    pub is_paused: bool,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub start: Option<DateTime<Utc>>,
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i64(duration.num_milliseconds())
}

/// Owns the single active session, if any.
#[derive(Debug, Default)]
pub struct SessionTracker {
    active: Option<ActiveSession>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TrackerState {
        match &self.active {
            None => TrackerState::Idle,
            Some(active) if active.is_paused() => TrackerState::Paused,
            Some(_) => TrackerState::Running,
        }
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    /// Begins a session. Returns false when one is already running or paused; it is left as is.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.active.is_some() {
            trace!("Start ignored, session already active");
            return false;
        }
        debug!("Starting session at {now}");
        self.active = Some(ActiveSession::new(now));
        true
    }

    /// Opens a pause. Only applies while running.
    pub fn pause(&mut self, now: DateTime<Utc>) -> bool {
        match &mut self.active {
            Some(active) if !active.is_paused() => {
                let now = now.max(active.latest());
                debug!("Pausing session at {now}");
                active.pause_start = Some(now);
                true
            }
            _ => {
                trace!("Pause ignored, no running session");
                false
            }
        }
    }

    /// Closes the open pause. Only applies while paused.
    pub fn resume(&mut self, now: DateTime<Utc>) -> bool {
        match &mut self.active {
            Some(active) if active.is_paused() => {
                debug!("Resuming session at {now}");
                active.close_pause(now);
                true
            }
            _ => {
                trace!("Resume ignored, no paused session");
                false
            }
        }
    }

    /// Finishes the active session. An open pause is closed at `now` first. Returns `None` when
    /// idle.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<Session> {
        let mut active = self.active.take()?;
        active.close_pause(now);

        let end = now.max(active.latest());
        let duration = active.worked(end);
        debug!("Stopping session started at {}, worked {duration}", active.start);

        Some(Session {
            start: active.start,
            end,
            duration,
            pauses: active.pauses,
        })
    }

    /// Worked time of the active session at `now`, zero when idle. Never negative.
    pub fn current_duration(&self, now: DateTime<Utc>) -> Duration {
        self.active
            .as_ref()
            .map_or(Duration::zero(), |active| active.worked(now))
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> CurrentSession {
        CurrentSession {
            active: self.active.is_some(),
            is_paused: self.active.as_ref().is_some_and(ActiveSession::is_paused),
            duration: self.current_duration(now),
            start: self.active.as_ref().map(ActiveSession::start),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use crate::storage::entities::Pause;

    use super::{SessionTracker, TrackerState};

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn test_session_with_one_pause() {
        let mut tracker = SessionTracker::new();

        assert!(tracker.start(at(0)));
        assert!(tracker.pause(at(5_000)));
        assert!(tracker.resume(at(8_000)));
        let session = tracker.stop(at(10_000)).unwrap();

        assert_eq!(session.start, at(0));
        assert_eq!(session.end, at(10_000));
        assert_eq!(session.pauses, vec![Pause::between(at(5_000), at(8_000))]);
        assert_eq!(session.pauses[0].duration, Duration::milliseconds(3_000));
        assert_eq!(session.duration, Duration::milliseconds(7_000));
        assert_eq!(tracker.state(), TrackerState::Idle);
    }

    #[test]
    fn test_stop_while_idle() {
        let mut tracker = SessionTracker::new();
        assert!(tracker.stop(at(1_000)).is_none());
        assert_eq!(tracker.state(), TrackerState::Idle);
    }

    #[test]
    fn test_stop_while_paused_closes_pause() {
        let mut tracker = SessionTracker::new();
        tracker.start(at(0));
        tracker.pause(at(4_000));

        let session = tracker.stop(at(9_000)).unwrap();

        assert_eq!(session.pauses, vec![Pause::between(at(4_000), at(9_000))]);
        assert_eq!(session.duration, Duration::milliseconds(4_000));
        assert_eq!(session.end, at(9_000));
    }

    #[test]
    fn test_start_while_active_is_ignored() {
        let mut tracker = SessionTracker::new();
        tracker.start(at(0));
        tracker.pause(at(1_000));
        let before = tracker.active().cloned();

        assert!(!tracker.start(at(2_000)));

        assert_eq!(tracker.active().cloned(), before);
        assert_eq!(tracker.state(), TrackerState::Paused);

        tracker.resume(at(3_000));
        let before = tracker.active().cloned();
        assert!(!tracker.start(at(4_000)));
        assert_eq!(tracker.active().cloned(), before);
    }

    #[test]
    fn test_wrong_state_transitions_are_ignored() {
        let mut tracker = SessionTracker::new();
        assert!(!tracker.pause(at(0)));
        assert!(!tracker.resume(at(0)));
        assert_eq!(tracker.state(), TrackerState::Idle);

        tracker.start(at(0));
        assert!(!tracker.resume(at(1_000)));
        assert_eq!(tracker.state(), TrackerState::Running);

        tracker.pause(at(2_000));
        let before = tracker.active().cloned();
        assert!(!tracker.pause(at(3_000)));
        assert_eq!(tracker.active().cloned(), before);
    }

    #[test]
    fn test_duration_grows_while_running_and_holds_while_paused() {
        let mut tracker = SessionTracker::new();
        assert_eq!(tracker.current_duration(at(500)), Duration::zero());

        tracker.start(at(1_000));
        let mut previous = Duration::zero();
        for t in (1_000..6_000).step_by(250) {
            let current = tracker.current_duration(at(t));
            assert!(current >= previous);
            previous = current;
        }

        tracker.pause(at(6_000));
        let frozen = tracker.current_duration(at(6_000));
        for t in (6_000..12_000).step_by(500) {
            assert_eq!(tracker.current_duration(at(t)), frozen);
        }

        tracker.resume(at(12_000));
        assert_eq!(
            tracker.current_duration(at(13_000)),
            frozen + Duration::milliseconds(1_000)
        );
    }

    #[test]
    fn test_duration_never_negative_when_clock_goes_back() {
        let mut tracker = SessionTracker::new();
        tracker.start(at(10_000));
        assert_eq!(tracker.current_duration(at(2_000)), Duration::zero());

        tracker.pause(at(12_000));
        assert_eq!(
            tracker.current_duration(at(11_000)),
            Duration::milliseconds(2_000)
        );

        tracker.resume(at(11_500));
        let session = tracker.stop(at(5_000)).unwrap();

        assert!(session.duration >= Duration::zero());
        assert!(session.end >= session.start);
        assert!(session.duration <= session.end - session.start);
        for pause in &session.pauses {
            assert!(pause.start <= pause.end);
            assert!(pause.start >= session.start && pause.end <= session.end);
        }
    }

    #[test]
    fn test_events_before_start_are_clamped() {
        let mut tracker = SessionTracker::new();
        tracker.start(at(10_000));
        tracker.pause(at(5_000));
        tracker.resume(at(6_000));
        let session = tracker.stop(at(7_000)).unwrap();

        assert_eq!(session.start, at(10_000));
        assert_eq!(session.end, at(10_000));
        assert_eq!(session.pauses, vec![Pause::between(at(10_000), at(10_000))]);
        assert_eq!(session.duration, Duration::zero());
    }

    #[test]
    fn test_finalized_duration_matches_pauses() {
        let mut tracker = SessionTracker::new();
        tracker.start(at(0));
        for i in 0..5 {
            tracker.pause(at(i * 10_000 + 3_000));
            tracker.resume(at(i * 10_000 + 7_000));
        }
        let session = tracker.stop(at(60_000)).unwrap();

        assert_eq!(session.pauses.len(), 5);
        assert_eq!(
            session.duration,
            session.end - session.start - session.total_pause_time()
        );
        assert!(session
            .pauses
            .windows(2)
            .all(|pair| pair[0].end <= pair[1].start));
    }

    #[test]
    fn test_snapshot() {
        let mut tracker = SessionTracker::new();
        let idle = tracker.snapshot(at(0));
        assert!(!idle.active);
        assert_eq!(idle.start, None);

        tracker.start(at(1_000));
        tracker.pause(at(3_000));
        let paused = tracker.snapshot(at(5_000));
        assert!(paused.active);
        assert!(paused.is_paused);
        assert_eq!(paused.duration, Duration::milliseconds(2_000));
        assert_eq!(paused.start, Some(at(1_000)));
    }
}
