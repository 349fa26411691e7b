use chrono::{Duration, Local, NaiveDate};
use tracing::{debug, info, instrument, warn};

use crate::{
    report::total_on,
    storage::{
        backup::BackupReport,
        entities::{Session, Store},
        error::StoreError,
        session_store::{LoadStatus, SessionStore},
    },
    tracker::{CurrentSession, SessionTracker, TrackerState},
    utils::{
        clock::Clock,
        time::{format_duration, saturating_add},
    },
};

use super::notifier::Notifier;

const APP_TITLE: &str = "Stempeluhr";

#[derive(Debug, Clone, Copy)]
pub struct ControllerOptions {
    /// Finish and save a running session when the host shuts down instead of dropping it.
    pub stop_on_shutdown: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            stop_on_shutdown: true,
        }
    }
}

/// Total of stored sessions for one local day, cached so the per-second refresh doesn't read
/// the data file.
#[derive(Debug, Clone, Copy)]
struct StoredToday {
    date: NaiveDate,
    total: Duration,
}

/// Operations the user interface calls. Combines the tracker with the store, reads the clock and
/// reports storage failures through the [Notifier]. Nothing in here returns an error the host
/// has to stop for.
pub struct WorkController<N> {
    tracker: SessionTracker,
    store: SessionStore,
    clock: Box<dyn Clock>,
    notifier: N,
    options: ControllerOptions,
    notify_on_hour: bool,
    announced_hours: i64,
    stored_today: Option<StoredToday>,
    last_backup_day: Option<NaiveDate>,
}

impl<N: Notifier> WorkController<N> {
    pub fn new(
        store: SessionStore,
        clock: Box<dyn Clock>,
        notifier: N,
        options: ControllerOptions,
    ) -> Self {
        Self {
            tracker: SessionTracker::new(),
            store,
            clock,
            notifier,
            options,
            notify_on_hour: true,
            announced_hours: 0,
            stored_today: None,
            last_backup_day: None,
        }
    }

    /// Reads the store once so settings and today's total are known before the first tick.
    #[instrument(skip(self))]
    pub async fn init(&mut self) {
        let loaded = self.store.load_checked().await;
        match &loaded.status {
            LoadStatus::Existing => info!("Loaded {} sessions", loaded.store.sessions.len()),
            LoadStatus::Missing => info!("Starting with an empty store"),
            LoadStatus::Recovered { error, backup } => {
                warn!("Starting with an empty store, {error}. Copy kept at {backup:?}")
            }
            LoadStatus::Unreadable(error) => {
                warn!("Starting with an empty view of the store, {error}")
            }
        }
        self.remember(&loaded.store);
        self.publish();
    }

    pub fn start_work(&mut self) -> bool {
        let started = self.tracker.start(self.clock.time());
        if started {
            self.announced_hours = 0;
            self.publish();
        }
        started
    }

    pub fn pause_work(&mut self) -> bool {
        let paused = self.tracker.pause(self.clock.time());
        if paused {
            self.publish();
        }
        paused
    }

    pub fn resume_work(&mut self) -> bool {
        let resumed = self.tracker.resume(self.clock.time());
        if resumed {
            self.publish();
        }
        resumed
    }

    /// Finishes the active session and appends it to the store. Returns the finished session,
    /// even when saving it failed; the user is alerted in that case.
    pub async fn stop_work(&mut self) -> Option<Session> {
        let session = self.tracker.stop(self.clock.time())?;
        info!(
            "Finished session of {}",
            format_duration(session.duration)
        );
        match self.store.append(session.clone()).await {
            Ok(store) => self.remember(&store),
            Err(e) => self.report(&e),
        }
        self.publish();
        Some(session)
    }

    pub fn current_session(&self) -> CurrentSession {
        self.tracker.snapshot(self.clock.time())
    }

    pub fn state(&self) -> TrackerState {
        self.tracker.state()
    }

    pub async fn sessions(&self) -> Store {
        self.store.load().await
    }

    /// Stores a manually entered session, bypassing the tracker.
    pub async fn add_session(&mut self, session: Session) -> Result<Store, StoreError> {
        let result = self.store.append(session).await;
        self.after_edit(result)
    }

    pub async fn update_session(
        &mut self,
        index: usize,
        session: Session,
    ) -> Result<Store, StoreError> {
        let result = self.store.replace_at(index, session).await;
        self.after_edit(result)
    }

    pub async fn delete_session(&mut self, index: usize) -> Result<Session, StoreError> {
        match self.store.delete_at(index).await {
            Ok(removed) => {
                let store = self.store.load().await;
                self.remember(&store);
                self.publish();
                Ok(removed)
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }

    pub async fn set_notify_on_hour(&mut self, enabled: bool) -> Result<Store, StoreError> {
        let result = self
            .store
            .update_settings(|settings| settings.notify_on_hour = enabled)
            .await;
        self.after_edit(result)
    }

    /// Per-second work: redraw the status while running and announce every full hour.
    pub async fn refresh(&mut self) {
        if self.tracker.state() != TrackerState::Running {
            return;
        }
        if self
            .stored_today
            .is_some_and(|today| today.date != self.clock.local_date())
        {
            let store = self.store.load().await;
            self.remember(&store);
        }
        self.publish();
        self.announce_hours();
    }

    /// Per-minute work: take the daily backup once the local date differs from the last check.
    pub async fn check_backup(&mut self) {
        let today = self.clock.local_date();
        if self.last_backup_day == Some(today) {
            return;
        }
        debug!("Backup check for {today}");
        self.backup_now().await;
    }

    /// Takes today's backup if it's missing and prunes expired ones, regardless of the last check.
    pub async fn backup_now(&mut self) -> BackupReport {
        let report = self.store.create_backup().await;
        for failure in &report.pruned.failures {
            debug!("Skipped during prune: {failure}");
        }
        self.last_backup_day = Some(self.clock.local_date());
        report
    }

    /// Called once the host is stopping.
    pub async fn shutdown(&mut self) {
        if self.tracker.state() == TrackerState::Idle {
            return;
        }
        if self.options.stop_on_shutdown {
            info!("Saving active session before exit");
            self.stop_work().await;
        } else {
            warn!(
                "Discarding active session of {}",
                format_duration(self.tracker.current_duration(self.clock.time()))
            );
        }
    }

    /// Tray style status: `Running: 1h 2m 3s | Today: 5h 0m 0s`.
    pub fn status_line(&self) -> String {
        let now = self.clock.time();
        let current = self.tracker.current_duration(now);
        let headline = match self.tracker.state() {
            TrackerState::Idle => "Not started".to_string(),
            TrackerState::Running => format!("Running: {}", format_duration(current)),
            TrackerState::Paused => format!("Paused: {}", format_duration(current)),
        };
        let stored = self
            .stored_today
            .filter(|today| today.date == self.clock.local_date())
            .map_or(Duration::zero(), |today| today.total);
        format!("{headline} | Today: {}", format_duration(saturating_add(stored, current)))
    }

    fn publish(&self) {
        self.notifier.publish_status(&self.status_line());
    }

    fn announce_hours(&mut self) {
        if !self.notify_on_hour {
            return;
        }
        let hours = self
            .tracker
            .current_duration(self.clock.time())
            .num_hours();
        if hours > self.announced_hours {
            self.announced_hours = hours;
            let unit = if hours == 1 { "hour" } else { "hours" };
            self.notifier
                .notify(APP_TITLE, &format!("{hours} {unit} worked in this session"));
        }
    }

    fn after_edit(&mut self, result: Result<Store, StoreError>) -> Result<Store, StoreError> {
        match &result {
            Ok(store) => {
                self.remember(store);
                self.publish();
            }
            Err(e) => self.report(e),
        }
        result
    }

    fn remember(&mut self, store: &Store) {
        let date = self.clock.local_date();
        self.notify_on_hour = store.settings.notify_on_hour;
        self.stored_today = Some(StoredToday {
            date,
            total: total_on(&store.sessions, date, &Local),
        });
    }

    fn report(&self, error: &StoreError) {
        warn!("Store operation failed: {error}");
        if error.needs_alert() {
            self.notifier
                .alert(APP_TITLE, &format!("Your data could not be saved. {error}"));
        }
    }
}
