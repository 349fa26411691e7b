use std::time::Duration;

use anyhow::Result;
use tokio::{sync::Mutex, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::utils::clock::Clock;

use super::{controller::WorkController, notifier::Notifier};

pub const DISPLAY_INTERVAL: Duration = Duration::from_secs(1);
pub const BACKUP_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// The single repeating task of the host. Refreshes the status every [DISPLAY_INTERVAL] and
/// checks for the daily backup every [BACKUP_CHECK_INTERVAL]. Both stop together when `shutdown`
/// is cancelled.
pub struct Ticker<'a, N> {
    controller: &'a Mutex<WorkController<N>>,
    shutdown: CancellationToken,
    time_provider: Box<dyn Clock>,
    display_interval: Duration,
    backup_interval: Duration,
}

impl<'a, N: Notifier> Ticker<'a, N> {
    pub fn new(
        controller: &'a Mutex<WorkController<N>>,
        shutdown: CancellationToken,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            controller,
            shutdown,
            time_provider,
            display_interval: DISPLAY_INTERVAL,
            backup_interval: BACKUP_CHECK_INTERVAL,
        }
    }

    /// Executes the ticker loop.
    pub async fn run(self) -> Result<()> {
        let start = self.time_provider.instant();
        let mut next_display = start;
        let mut next_backup = start;
        loop {
            let now = self.time_provider.instant();

            if now >= next_backup {
                trace!("Backup tick");
                self.controller.lock().await.check_backup().await;
                next_backup = next_after(next_backup, now, self.backup_interval);
            }
            if now >= next_display {
                self.controller.lock().await.refresh().await;
                next_display = next_after(next_display, now, self.display_interval);
            }

            tokio::select! {
                // Cancellation means the ticker is done. No tick runs after this point.
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(next_display.min(next_backup)) => ()
            }
        }
    }
}

/// Next scheduled point after `now`. Ticks missed while the machine was suspended are skipped
/// instead of being replayed.
fn next_after(mut scheduled: Instant, now: Instant, interval: Duration) -> Instant {
    while scheduled <= now {
        scheduled += interval;
    }
    scheduled
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
    use tempfile::tempdir;
    use tokio::{sync::Mutex, time::Instant};
    use tokio_util::sync::CancellationToken;

    use crate::{
        host::{controller::WorkController, notifier::MockNotifier},
        storage::session_store::SessionStore,
        utils::{clock::ManualClock, logging::TEST_LOGGING},
    };

    use super::{next_after, Ticker};

    #[test]
    fn test_next_after_skips_missed_ticks() {
        let start = Instant::now();
        let interval = Duration::from_secs(1);
        assert_eq!(next_after(start, start, interval), start + interval);
        assert_eq!(
            next_after(start, start + Duration::from_millis(4500), interval),
            start + Duration::from_secs(5)
        );
    }

    /// Runs the ticker for a few simulated seconds with a running session. The status has to be
    /// published once per second and the backup taken once.
    #[tokio::test(start_paused = true)]
    async fn smoke_test_ticker() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let date = NaiveDate::from_ymd_opt(2018, 7, 4).unwrap();
        let clock = ManualClock::at(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));

        let mut notifier = MockNotifier::new();
        // One publish for start, then one per refresh at 0..=5 seconds.
        notifier.expect_publish_status().times(6..=8).returning(|_| ());
        let mut controller = WorkController::new(
            SessionStore::in_dir(dir.path(), Box::new(clock.clone())),
            Box::new(clock.clone()),
            notifier,
            Default::default(),
        );
        controller.start_work();
        let controller = Mutex::new(controller);

        let shutdown = CancellationToken::new();
        let ticker = Ticker::new(&controller, shutdown.clone(), Box::new(clock.clone()));

        let (_, result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(5500)).await;
                shutdown.cancel()
            },
            ticker.run(),
        );
        result?;

        assert_eq!(std::fs::read_dir(dir.path().join("backups"))?.count(), 1);
        Ok(())
    }
}
