use std::{io::ErrorKind, path::PathBuf};

use chrono::{DateTime, Duration, Utc};
use tokio_stream::{wrappers::ReadDirStream, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::{fs::operations::write_atomically, utils::time::date_to_backup_name};

use super::{
    error::StoreError,
    session_store::{LoadStatus, SessionStore},
};

/// How long daily backups are kept.
pub const BACKUP_RETENTION: Duration = Duration::days(30);

#[derive(Debug)]
pub enum BackupOutcome {
    Created(PathBuf),
    /// Today's backup was written earlier. Backups are taken at most once per day.
    AlreadyExists(PathBuf),
    Failed(StoreError),
}

#[derive(Debug, Default)]
pub struct PruneReport {
    pub removed: Vec<PathBuf>,
    /// Files that couldn't be inspected or deleted. They are left in place.
    pub failures: Vec<StoreError>,
}

#[derive(Debug)]
pub struct BackupReport {
    pub outcome: BackupOutcome,
    pub pruned: PruneReport,
}

impl SessionStore {
    /// Writes `backups/backup-<local date>.json` unless it already exists, then removes backups
    /// past [BACKUP_RETENTION].
    #[instrument(skip(self))]
    pub async fn create_backup(&self) -> BackupReport {
        let outcome = self.write_daily_backup().await;
        match &outcome {
            BackupOutcome::Created(path) => info!("Created backup {path:?}"),
            BackupOutcome::AlreadyExists(path) => debug!("Backup {path:?} already exists"),
            BackupOutcome::Failed(e) => warn!("Backup failed: {e}"),
        }
        let pruned = self.prune_backups_older_than(BACKUP_RETENTION).await;
        BackupReport { outcome, pruned }
    }

    async fn write_daily_backup(&self) -> BackupOutcome {
        let path = self
            .paths()
            .backup_dir
            .join(date_to_backup_name(self.clock.local_date()));

        match tokio::fs::try_exists(&path).await {
            Ok(true) => return BackupOutcome::AlreadyExists(path),
            Ok(false) => {}
            Err(source) => return BackupOutcome::Failed(StoreError::BackupIo { path, source }),
        }

        let loaded = self.load_checked().await;
        if let LoadStatus::Unreadable(error) = loaded.status {
            return BackupOutcome::Failed(error);
        }
        let contents = match serde_json::to_vec_pretty(&loaded.store) {
            Ok(v) => v,
            Err(e) => return BackupOutcome::Failed(e.into()),
        };
        match write_atomically(&path, &contents).await {
            Ok(()) => BackupOutcome::Created(path),
            Err(source) => BackupOutcome::Failed(StoreError::BackupIo { path, source }),
        }
    }

    /// Deletes every file in the backup directory last modified before `now - retention`.
    /// A file that can't be removed is logged and skipped.
    #[instrument(skip(self))]
    pub async fn prune_backups_older_than(&self, retention: Duration) -> PruneReport {
        let mut report = PruneReport::default();
        let dir = &self.paths().backup_dir;
        let threshold = self.clock.time() - retention;

        let entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return report,
            Err(source) => {
                warn!("Can't list backups in {dir:?}: {source}");
                report.failures.push(StoreError::BackupIo {
                    path: dir.clone(),
                    source,
                });
                return report;
            }
        };

        let mut entries = ReadDirStream::new(entries);
        while let Some(entry) = entries.next().await {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    warn!("Can't read backup entry: {source}");
                    report.failures.push(StoreError::BackupIo {
                        path: dir.clone(),
                        source,
                    });
                    continue;
                }
            };
            let path = entry.path();

            let modified = match entry.metadata().await {
                Ok(metadata) if !metadata.is_file() => continue,
                Ok(metadata) => metadata.modified(),
                Err(e) => Err(e),
            };
            let modified: DateTime<Utc> = match modified {
                Ok(v) => v.into(),
                Err(source) => {
                    warn!("Can't read modification time of {path:?}: {source}");
                    report.failures.push(StoreError::BackupIo { path, source });
                    continue;
                }
            };

            if modified >= threshold {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    info!("Removed expired backup {path:?}");
                    report.removed.push(path);
                }
                Err(source) => {
                    warn!("Failed to remove expired backup {path:?}: {source}");
                    report.failures.push(StoreError::BackupIo { path, source });
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        path::Path,
        time::{Duration as StdDuration, SystemTime},
    };

    use anyhow::Result;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tempfile::tempdir;

    use crate::{
        storage::{entities::Session, error::StoreError, session_store::SessionStore},
        utils::{
            clock::{DefaultClock, ManualClock},
            logging::TEST_LOGGING,
        },
    };

    use super::{BackupOutcome, BACKUP_RETENTION};

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    const DAY: StdDuration = StdDuration::from_secs(24 * 60 * 60);

    fn age_file(path: &Path, age: StdDuration) -> Result<()> {
        let file = fs::File::options().write(true).open(path)?;
        file.set_modified(SystemTime::now() - age)?;
        Ok(())
    }

    fn noon() -> ManualClock {
        ManualClock::at(Utc.from_utc_datetime(
            &(TEST_START_DATE + chrono::Duration::hours(12)),
        ))
    }

    #[tokio::test]
    async fn test_backup_once_per_day() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let clock = noon();
        let store = SessionStore::in_dir(dir.path(), Box::new(clock.clone()));
        store
            .append(Session::without_pauses(
                DateTime::from_timestamp_millis(0).unwrap(),
                DateTime::from_timestamp_millis(1_000).unwrap(),
            ))
            .await?;

        let first = store.create_backup().await;
        let second = store.create_backup().await;

        let BackupOutcome::Created(created) = first.outcome else {
            panic!("First backup of the day should be written");
        };
        assert!(matches!(second.outcome, BackupOutcome::AlreadyExists(ref p) if *p == created));

        let files = fs::read_dir(&store.paths().backup_dir)?.collect::<Vec<_>>();
        assert_eq!(files.len(), 1);

        let backed_up: crate::storage::entities::Store =
            serde_json::from_str(&fs::read_to_string(&created)?)?;
        assert_eq!(backed_up, store.load().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_backup_next_day_creates_new_file() -> Result<()> {
        let dir = tempdir()?;
        let clock = noon();
        let store = SessionStore::in_dir(dir.path(), Box::new(clock.clone()));

        store.create_backup().await;
        clock.advance(chrono::Duration::days(1));
        let next = store.create_backup().await;

        assert!(matches!(next.outcome, BackupOutcome::Created(_)));
        assert_eq!(fs::read_dir(&store.paths().backup_dir)?.count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_backup_of_unreadable_data_file_fails() -> Result<()> {
        let dir = tempdir()?;
        let store = SessionStore::in_dir(dir.path(), Box::new(noon()));
        fs::create_dir(&store.paths().data_file)?;

        let report = store.create_backup().await;

        assert!(matches!(
            report.outcome,
            BackupOutcome::Failed(StoreError::ReadFailure { .. })
        ));
        assert!(!store.paths().backup_dir.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_prune_respects_retention() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let store = SessionStore::in_dir(dir.path(), Box::new(DefaultClock));
        let backups = &store.paths().backup_dir;
        fs::create_dir_all(backups)?;

        let old = backups.join("backup-old.json");
        let recent = backups.join("backup-recent.json");
        fs::write(&old, "{}")?;
        fs::write(&recent, "{}")?;
        age_file(&old, DAY * 31)?;
        age_file(&recent, DAY * 29)?;

        let report = store.prune_backups_older_than(BACKUP_RETENTION).await;

        assert_eq!(report.removed, vec![old.clone()]);
        assert!(report.failures.is_empty());
        assert!(!old.exists());
        assert!(recent.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_prune_without_backup_dir() -> Result<()> {
        let dir = tempdir()?;
        let store = SessionStore::in_dir(dir.path(), Box::new(DefaultClock));

        let report = store.prune_backups_older_than(BACKUP_RETENTION).await;

        assert!(report.removed.is_empty());
        assert!(report.failures.is_empty());
        Ok(())
    }
}
