use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::{debug, info, instrument, warn};

use crate::{
    fs::operations::{copy_best_effort, sibling_path, write_atomically, FileLock},
    utils::clock::Clock,
};

use super::{
    entities::{Session, Settings, Store},
    error::StoreError,
};

pub const DATA_FILE: &str = "timetracker.json";
pub const BACKUP_DIR: &str = "backups";
const LOCK_FILE: &str = "timetracker.lock";

/// Locations of everything the store owns.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub data_file: PathBuf,
    pub backup_dir: PathBuf,
    pub lock_file: PathBuf,
}

impl StorePaths {
    /// Standard layout inside an application directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            data_file: dir.join(DATA_FILE),
            backup_dir: dir.join(BACKUP_DIR),
            lock_file: dir.join(LOCK_FILE),
        }
    }

    /// Where an unreadable data file is preserved before it gets replaced.
    pub fn corrupt_copy(&self) -> PathBuf {
        sibling_path(&self.data_file, ".backup")
    }
}

/// How [SessionStore::load_checked] obtained its result.
#[derive(Debug)]
pub enum LoadStatus {
    Existing,
    /// No data file yet. The default store was returned.
    Missing,
    /// The data file could not be used. The default store was returned and the original file
    /// was copied to `backup` when possible.
    Recovered {
        error: StoreError,
        backup: Option<PathBuf>,
    },
    /// Reading the data file failed, e.g. because of a permission or I/O error. The default store
    /// was returned and the file was left alone. Changes are refused until it can be read.
    Unreadable(StoreError),
}

#[derive(Debug)]
pub struct Loaded {
    pub store: Store,
    pub status: LoadStatus,
}

/// Durable log of finished sessions plus settings.
///
/// Operations are meant to be awaited one after another. Read-modify-write helpers take an
/// advisory lock so another process using the same directory can't interleave with them, but
/// there's no queue inside the store itself.
pub struct SessionStore {
    paths: StorePaths,
    pub(super) clock: Box<dyn Clock>,
}

impl SessionStore {
    pub fn new(paths: StorePaths, clock: Box<dyn Clock>) -> Self {
        Self { paths, clock }
    }

    pub fn in_dir(dir: &Path, clock: Box<dyn Clock>) -> Self {
        Self::new(StorePaths::in_dir(dir), clock)
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Reads the data file. Never fails: a missing or unreadable file gives the default store, a
    /// corrupt one is copied aside and also gives the default store.
    pub async fn load(&self) -> Store {
        self.load_checked().await.store
    }

    /// Same as [Self::load], but tells how the result was obtained.
    #[instrument(skip(self), fields(path = ?self.paths.data_file))]
    pub async fn load_checked(&self) -> Loaded {
        let path = &self.paths.data_file;
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No data file yet");
                return Loaded {
                    store: Store::default(),
                    status: LoadStatus::Missing,
                };
            }
            Err(source) => {
                let error = StoreError::ReadFailure {
                    path: path.clone(),
                    source,
                };
                warn!("{error}. Using an empty store without touching the file");
                return Loaded {
                    store: Store::default(),
                    status: LoadStatus::Unreadable(error),
                };
            }
        };

        match serde_json::from_str::<Store>(&text) {
            Ok(store) => Loaded {
                store,
                status: LoadStatus::Existing,
            },
            Err(e) => {
                self.recover(StoreError::ReadCorrupt {
                    path: path.clone(),
                    reason: e.to_string(),
                })
                .await
            }
        }
    }

    async fn recover(&self, error: StoreError) -> Loaded {
        warn!("{error}. Falling back to an empty store");
        let backup = copy_best_effort(&self.paths.data_file, &self.paths.corrupt_copy()).await;
        if let Some(backup) = &backup {
            info!("Unreadable data file preserved at {backup:?}");
        }
        Loaded {
            store: Store::default(),
            status: LoadStatus::Recovered { error, backup },
        }
    }

    /// Writes the whole document. Missing directories are created. On failure the previous file
    /// content stays intact.
    #[instrument(skip_all, fields(path = ?self.paths.data_file, sessions = store.sessions.len()))]
    pub async fn save(&self, store: &Store) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(store)?;
        write_atomically(&self.paths.data_file, contents.as_bytes())
            .await
            .map_err(|source| StoreError::WriteFailure {
                path: self.paths.data_file.clone(),
                source,
            })?;
        debug!("Saved store");
        Ok(())
    }

    /// Adds a finished session at the end.
    pub async fn append(&self, session: Session) -> Result<Store, StoreError> {
        self.modify(|store| {
            store.sessions.push(session);
            Ok(())
        })
        .await
        .map(|(store, _)| store)
    }

    /// Removes the session at `index` of the most recent load and returns it.
    pub async fn delete_at(&self, index: usize) -> Result<Session, StoreError> {
        self.modify(|store| {
            check_index(store, index)?;
            Ok(store.sessions.remove(index))
        })
        .await
        .map(|(_, removed)| removed)
    }

    /// Replaces the session at `index` of the most recent load.
    pub async fn replace_at(&self, index: usize, session: Session) -> Result<Store, StoreError> {
        self.modify(|store| {
            check_index(store, index)?;
            store.sessions[index] = session;
            Ok(())
        })
        .await
        .map(|(store, _)| store)
    }

    /// Replaces the settings, keeping the sessions.
    pub async fn update_settings(
        &self,
        change: impl FnOnce(&mut Settings),
    ) -> Result<Store, StoreError> {
        self.modify(|store| {
            change(&mut store.settings);
            Ok(())
        })
        .await
        .map(|(store, _)| store)
    }

    /// Loads the store as the base of a change. Fails when saving the change could destroy data
    /// that wasn't read: an unreadable file, or a corrupt one that couldn't be copied aside.
    async fn load_for_change(&self) -> Result<Store, StoreError> {
        let loaded = self.load_checked().await;
        match loaded.status {
            LoadStatus::Existing | LoadStatus::Missing => Ok(loaded.store),
            LoadStatus::Recovered {
                backup: Some(_), ..
            } => Ok(loaded.store),
            LoadStatus::Recovered { error, backup: None } | LoadStatus::Unreadable(error) => {
                Err(error)
            }
        }
    }

    async fn modify<T>(
        &self,
        change: impl FnOnce(&mut Store) -> Result<T, StoreError>,
    ) -> Result<(Store, T), StoreError> {
        let lock = FileLock::exclusive(&self.paths.lock_file)
            .await
            .inspect_err(|e| warn!("Continuing without store lock: {e}"))
            .ok();

        let result = async {
            let mut store = self.load_for_change().await?;
            let value = change(&mut store)?;
            self.save(&store).await?;
            Ok::<_, StoreError>((store, value))
        }
        .await;

        if let Some(lock) = lock {
            if let Err(e) = lock.release().await {
                warn!("Failed to release store lock: {e}");
            }
        }
        result
    }
}

fn check_index(store: &Store, index: usize) -> Result<(), StoreError> {
    if index < store.sessions.len() {
        Ok(())
    } else {
        Err(StoreError::NoSuchSession {
            index,
            len: store.sessions.len(),
        })
    }
}
