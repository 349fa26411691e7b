use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
};

use fs4::tokio::AsyncFileExt;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, warn};

/// Path next to `path` with `suffix` appended to the file name. `timetracker.json` with `.tmp`
/// becomes `timetracker.json.tmp`.
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|v| v.to_os_string())
        .unwrap_or_else(OsString::new);
    name.push(suffix);
    path.with_file_name(name)
}

/// Creates the parent directory of `path` (and its ancestors) when it is missing.
pub async fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent).await,
        _ => Ok(()),
    }
}

/// Replaces the content of `path` so that a crash at any point leaves either the old or the new
/// content on disk, never a truncated file.
///
/// The data goes to a temporary file in the same directory first, which is then renamed over
/// `path`. Renames within one directory are atomic on every platform we support.
pub async fn write_atomically(path: &Path, contents: &[u8]) -> io::Result<()> {
    async fn write_and_rename(tmp: &Path, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut file = File::create(tmp).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(tmp, path).await
    }

    ensure_parent(path).await?;
    let tmp = sibling_path(path, ".tmp");
    let result = write_and_rename(&tmp, path, contents).await;
    if result.is_err() {
        // Best effort, the write error is what matters.
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}

/// Copies `from` to `to`, logging instead of failing. Returns the destination when the copy
/// succeeded.
pub async fn copy_best_effort(from: &Path, to: &Path) -> Option<PathBuf> {
    match tokio::fs::copy(from, to).await {
        Ok(_) => {
            debug!("Copied {from:?} to {to:?}");
            Some(to.to_path_buf())
        }
        Err(e) => {
            warn!("Failed to copy {from:?} to {to:?}: {e}");
            None
        }
    }
}

/// Advisory lock held for the duration of a read-modify-write on the data file. It keeps a CLI
/// edit from interleaving with a running host.
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    pub async fn exclusive(path: &Path) -> io::Result<Self> {
        ensure_parent(path).await?;
        let file = File::options()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .open(path)
            .await?;
        file.lock_exclusive()?;
        debug!("Acquired lock {path:?}");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub async fn release(self) -> io::Result<()> {
        self.file.unlock_async().await?;
        debug!("Released lock {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use super::{copy_best_effort, sibling_path, write_atomically, FileLock};

    #[test]
    fn test_sibling_path() {
        let path = std::path::Path::new("/data/timetracker.json");
        assert_eq!(
            sibling_path(path, ".backup"),
            std::path::PathBuf::from("/data/timetracker.json.backup")
        );
    }

    #[tokio::test]
    async fn test_write_atomically_creates_directories() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested/deeper/file.json");

        write_atomically(&path, b"first").await?;
        write_atomically(&path, b"second").await?;

        assert_eq!(tokio::fs::read_to_string(&path).await?, "second");
        assert!(!sibling_path(&path, ".tmp").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_write_atomically_keeps_old_content_on_failure() -> Result<()> {
        let dir = tempdir()?;
        // A directory in place of the target makes the final rename fail.
        let path = dir.path().join("target");
        std::fs::create_dir(&path)?;
        std::fs::write(path.join("inner"), "kept")?;

        assert!(write_atomically(&path, b"new").await.is_err());

        assert_eq!(std::fs::read_to_string(path.join("inner"))?, "kept");
        assert!(!sibling_path(&path, ".tmp").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_copy_best_effort_missing_source() -> Result<()> {
        let dir = tempdir()?;
        let copied = copy_best_effort(&dir.path().join("nope"), &dir.path().join("copy")).await;
        assert!(copied.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_lock_can_be_reacquired() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("store.lock");
        FileLock::exclusive(&path).await?.release().await?;
        FileLock::exclusive(&path).await?.release().await?;
        Ok(())
    }
}
