//! Repository lock
//!
//! Commands that add snapshots take a shared lock on `locks/repo.lock`;
//! commands that remove them take it exclusively. The lock is an advisory
//! `flock` and goes away with the file handle.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const LOCK_FILE: &str = "repo.lock";

/// How the repository is held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("cannot take {mode:?} lock: repository is held by {holder}")]
    Held { mode: LockMode, holder: String },
}

/// Lock file content, written by the most recent holder
#[derive(Debug, Serialize, Deserialize)]
struct LockContent {
    pid: u32,
    hostname: String,
    mode: LockMode,
    started_at: DateTime<Utc>,
}

/// A held repository lock; released on drop
pub struct RepoLock {
    path: PathBuf,
    mode: LockMode,
    #[allow(dead_code)]
    file: File,
}

impl RepoLock {
    /// Take a shared lock (appending snapshots)
    pub fn shared(locks_dir: &Path) -> Result<Self> {
        Self::acquire(locks_dir, LockMode::Shared)
    }

    /// Take an exclusive lock (removing snapshots)
    pub fn exclusive(locks_dir: &Path) -> Result<Self> {
        Self::acquire(locks_dir, LockMode::Exclusive)
    }

    fn acquire(locks_dir: &Path, mode: LockMode) -> Result<Self> {
        std::fs::create_dir_all(locks_dir).context("Failed to create locks directory")?;
        let path = locks_dir.join(LOCK_FILE);

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        if !try_flock(&file, mode)? {
            let holder = match read_lock_content(&mut file) {
                Ok(content) => format!("pid {} on {}", content.pid, content.hostname),
                Err(_) => "another process".to_string(),
            };
            return Err(LockError::Held { mode, holder }.into());
        }

        // Shared holders overwrite each other's record; it is informational only
        write_lock_content(&mut file, mode)?;
        tracing::debug!("Acquired {:?} lock on {}", mode, path.display());

        Ok(Self { path, mode, file })
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        tracing::debug!("Released {:?} lock on {}", self.mode, self.path.display());
    }
}

#[cfg(unix)]
fn try_flock(file: &File, mode: LockMode) -> Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    let arg = match mode {
        LockMode::Shared => FlockArg::LockSharedNonblock,
        LockMode::Exclusive => FlockArg::LockExclusiveNonblock,
    };

    match flock(file.as_raw_fd(), arg) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn write_lock_content(file: &mut File, mode: LockMode) -> Result<()> {
    let content = LockContent {
        pid: std::process::id(),
        hostname: crate::util::hostname(),
        mode,
        started_at: Utc::now(),
    };
    let serialized =
        serde_json::to_string(&content).context("Failed to serialize lock content")?;

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(serialized.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

fn read_lock_content(file: &mut File) -> Result<LockContent> {
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).context("Failed to deserialize lock content")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn shared_locks_coexist() -> Result<()> {
        let temp = TempDir::new()?;
        let first = RepoLock::shared(temp.path())?;
        let second = RepoLock::shared(temp.path())?;

        assert_eq!(first.mode(), LockMode::Shared);
        assert_eq!(second.mode(), LockMode::Shared);
        assert!(first.path().exists());
        Ok(())
    }

    #[test]
    fn exclusive_lock_excludes_shared() -> Result<()> {
        let temp = TempDir::new()?;
        let _held = RepoLock::exclusive(temp.path())?;

        let err = match RepoLock::shared(temp.path()) {
            Ok(_) => panic!("shared lock granted while exclusive lock held"),
            Err(e) => e,
        };
        assert!(matches!(
            err.downcast_ref::<LockError>(),
            Some(LockError::Held { mode: LockMode::Shared, .. })
        ));
        Ok(())
    }

    #[test]
    fn shared_lock_excludes_exclusive() -> Result<()> {
        let temp = TempDir::new()?;
        let _held = RepoLock::shared(temp.path())?;

        let err = match RepoLock::exclusive(temp.path()) {
            Ok(_) => panic!("exclusive lock granted while shared lock held"),
            Err(e) => e,
        };
        assert!(err.to_string().contains(&format!("pid {}", std::process::id())));
        Ok(())
    }

    #[test]
    fn drop_releases_lock() -> Result<()> {
        let temp = TempDir::new()?;
        drop(RepoLock::exclusive(temp.path())?);

        let again = RepoLock::exclusive(temp.path())?;
        assert_eq!(again.mode(), LockMode::Exclusive);
        Ok(())
    }

    #[test]
    fn lock_content_records_holder() -> Result<()> {
        let temp = TempDir::new()?;
        let lock = RepoLock::shared(temp.path())?;

        let mut file = File::open(lock.path())?;
        let content = read_lock_content(&mut file)?;
        assert_eq!(content.pid, std::process::id());
        assert_eq!(content.mode, LockMode::Shared);
        Ok(())
    }
}
