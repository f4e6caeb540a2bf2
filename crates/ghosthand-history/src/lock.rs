//! Exclusive lock files shared by the file-backed stores.
//!
//! A lock is a sibling `<file>.lock` created with `create_new`, so at most
//! one holder exists across every process on the machine. It is removed on
//! drop. A lock older than `STALE_LOCK_AGE` belongs to a holder that died
//! and is broken.

use std::{
    ffi::OsString,
    fs::{self, OpenOptions},
    io::ErrorKind,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use tracing::warn;

use ghosthand_contracts::error::{GhosthandError, GhosthandResult};

/// How long `acquire` waits for another holder before giving up.
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);
const RETRY_START: Duration = Duration::from_millis(2);
const RETRY_MAX: Duration = Duration::from_millis(100);

pub(crate) struct FileLock<'a> {
    path: &'a Path,
}

impl<'a> FileLock<'a> {
    /// `<file>.lock` next to `file`.
    pub(crate) fn path_for(file: &Path) -> PathBuf {
        let mut name = OsString::from(file.as_os_str());
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Create the lock file at `path`, retrying with backoff while another
    /// holder has it.
    pub(crate) fn acquire(path: &'a Path) -> GhosthandResult<Self> {
        let deadline = Instant::now() + LOCK_TIMEOUT;
        let mut wait = RETRY_START;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(path) {
                        warn!(lock = %path.display(), "breaking stale lock");
                        let _ = fs::remove_file(path);
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(GhosthandError::store(format!(
                            "'{}' is held by another writer",
                            path.display()
                        )));
                    }
                    thread::sleep(wait);
                    wait = (wait * 2).min(RETRY_MAX);
                }
                Err(e) => {
                    return Err(GhosthandError::store(format!(
                        "cannot create lock '{}': {}",
                        path.display(),
                        e
                    )))
                }
            }
        }
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(self.path) {
            warn!(lock = %self.path.display(), error = %e, "could not release lock");
        }
    }
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_path_is_a_sibling() {
        assert_eq!(
            FileLock::path_for(Path::new("/tmp/ghosthand/history.jsonl")),
            PathBuf::from("/tmp/ghosthand/history.jsonl.lock")
        );
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.jsonl.lock");
        {
            let _lock = FileLock::acquire(&path).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
        FileLock::acquire(&path).unwrap();
    }
}
