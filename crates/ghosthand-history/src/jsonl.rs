//! JSON-lines file implementation of `HistoryStore`.
//!
//! One `HistoryEntry` per line, written with a single `write_all` on a file
//! opened in append mode. Several handles, in this process or others, may
//! share one file: each append takes an exclusive `<file>.lock` sibling,
//! re-reads the chain tip from the file, seals the entry against it, writes
//! and releases. Queries re-read the file.

use std::{
    fs::{self, OpenOptions},
    io::{BufRead, BufReader, ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::{debug, info, warn};

use ghosthand_contracts::{
    error::{GhosthandError, GhosthandResult},
    execution::RunRecord,
};
use ghosthand_core::traits::HistoryStore;

use crate::{
    chain::{verify_chain, ChainHead},
    entry::HistoryEntry,
    fuzzy,
    lock::FileLock,
};

/// A hash-chained history persisted as a JSON-lines file.
pub struct JsonlHistoryStore {
    path: PathBuf,
    lock_path: PathBuf,
    /// Serializes appends from this handle before they contend on the file lock.
    writer: Mutex<()>,
}

impl JsonlHistoryStore {
    /// Open (or create) the history file at `path`.
    ///
    /// Parent directories are created as needed. Returns `StoreUnavailable`
    /// when the file cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> GhosthandResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                GhosthandError::store(format!("cannot create '{}': {}", parent.display(), e))
            })?;
        }

        let entries = read_entries(&path, false)?;
        info!(path = %path.display(), entries = entries.len(), "history store opened");

        Ok(Self {
            lock_path: FileLock::path_for(&path),
            path,
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every readable entry in file order. Corrupt lines are skipped.
    pub fn entries(&self) -> GhosthandResult<Vec<HistoryEntry>> {
        read_entries(&self.path, false)
    }

    /// Re-read the whole file and verify the chain. Any unparseable line is
    /// an integrity failure.
    pub fn verify_integrity(&self) -> GhosthandResult<()> {
        verify_chain(&read_entries(&self.path, true)?)
    }
}

/// Load entries from `path`. A missing file is an empty history.
fn read_entries(path: &Path, strict: bool) -> GhosthandResult<Vec<HistoryEntry>> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(GhosthandError::store(format!(
                "cannot read '{}': {}",
                path.display(),
                e
            )))
        }
    };

    let mut entries = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| {
            GhosthandError::store(format!("cannot read '{}': {}", path.display(), e))
        })?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<HistoryEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) if strict => {
                return Err(GhosthandError::IntegrityFailure {
                    reason: format!("line {} is not a history entry: {}", number + 1, e),
                })
            }
            Err(e) => warn!(
                path = %path.display(),
                line = number + 1,
                error = %e,
                "skipping corrupt history line"
            ),
        }
    }
    Ok(entries)
}

impl HistoryStore for JsonlHistoryStore {
    fn append(&self, record: &RunRecord) -> GhosthandResult<()> {
        let _writer = self
            .writer
            .lock()
            .map_err(|e| GhosthandError::store(format!("history lock poisoned: {}", e)))?;
        let _lock = FileLock::acquire(&self.lock_path)?;

        // Another handle may have appended since this one last looked.
        let head = ChainHead::after(&read_entries(&self.path, false)?);
        let entry = head.seal(record)?;
        let mut line = serde_json::to_string(&entry)
            .map_err(|e| GhosthandError::store(format!("cannot encode history entry: {}", e)))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                GhosthandError::store(format!("cannot open '{}': {}", self.path.display(), e))
            })?;
        file.write_all(line.as_bytes()).map_err(|e| {
            GhosthandError::store(format!("cannot write '{}': {}", self.path.display(), e))
        })?;

        debug!(sequence = entry.sequence, run_id = %record.run_id.0, "history entry appended");
        Ok(())
    }

    fn query_by_user(&self, user: &str) -> GhosthandResult<Vec<RunRecord>> {
        Ok(fuzzy::by_user(&self.entries()?, user))
    }

    fn fuzzy_match(
        &self,
        goal_text: &str,
        user: &str,
        threshold: f64,
    ) -> GhosthandResult<Vec<RunRecord>> {
        Ok(fuzzy::rank(&self.entries()?, goal_text, user, threshold))
    }

    fn list_users(&self) -> GhosthandResult<Vec<String>> {
        Ok(fuzzy::users(&self.entries()?))
    }
}
