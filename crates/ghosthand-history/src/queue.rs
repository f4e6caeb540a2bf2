//! Scheduled goals: a JSON-lines queue of goals to run at a later time,
//! optionally repeating every N minutes.
//!
//! The queue only stores and hands out goals; whoever calls
//! [`GoalQueue::take_due`] runs them through the normal goal path. Taking is
//! at-most-once: a due goal is removed (or rescheduled) under the lock
//! before it is returned, so two runners never both get it.

use std::{
    fs::{self, OpenOptions},
    io::{BufRead, BufReader, ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use ghosthand_contracts::error::{GhosthandError, GhosthandResult};

use crate::lock::FileLock;

/// One scheduled goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedGoal {
    pub id: Uuid,
    pub user: String,
    pub goal: String,
    pub due_at: DateTime<Utc>,
    /// Repeat interval. `None` runs the goal once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every_minutes: Option<u32>,
}

impl QueuedGoal {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }
}

/// A goal queue persisted as a JSON-lines file.
pub struct GoalQueue {
    path: PathBuf,
    lock_path: PathBuf,
    writer: Mutex<()>,
}

impl GoalQueue {
    /// Open (or create) the queue at `path`.
    pub fn open(path: impl Into<PathBuf>) -> GhosthandResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                GhosthandError::store(format!("cannot create '{}': {}", parent.display(), e))
            })?;
        }
        let pending = read_goals(&path)?.len();
        debug!(path = %path.display(), pending, "goal queue opened");
        Ok(Self {
            lock_path: FileLock::path_for(&path),
            path,
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Schedule `goal` for `user` at `due_at`.
    pub fn enqueue(
        &self,
        user: &str,
        goal: &str,
        due_at: DateTime<Utc>,
        every_minutes: Option<u32>,
    ) -> GhosthandResult<QueuedGoal> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(GhosthandError::ConfigError {
                reason: "cannot queue an empty goal".to_string(),
            });
        }
        if every_minutes == Some(0) {
            return Err(GhosthandError::ConfigError {
                reason: "repeat interval must be at least one minute".to_string(),
            });
        }

        let queued = QueuedGoal {
            id: Uuid::new_v4(),
            user: user.to_string(),
            goal: goal.to_string(),
            due_at,
            every_minutes,
        };
        let mut line = encode(&queued)?;
        line.push('\n');

        let _writer = self.serialize()?;
        let _lock = FileLock::acquire(&self.lock_path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_error("open", &self.path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| io_error("write", &self.path, e))?;

        info!(
            id = %queued.id,
            user = %user,
            due_at = %due_at,
            every_minutes = ?every_minutes,
            "goal queued"
        );
        Ok(queued)
    }

    /// Every queued goal, soonest first.
    pub fn pending(&self) -> GhosthandResult<Vec<QueuedGoal>> {
        let mut goals = read_goals(&self.path)?;
        goals.sort_by_key(|g| g.due_at);
        Ok(goals)
    }

    /// Remove and return every goal due at `now`, soonest first.
    ///
    /// Repeating goals stay queued with `due_at` moved to `now` plus their
    /// interval; the returned copy keeps the time it was due.
    pub fn take_due(&self, now: DateTime<Utc>) -> GhosthandResult<Vec<QueuedGoal>> {
        let _writer = self.serialize()?;
        let _lock = FileLock::acquire(&self.lock_path)?;

        let (mut due, waiting): (Vec<_>, Vec<_>) =
            read_goals(&self.path)?.into_iter().partition(|g| g.is_due(now));
        if due.is_empty() {
            return Ok(due);
        }
        due.sort_by_key(|g| g.due_at);

        let mut keep = waiting;
        for goal in &due {
            if let Some(every) = goal.every_minutes {
                let next = now + Duration::minutes(i64::from(every));
                debug!(id = %goal.id, next = %next, "repeating goal rescheduled");
                keep.push(QueuedGoal {
                    due_at: next,
                    ..goal.clone()
                });
            }
        }
        self.rewrite(&keep)?;

        info!(taken = due.len(), remaining = keep.len(), "due goals taken from queue");
        Ok(due)
    }

    /// Drop the goal with `id`. Returns false if it was not queued.
    pub fn remove(&self, id: Uuid) -> GhosthandResult<bool> {
        let _writer = self.serialize()?;
        let _lock = FileLock::acquire(&self.lock_path)?;

        let mut goals = read_goals(&self.path)?;
        let before = goals.len();
        goals.retain(|g| g.id != id);
        if goals.len() == before {
            return Ok(false);
        }
        self.rewrite(&goals)?;
        info!(id = %id, "queued goal removed");
        Ok(true)
    }

    fn serialize(&self) -> GhosthandResult<std::sync::MutexGuard<'_, ()>> {
        self.writer
            .lock()
            .map_err(|e| GhosthandError::store(format!("queue lock poisoned: {}", e)))
    }

    /// Replace the file contents with `goals`. Caller holds the lock.
    fn rewrite(&self, goals: &[QueuedGoal]) -> GhosthandResult<()> {
        let mut text = String::new();
        for goal in goals {
            text.push_str(&encode(goal)?);
            text.push('\n');
        }
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, text).map_err(|e| io_error("write", &staging, e))?;
        fs::rename(&staging, &self.path).map_err(|e| io_error("replace", &self.path, e))
    }
}

fn io_error(verb: &str, path: &Path, e: std::io::Error) -> GhosthandError {
    GhosthandError::store(format!("cannot {} '{}': {}", verb, path.display(), e))
}

fn encode(goal: &QueuedGoal) -> GhosthandResult<String> {
    serde_json::to_string(goal)
        .map_err(|e| GhosthandError::store(format!("cannot encode queued goal: {}", e)))
}

/// A missing file is an empty queue. Corrupt lines are skipped.
fn read_goals(path: &Path) -> GhosthandResult<Vec<QueuedGoal>> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error("read", path, e)),
    };

    let mut goals = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| io_error("read", path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<QueuedGoal>(&line) {
            Ok(goal) => goals.push(goal),
            Err(e) => warn!(
                path = %path.display(),
                line = number + 1,
                error = %e,
                "skipping corrupt queue line"
            ),
        }
    }
    Ok(goals)
}
