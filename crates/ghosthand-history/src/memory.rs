//! In-memory implementation of `HistoryStore`.
//!
//! `InMemoryHistoryStore` keeps every entry in a `Vec` behind a `Mutex`.
//! It is the store used by tests and by short-lived embeddings that do not
//! need history to survive a restart.

use std::sync::{Arc, Mutex};

use tracing::debug;

use ghosthand_contracts::{
    error::{GhosthandError, GhosthandResult},
    execution::RunRecord,
};
use ghosthand_core::traits::HistoryStore;

use crate::{
    chain::{verify_chain, ChainHead},
    entry::HistoryEntry,
    fuzzy,
};

// ── Internal mutable state ────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct InMemoryState {
    /// All entries so far, in append order.
    pub(crate) entries: Vec<HistoryEntry>,
    pub(crate) head: ChainHead,
}

// ── Public store ──────────────────────────────────────────────────────────────

/// An append-only, hash-chained history held in memory.
///
/// Clones share the same underlying chain.
#[derive(Clone, Default)]
pub struct InMemoryHistoryStore {
    pub(crate) state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> GhosthandResult<std::sync::MutexGuard<'_, InMemoryState>> {
        self.state
            .lock()
            .map_err(|e| GhosthandError::store(format!("history state lock poisoned: {}", e)))
    }

    /// Every entry in chain order.
    pub fn entries(&self) -> GhosthandResult<Vec<HistoryEntry>> {
        Ok(self.lock()?.entries.clone())
    }

    /// Confirm the chain has not been tampered with.
    pub fn verify_integrity(&self) -> GhosthandResult<()> {
        verify_chain(&self.lock()?.entries)
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn append(&self, record: &RunRecord) -> GhosthandResult<()> {
        let mut state = self.lock()?;
        let entry = state.head.seal(record)?;
        state.head.advance(&entry);
        debug!(sequence = entry.sequence, run_id = %record.run_id.0, "history entry appended");
        state.entries.push(entry);
        Ok(())
    }

    fn query_by_user(&self, user: &str) -> GhosthandResult<Vec<RunRecord>> {
        Ok(fuzzy::by_user(&self.lock()?.entries, user))
    }

    fn fuzzy_match(
        &self,
        goal_text: &str,
        user: &str,
        threshold: f64,
    ) -> GhosthandResult<Vec<RunRecord>> {
        Ok(fuzzy::rank(&self.lock()?.entries, goal_text, user, threshold))
    }

    fn list_users(&self) -> GhosthandResult<Vec<String>> {
        Ok(fuzzy::users(&self.lock()?.entries))
    }
}
