//! Hash-chain primitives: hashing, sealing and integrity verification.
//!
//! Hash input layout (bytes, in order):
//!   1. sequence as 8-byte little-endian
//!   2. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   3. canonical JSON of the record (serde_json, no pretty-printing)

use sha2::{Digest, Sha256};

use ghosthand_contracts::{
    error::{GhosthandError, GhosthandResult},
    execution::RunRecord,
};

use crate::entry::HistoryEntry;

/// Compute the SHA-256 hash for one history entry.
///
/// Returns a lowercase 64-character hex string.
pub fn hash_entry(sequence: u64, record: &RunRecord, prev_hash: &str) -> GhosthandResult<String> {
    let record_json = serde_json::to_vec(record).map_err(|e| GhosthandError::IntegrityFailure {
        reason: format!("run record could not be serialized: {}", e),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Verify a chain of entries in append order.
///
/// Checks sequence numbering, prev-hash linkage and that every `this_hash`
/// matches the value recomputed from the entry's own fields. An empty chain
/// is valid. The error names the first entry that breaks the chain.
pub fn verify_chain(entries: &[HistoryEntry]) -> GhosthandResult<()> {
    let mut expected_prev = HistoryEntry::GENESIS_HASH.to_string();

    for (index, entry) in entries.iter().enumerate() {
        let broken = |what: &str| GhosthandError::IntegrityFailure {
            reason: format!("history entry {}: {}", entry.sequence, what),
        };

        if entry.sequence != index as u64 {
            return Err(broken(&format!("expected sequence {}", index)));
        }
        if entry.prev_hash != expected_prev {
            return Err(broken("prev_hash does not match the preceding entry"));
        }
        if entry.this_hash != hash_entry(entry.sequence, &entry.record, &entry.prev_hash)? {
            return Err(broken("contents do not match this_hash"));
        }

        expected_prev = entry.this_hash.clone();
    }

    Ok(())
}

/// The tip of a chain: what the next appended entry must link to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChainHead {
    pub(crate) next_sequence: u64,
    pub(crate) last_hash: String,
}

impl Default for ChainHead {
    fn default() -> Self {
        Self {
            next_sequence: 0,
            last_hash: HistoryEntry::GENESIS_HASH.to_string(),
        }
    }
}

impl ChainHead {
    /// The head after `entries`.
    pub(crate) fn after(entries: &[HistoryEntry]) -> Self {
        entries
            .last()
            .map(|last| Self {
                next_sequence: last.sequence + 1,
                last_hash: last.this_hash.clone(),
            })
            .unwrap_or_default()
    }

    /// Wrap `record` as the next entry. The head is not moved until
    /// `advance` is called, so a failed write leaves it untouched.
    pub(crate) fn seal(&self, record: &RunRecord) -> GhosthandResult<HistoryEntry> {
        let this_hash = hash_entry(self.next_sequence, record, &self.last_hash)?;
        Ok(HistoryEntry {
            sequence: self.next_sequence,
            prev_hash: self.last_hash.clone(),
            this_hash,
            record: record.clone(),
        })
    }

    pub(crate) fn advance(&mut self, entry: &HistoryEntry) {
        self.next_sequence = entry.sequence + 1;
        self.last_hash = entry.this_hash.clone();
    }
}
