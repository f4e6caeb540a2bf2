//! The hash-chain envelope around a stored `RunRecord`.

use serde::{Deserialize, Serialize};

use ghosthand_contracts::execution::RunRecord;

/// A single entry in the history hash chain.
///
/// Each entry commits to the previous one via `prev_hash`. Modifying any
/// field of the embedded `record` invalidates `this_hash` and every later
/// `prev_hash`, which `verify_chain` detects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    /// SHA-256 hash (hex) of the previous entry, or `GENESIS_HASH` for the
    /// first entry.
    pub prev_hash: String,

    /// SHA-256 hash (hex) over (sequence, prev_hash, canonical JSON of record).
    pub this_hash: String,

    pub record: RunRecord,
}

impl HistoryEntry {
    /// The `prev_hash` of the first entry in every chain: 64 hex zeros.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}
