//! # ghosthand-history
//!
//! Append-only run history for the Ghosthand runtime, with fuzzy recall of
//! similar past goals, and the queue of goals scheduled to run later.
//!
//! ## Overview
//!
//! Every `RunRecord` is wrapped in a `HistoryEntry` that links to the
//! previous entry via its SHA-256 hash. Editing a stored record, even a
//! single byte, breaks the chain and is caught by `verify_integrity`.
//!
//! Two backends implement [`HistoryStore`](ghosthand_core::traits::HistoryStore):
//! [`InMemoryHistoryStore`] and the file-backed [`JsonlHistoryStore`].
//!
//! [`GoalQueue`] keeps scheduled goals in its own JSON-lines file. Both file
//! backends take a `<file>.lock` sibling while writing, so several processes
//! can share them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ghosthand_history::JsonlHistoryStore;
//! use ghosthand_core::traits::HistoryStore;
//!
//! let store = JsonlHistoryStore::open("~/.ghosthand/history.jsonl")?;
//! store.append(&record)?;
//! let similar = store.fuzzy_match("email the screenshot", "william", 0.6)?;
//! store.verify_integrity()?;
//! ```

pub mod chain;
pub mod entry;
pub mod fuzzy;
pub mod jsonl;
mod lock;
pub mod memory;
pub mod queue;

pub use chain::{hash_entry, verify_chain};
pub use entry::HistoryEntry;
pub use jsonl::JsonlHistoryStore;
pub use memory::InMemoryHistoryStore;
pub use queue::{GoalQueue, QueuedGoal};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{io::Write, sync::Arc, thread, time::SystemTime};

    use chrono::{Duration, Utc};
    use serde_json::json;

    use ghosthand_contracts::{
        action::{Action, ActionKind},
        error::GhosthandError,
        execution::{RunId, RunRecord, RunStatus, StepResult},
        plan::Plan,
    };
    use ghosthand_core::traits::HistoryStore;

    use super::{verify_chain, HistoryEntry, InMemoryHistoryStore, JsonlHistoryStore};

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// Build a one-step record with a distinguishable goal.
    fn make_record(user: &str, goal: &str, minutes_ago: i64) -> RunRecord {
        let action = Action::new(
            ActionKind::Speak,
            serde_json::from_value(json!({ "text": goal })).unwrap(),
        )
        .unwrap();
        RunRecord {
            run_id: RunId::new(),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            user: user.to_string(),
            goal_text: goal.to_string(),
            plan: Some(Plan::new(vec![action]).unwrap()),
            results: vec![StepResult::success("spoken")],
            dry_run: false,
            overall_status: RunStatus::Success,
            failure_reason: None,
        }
    }

    fn fill(store: &dyn HistoryStore) {
        store.append(&make_record("william", "email the screenshot to bob", 30)).unwrap();
        store.append(&make_record("ada", "email the screenshot to bob", 20)).unwrap();
        store.append(&make_record("william", "click at 10, 20", 10)).unwrap();
        store.append(&make_record("william", "email the screenshot to bob", 0)).unwrap();
    }

    // ── 1. in-memory chain ────────────────────────────────────────────────────

    #[test]
    fn test_hash_chain_integrity() {
        let store = InMemoryHistoryStore::new();
        fill(&store);

        store.verify_integrity().unwrap();
        let entries = store.entries().unwrap();
        assert_eq!(entries[0].prev_hash, HistoryEntry::GENESIS_HASH);
        for (idx, entry) in entries.iter().enumerate() {
            assert_eq!(entry.sequence, idx as u64);
        }
    }

    /// Mutating a stored record breaks the chain.
    #[test]
    fn test_tamper_detection() {
        let store = InMemoryHistoryStore::new();
        fill(&store);

        {
            let mut state = store.state.lock().unwrap();
            state.entries[1].record.goal_text = "TAMPERED".to_string();
        }

        match store.verify_integrity() {
            Err(GhosthandError::IntegrityFailure { reason }) => {
                assert!(reason.contains("entry 1"), "reason: {reason}")
            }
            other => panic!("expected IntegrityFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_removed_entry_is_detected() {
        let store = InMemoryHistoryStore::new();
        fill(&store);
        let mut entries = store.entries().unwrap();
        entries.remove(1);
        assert!(verify_chain(&entries).is_err());
    }

    // ── 2. queries ────────────────────────────────────────────────────────────

    #[test]
    fn test_query_by_user_most_recent_first() {
        let store = InMemoryHistoryStore::new();
        fill(&store);

        let records = store.query_by_user("william").unwrap();
        let goals: Vec<&str> = records.iter().map(|r| r.goal_text.as_str()).collect();
        assert_eq!(
            goals,
            vec!["email the screenshot to bob", "click at 10, 20", "email the screenshot to bob"]
        );
        assert!(store.query_by_user("nobody").unwrap().is_empty());
    }

    /// The exact match ranks first; equal scores fall back to recency.
    #[test]
    fn test_fuzzy_match_ranking() {
        let store = InMemoryHistoryStore::new();
        store.append(&make_record("william", "email the screenshot to alice", 40)).unwrap();
        fill(&store);

        let matches = store.fuzzy_match("Email the   screenshot to Bob", "william", 0.6).unwrap();
        assert_eq!(matches.len(), 3, "click goal must fall below the threshold");
        assert_eq!(matches[0].goal_text, "email the screenshot to bob");
        assert_eq!(matches[1].goal_text, "email the screenshot to bob");
        assert!(matches[0].timestamp > matches[1].timestamp, "ties are most recent first");
        assert_eq!(matches[2].goal_text, "email the screenshot to alice");
    }

    #[test]
    fn test_fuzzy_match_is_scoped_to_user() {
        let store = InMemoryHistoryStore::new();
        fill(&store);
        let matches = store.fuzzy_match("email the screenshot to bob", "ada", 0.6).unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches.iter().all(|r| r.user == "ada"));
    }

    #[test]
    fn test_list_users_first_seen_order() {
        let store = InMemoryHistoryStore::new();
        fill(&store);
        assert_eq!(store.list_users().unwrap(), vec!["william", "ada"]);
    }

    /// Concurrent appends land as whole entries on one valid chain.
    #[test]
    fn test_concurrent_appends() {
        let store = Arc::new(InMemoryHistoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    for j in 0..5 {
                        let record = make_record(&format!("user-{i}"), &format!("goal {j}"), 0);
                        store.append(&record).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.entries().unwrap().len(), 40);
        store.verify_integrity().unwrap();
    }

    // ── 3. JSON-lines file ────────────────────────────────────────────────────

    #[test]
    fn test_jsonl_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.jsonl");

        {
            let store = JsonlHistoryStore::open(&path).unwrap();
            fill(&store);
        }

        let reopened = JsonlHistoryStore::open(&path).unwrap();
        reopened.append(&make_record("grace", "say \"hello\"", 0)).unwrap();

        reopened.verify_integrity().unwrap();
        assert_eq!(reopened.entries().unwrap().len(), 5);
        assert_eq!(reopened.list_users().unwrap(), vec!["william", "ada", "grace"]);
        assert_eq!(reopened.query_by_user("william").unwrap().len(), 3);
    }

    #[test]
    fn test_jsonl_missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlHistoryStore::open(dir.path().join("history.jsonl")).unwrap();
        assert!(store.query_by_user("william").unwrap().is_empty());
        store.verify_integrity().unwrap();
    }

    #[test]
    fn test_jsonl_tampering_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let store = JsonlHistoryStore::open(&path).unwrap();
        fill(&store);

        let contents = std::fs::read_to_string(&path).unwrap();
        let tampered = contents.replacen("click at 10, 20", "click at 99, 99", 1);
        std::fs::write(&path, tampered).unwrap();

        assert!(matches!(
            store.verify_integrity(),
            Err(GhosthandError::IntegrityFailure { .. })
        ));
    }

    /// Queries skip a corrupt line; integrity verification refuses it.
    #[test]
    fn test_jsonl_corrupt_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let store = JsonlHistoryStore::open(&path).unwrap();
        fill(&store);

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{not json\n").unwrap();

        assert_eq!(store.query_by_user("william").unwrap().len(), 3);
        assert!(store.verify_integrity().is_err());
    }

    /// Two handles on one file (as two processes would hold) keep a single
    /// valid chain instead of forking it at a stale head.
    #[test]
    fn test_jsonl_two_handles_share_one_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let first = JsonlHistoryStore::open(&path).unwrap();
        let second = JsonlHistoryStore::open(&path).unwrap();

        first.append(&make_record("william", "say \"one\"", 0)).unwrap();
        second.append(&make_record("ada", "say \"two\"", 0)).unwrap();
        first.append(&make_record("william", "say \"three\"", 0)).unwrap();

        first.verify_integrity().unwrap();
        let sequences: Vec<u64> = second.entries().unwrap().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert!(!dir.path().join("history.jsonl.lock").exists());
    }

    #[test]
    fn test_jsonl_concurrent_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = JsonlHistoryStore::open(&path).unwrap();
                thread::spawn(move || {
                    for j in 0..5 {
                        let record = make_record(&format!("user-{i}"), &format!("goal {j}"), 0);
                        store.append(&record).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let store = JsonlHistoryStore::open(&path).unwrap();
        assert_eq!(store.entries().unwrap().len(), 20);
        store.verify_integrity().unwrap();
    }

    /// A lock left by a writer that died does not block appends forever.
    #[test]
    fn test_jsonl_stale_lock_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let store = JsonlHistoryStore::open(&path).unwrap();

        let lock = dir.path().join("history.jsonl.lock");
        let file = std::fs::File::create(&lock).unwrap();
        file.set_modified(SystemTime::now() - std::time::Duration::from_secs(3600)).unwrap();
        drop(file);

        store.append(&make_record("william", "say \"hi\"", 0)).unwrap();
        assert_eq!(store.entries().unwrap().len(), 1);
        assert!(!lock.exists());
    }

    #[test]
    fn test_jsonl_unreadable_path_is_store_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be.
        assert!(matches!(
            JsonlHistoryStore::open(dir.path()).err(),
            Some(GhosthandError::StoreUnavailable { .. })
        ));
    }
}
