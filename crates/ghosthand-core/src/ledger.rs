//! In-memory record of enrollment outcomes.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use ghosthand_contracts::context::EnrollmentStatus;

/// Remembers the latest enrollment outcome per user.
///
/// The orchestrator consults it, together with the per-call identity
/// status, before letting a privileged action through.
#[derive(Debug, Default)]
pub struct EnrollmentLedger {
    entries: RwLock<HashMap<String, EnrollmentStatus>>,
}

impl EnrollmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, user: &str, status: EnrollmentStatus) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.to_string(), status);
    }

    pub fn status(&self, user: &str) -> Option<EnrollmentStatus> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user)
            .cloned()
    }

    pub fn is_enrolled(&self, user: &str) -> bool {
        matches!(self.status(user), Some(EnrollmentStatus::Enrolled))
    }
}
