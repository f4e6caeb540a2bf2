//! Per-call run context: who is running, in which mode, with what identity.
//!
//! Nothing here is global. Each submission carries its own `RunContext`, so
//! concurrent runs for different users never observe each other's identity
//! state or cancellation.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use serde::{Deserialize, Serialize};

/// Result of an identity check for the submitting user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityStatus {
    #[default]
    Unverified,
    /// The named user passed verification for this call.
    Verified { user: String },
}

impl IdentityStatus {
    /// True only if verification succeeded for exactly `user`.
    pub fn is_verified_for(&self, user: &str) -> bool {
        matches!(self, IdentityStatus::Verified { user: u } if u == user)
    }
}

/// Outcome of an enrollment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrollmentStatus {
    Enrolled,
    Failed { reason: String },
}

/// Cooperative cancellation flag shared between a caller and one run.
///
/// The orchestrator checks it before dispatching each step; a step already
/// handed to an executor runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything the orchestrator needs to know about one submission.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub user: String,
    pub dry_run: bool,
    pub identity: IdentityStatus,
    pub cancel: CancelToken,
}

impl RunContext {
    /// An unverified, live (non-dry-run) context for `user`.
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            dry_run: false,
            identity: IdentityStatus::Unverified,
            cancel: CancelToken::new(),
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_identity(mut self, identity: IdentityStatus) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}
