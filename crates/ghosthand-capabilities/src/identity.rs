//! Passphrase identity and the `enroll-user` executor.
//!
//! `PassphraseVerifier` stands in for voice-print or biometric matching. It
//! keeps a SHA-256 digest of `user:passphrase` per user; the passphrase
//! itself is never stored.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use ghosthand_contracts::{
    action::{ActionKind, Parameters},
    error::{GhosthandError, GhosthandResult},
    execution::StepResult,
};
use ghosthand_core::traits::IdentityVerifier;

use crate::{files::expand_home, params};

type Digests = BTreeMap<String, String>;

fn digest(user: &str, sample: &[u8]) -> GhosthandResult<String> {
    let text = std::str::from_utf8(sample).map_err(|_| GhosthandError::EnrollmentFailed {
        user: user.to_string(),
        reason: "passphrase is not valid UTF-8".to_string(),
    })?;
    let passphrase = text.trim_end_matches(['\r', '\n']);
    if passphrase.is_empty() {
        return Err(GhosthandError::EnrollmentFailed {
            user: user.to_string(),
            reason: "empty passphrase".to_string(),
        });
    }
    let mut hasher = Sha256::new();
    hasher.update(user.as_bytes());
    hasher.update(b":");
    hasher.update(passphrase.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Compare two digests without stopping at the first differing byte.
/// Digest length is fixed, so a length mismatch leaks nothing.
fn digests_match(actual: &str, expected: &str) -> bool {
    let (actual, expected) = (actual.as_bytes(), expected.as_bytes());
    actual.len() == expected.len()
        && actual.iter().zip(expected).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

/// Passphrase-digest verifier, optionally persisted to a JSON file.
pub struct PassphraseVerifier {
    path: Option<PathBuf>,
    digests: Mutex<Digests>,
}

impl PassphraseVerifier {
    /// A verifier that forgets everything when dropped.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            digests: Mutex::new(Digests::new()),
        }
    }

    /// Load digests from `path`. A missing file starts empty.
    pub fn open(path: impl AsRef<Path>) -> GhosthandResult<Self> {
        let path = path.as_ref().to_path_buf();
        let digests = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| GhosthandError::ConfigError {
                reason: format!("identity store '{}' is corrupt: {}", path.display(), e),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Digests::new(),
            Err(e) => {
                return Err(GhosthandError::ConfigError {
                    reason: format!("cannot read identity store '{}': {}", path.display(), e),
                })
            }
        };
        debug!(path = %path.display(), users = digests.len(), "identity store loaded");
        Ok(Self {
            path: Some(path),
            digests: Mutex::new(digests),
        })
    }

    fn persist(&self, user: &str, digests: &Digests) -> GhosthandResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let failed = |reason: String| GhosthandError::EnrollmentFailed {
            user: user.to_string(),
            reason,
        };
        let io_failed = |verb: &str, at: &Path, e: std::io::Error| {
            failed(format!("cannot {} '{}': {}", verb, at.display(), e))
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_failed("create", parent, e))?;
        }
        let encoded = serde_json::to_string_pretty(digests).map_err(|e| failed(e.to_string()))?;
        let staging = path.with_extension("tmp");
        fs::write(&staging, encoded).map_err(|e| io_failed("write", &staging, e))?;
        fs::rename(&staging, path).map_err(|e| io_failed("replace", path, e))
    }
}

impl IdentityVerifier for PassphraseVerifier {
    fn enroll(&self, user: &str, sample: &[u8]) -> GhosthandResult<()> {
        let value = digest(user, sample)?;
        let mut digests = self.digests.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = digests.insert(user.to_string(), value);
        if let Err(e) = self.persist(user, &digests) {
            match previous {
                Some(old) => digests.insert(user.to_string(), old),
                None => digests.remove(user),
            };
            return Err(e);
        }
        info!(user = %user, replaced = previous.is_some(), "passphrase enrolled");
        Ok(())
    }

    fn verify(&self, user: &str, sample: &[u8]) -> GhosthandResult<bool> {
        let digests = self.digests.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(expected) = digests.get(user) else {
            return Ok(false);
        };
        let matches = digest(user, sample).is_ok_and(|d| digests_match(&d, expected));
        if !matches {
            warn!(user = %user, "passphrase mismatch");
        }
        Ok(matches)
    }

    fn is_enrolled(&self, user: &str) -> bool {
        self.digests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(user)
    }
}

/// `enroll-user`: read a sample file and enroll it for `user`.
pub struct EnrollUserExecutor {
    verifier: Arc<dyn IdentityVerifier>,
}

impl EnrollUserExecutor {
    pub fn new(verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self { verifier }
    }
}

impl ghosthand_core::traits::ActionExecutor for EnrollUserExecutor {
    fn execute(&self, parameters: &Parameters) -> GhosthandResult<StepResult> {
        let kind = ActionKind::EnrollUser.as_str();
        let user = params::required_str(kind, parameters, "user")?;
        let sample_path = expand_home(params::required_str(kind, parameters, "sample_path")?);

        let sample = fs::read(&sample_path).map_err(|e| {
            let reason = format!("cannot read sample '{}': {}", sample_path.display(), e);
            GhosthandError::executor(kind, reason)
        })?;
        self.verifier
            .enroll(user, &sample)
            .map_err(|e| GhosthandError::executor(kind, e.to_string()))?;
        Ok(StepResult::success(format!("enrolled {}", user)))
    }
}
