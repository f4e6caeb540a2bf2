//! # ghosthand-capabilities
//!
//! Reference executors for every kind in the closed action set, plus a
//! passphrase-based `IdentityVerifier`.
//!
//! | Kind               | Executor               | Backed by                 |
//! |--------------------|------------------------|---------------------------|
//! | `locate-file`      | `LocateFileExecutor`   | directory scan            |
//! | `ocr-read`         | `OcrReadExecutor`      | `tesseract`               |
//! | `redact-image`     | `RedactImageExecutor`  | `tesseract` + `convert`   |
//! | `send-email`       | `SendEmailExecutor`    | JSON outbox spool         |
//! | `send-webhook`     | `SendWebhookExecutor`  | HTTP POST                 |
//! | `click-ui-element` | `ClickExecutor`        | `xdotool`                 |
//! | `type-text`        | `TypeTextExecutor`     | `xdotool`                 |
//! | `speak`            | `SpeakExecutor`        | `espeak`                  |
//! | `enroll-user`      | `EnrollUserExecutor`   | any `IdentityVerifier`    |
//!
//! Executors that take an image or attachment accept either a path or a
//! file-name fragment; a fragment resolves to the newest matching file in
//! the configured search directories. That is how "the latest screenshot"
//! reaches an e-mail without steps passing data to each other.
//!
//! External programs run through [`CommandRunner`] so they can be replaced.

pub mod command;
pub mod comms;
pub mod desktop;
pub mod files;
pub mod identity;
pub mod params;
pub mod vision;
pub mod wiring;

pub use command::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use identity::PassphraseVerifier;
pub use wiring::{default_registry, CapabilityConfig};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{fs, sync::Arc};

    use serde_json::json;

    use ghosthand_contracts::{
        action::{ActionKind, Parameters},
        error::GhosthandError,
    };
    use ghosthand_core::traits::{ActionExecutor, IdentityVerifier};

    use crate::command::mock::RecordingRunner;

    use super::*;

    fn config_in(dir: &std::path::Path) -> CapabilityConfig {
        CapabilityConfig {
            search_dirs: vec![dir.display().to_string()],
            outbox: dir.join("outbox").display().to_string(),
            ..CapabilityConfig::default()
        }
    }

    // ── 1. Wiring ────────────────────────────────────────────────────────────

    #[test]
    fn every_kind_is_bound_when_a_verifier_is_present() {
        let dir = tempfile::tempdir().unwrap();
        let verifier: Arc<dyn IdentityVerifier> = Arc::new(PassphraseVerifier::in_memory());
        let runner = Arc::new(RecordingRunner::default());
        let registry = default_registry(&config_in(dir.path()), runner, Some(verifier)).unwrap();
        assert_eq!(registry.registered_kinds(), ActionKind::ALL.to_vec());
    }

    #[test]
    fn enroll_is_unbound_without_a_verifier() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let registry = default_registry(&config_in(dir.path()), runner, None).unwrap();

        assert!(!registry.registered_kinds().contains(&ActionKind::EnrollUser));
        match registry.resolve(ActionKind::EnrollUser) {
            Err(GhosthandError::NoExecutorRegistered { kind }) => assert_eq!(kind, "enroll-user"),
            Err(other) => panic!("expected NoExecutorRegistered, got {:?}", other),
            Ok(_) => panic!("expected NoExecutorRegistered, got an executor"),
        }
    }

    // ── 2. Config ────────────────────────────────────────────────────────────

    #[test]
    fn partial_config_keeps_defaults() {
        let config: CapabilityConfig =
            serde_json::from_value(json!({ "speech_bin": "say" })).unwrap();
        assert_eq!(config.speech_bin, "say");
        assert_eq!(config.tesseract_bin, "tesseract");
        assert_eq!(config.webhook_timeout_secs, 10);
        assert!(!config.search_dirs.is_empty());
    }

    // ── 3. Bound executors share the locator and runner ──────────────────────

    #[test]
    fn resolved_executors_use_configured_programs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Screenshot_1.png"), b"").unwrap();
        let runner = Arc::new(RecordingRunner::replying(0, "text"));
        let config = CapabilityConfig {
            tesseract_bin: "/opt/ocr/tesseract".to_string(),
            ..config_in(dir.path())
        };
        let registry = default_registry(&config, runner.clone(), None).unwrap();

        let parameters: Parameters =
            serde_json::from_value(json!({ "image_path": "screenshot" })).unwrap();
        let result = registry.resolve(ActionKind::OcrRead).unwrap().execute(&parameters).unwrap();

        assert_eq!(result.produced_value.unwrap()["text"], json!("text"));
        assert_eq!(runner.calls()[0].0, "/opt/ocr/tesseract");
    }

    #[test]
    fn screenshot_email_spools_into_configured_outbox() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Screenshot_1.png"), b"").unwrap();
        let config = config_in(dir.path());
        let runner = Arc::new(RecordingRunner::default());
        let registry = default_registry(&config, runner, None).unwrap();

        let parameters: Parameters = serde_json::from_value(json!({
            "to": "bob@example.com",
            "subject": "Screenshot",
            "attachment": "screenshot",
        }))
        .unwrap();
        registry.resolve(ActionKind::SendEmail).unwrap().execute(&parameters).unwrap();

        assert_eq!(fs::read_dir(config.outbox_dir()).unwrap().count(), 1);
    }
}
