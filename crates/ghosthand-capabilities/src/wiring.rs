//! Binding the reference executors into a `CapabilityRegistry`.

use std::{path::PathBuf, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ghosthand_contracts::{action::ActionKind, error::GhosthandResult};
use ghosthand_core::{registry::CapabilityRegistry, traits::IdentityVerifier};

use crate::{
    command::CommandRunner,
    comms::{SendEmailExecutor, SendWebhookExecutor},
    desktop::{ClickExecutor, SpeakExecutor, TypeTextExecutor},
    files::{expand_home, FileLocator, LocateFileExecutor},
    identity::EnrollUserExecutor,
    vision::{OcrReadExecutor, RedactImageExecutor},
};

/// The `[capabilities]` section of the deployment config.
///
/// Paths may start with `~/`. Program names are looked up on `PATH`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityConfig {
    pub search_dirs: Vec<String>,
    pub outbox: String,
    pub tesseract_bin: String,
    pub convert_bin: String,
    pub xdotool_bin: String,
    pub speech_bin: String,
    pub webhook_timeout_secs: u64,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            search_dirs: vec![
                "~/Pictures".to_string(),
                "~/Desktop".to_string(),
                "~/Downloads".to_string(),
                "~/Documents".to_string(),
            ],
            outbox: "~/.ghosthand/outbox".to_string(),
            tesseract_bin: "tesseract".to_string(),
            convert_bin: "convert".to_string(),
            xdotool_bin: "xdotool".to_string(),
            speech_bin: "espeak".to_string(),
            webhook_timeout_secs: 10,
        }
    }
}

impl CapabilityConfig {
    pub fn locator(&self) -> FileLocator {
        FileLocator::new(self.search_dirs.iter().map(|d| expand_home(d)).collect())
    }

    pub fn outbox_dir(&self) -> PathBuf {
        expand_home(&self.outbox)
    }
}

/// A registry with every reference executor bound.
///
/// `enroll-user` is only bound when a verifier is supplied; without one the
/// kind stays unbound and the orchestrator skips such steps.
pub fn default_registry(
    config: &CapabilityConfig,
    runner: Arc<dyn CommandRunner>,
    verifier: Option<Arc<dyn IdentityVerifier>>,
) -> GhosthandResult<CapabilityRegistry> {
    let locator = config.locator();

    let mut registry = CapabilityRegistry::new()
        .with_executor(
            ActionKind::LocateFile,
            Arc::new(LocateFileExecutor::new(locator.clone())),
        )
        .with_executor(
            ActionKind::OcrRead,
            Arc::new(OcrReadExecutor::new(
                runner.clone(),
                locator.clone(),
                &config.tesseract_bin,
            )),
        )
        .with_executor(
            ActionKind::RedactImage,
            Arc::new(RedactImageExecutor::new(
                runner.clone(),
                locator.clone(),
                &config.tesseract_bin,
                &config.convert_bin,
            )),
        )
        .with_executor(
            ActionKind::SendEmail,
            Arc::new(SendEmailExecutor::new(config.outbox_dir(), locator)),
        )
        .with_executor(
            ActionKind::SendWebhook,
            Arc::new(SendWebhookExecutor::new(Duration::from_secs(
                config.webhook_timeout_secs,
            ))?),
        )
        .with_executor(
            ActionKind::ClickUiElement,
            Arc::new(ClickExecutor::new(runner.clone(), &config.xdotool_bin)),
        )
        .with_executor(
            ActionKind::TypeText,
            Arc::new(TypeTextExecutor::new(runner.clone(), &config.xdotool_bin)),
        )
        .with_executor(
            ActionKind::Speak,
            Arc::new(SpeakExecutor::new(runner, &config.speech_bin)),
        );

    match verifier {
        Some(verifier) => {
            let enroll = Arc::new(EnrollUserExecutor::new(verifier));
            registry = registry.with_executor(ActionKind::EnrollUser, enroll);
        }
        None => warn!("no identity verifier configured; 'enroll-user' steps will be skipped"),
    }

    info!(kinds = registry.registered_kinds().len(), "capability registry wired");
    Ok(registry)
}
