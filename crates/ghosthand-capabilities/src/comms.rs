//! Communication executors: `send-email` and `send-webhook`.
//!
//! E-mail is not sent directly. Messages are spooled as JSON files into an
//! outbox directory for a mail relay to pick up.

use std::{
    fs,
    path::PathBuf,
    sync::LazyLock,
    time::Duration,
};

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use ghosthand_contracts::{
    action::{ActionKind, Parameters},
    error::{GhosthandError, GhosthandResult},
    execution::StepResult,
};
use ghosthand_core::traits::ActionExecutor;

use crate::{files::FileLocator, params};

static RECIPIENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// A spooled outgoing e-mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: String,
    pub queued_at: chrono::DateTime<Utc>,
    pub to: String,
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<PathBuf>,
}

/// `send-email`: validate the message and drop it in the outbox.
pub struct SendEmailExecutor {
    outbox: PathBuf,
    locator: FileLocator,
}

impl SendEmailExecutor {
    pub fn new(outbox: impl Into<PathBuf>, locator: FileLocator) -> Self {
        Self {
            outbox: outbox.into(),
            locator,
        }
    }
}

impl ActionExecutor for SendEmailExecutor {
    fn execute(&self, parameters: &Parameters) -> GhosthandResult<StepResult> {
        let kind = ActionKind::SendEmail.as_str();
        let to = params::required_str(kind, parameters, "to")?;
        let subject = params::required_str(kind, parameters, "subject")?;

        if !RECIPIENT_RE.is_match(to) {
            let reason = format!("invalid recipient address '{}'", to);
            return Err(GhosthandError::executor(kind, reason));
        }

        let attachment = params::optional_str(parameters, "attachment")
            .map(|target| self.locator.resolve(kind, target, false))
            .transpose()?;

        let message = OutboxMessage {
            id: uuid::Uuid::new_v4().to_string(),
            queued_at: Utc::now(),
            to: to.to_string(),
            subject: subject.to_string(),
            body: params::optional_str(parameters, "body").unwrap_or_default().to_string(),
            attachment,
        };

        fs::create_dir_all(&self.outbox).map_err(|e| {
            let reason = format!("cannot create outbox '{}': {}", self.outbox.display(), e);
            GhosthandError::executor(kind, reason)
        })?;
        let path = self.outbox.join(format!("{}.json", message.id));
        let encoded = serde_json::to_vec_pretty(&message)
            .map_err(|e| GhosthandError::executor(kind, format!("cannot encode message: {}", e)))?;
        fs::write(&path, encoded).map_err(|e| {
            GhosthandError::executor(kind, format!("cannot write '{}': {}", path.display(), e))
        })?;

        info!(
            to = %to,
            outbox = %path.display(),
            attachment = message.attachment.is_some(),
            "e-mail queued"
        );
        Ok(StepResult::success_with(
            format!("queued e-mail to {}", to),
            json!({ "outbox_path": path.display().to_string() }),
        ))
    }
}

/// `send-webhook`: POST `{"text": message}` to a URL.
pub struct SendWebhookExecutor {
    client: reqwest::blocking::Client,
}

impl SendWebhookExecutor {
    pub fn new(timeout: Duration) -> GhosthandResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GhosthandError::ConfigError {
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

impl ActionExecutor for SendWebhookExecutor {
    fn execute(&self, parameters: &Parameters) -> GhosthandResult<StepResult> {
        let kind = ActionKind::SendWebhook.as_str();
        let url = params::required_str(kind, parameters, "url")?;
        let message = params::required_str(kind, parameters, "message")?;

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            let reason = format!("unsupported webhook URL '{}'", url);
            return Err(GhosthandError::executor(kind, reason));
        }

        let response = self
            .client
            .post(url)
            .json(&json!({ "text": message }))
            .send()
            .map_err(|e| GhosthandError::executor(kind, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GhosthandError::executor(kind, format!("webhook returned HTTP {}", status)));
        }

        info!(url = %url, status = status.as_u16(), "webhook delivered");
        Ok(StepResult::success(format!("webhook returned HTTP {}", status)))
    }
}
