//! OpenAI-compatible chat-completions client used as the generative fallback.

use std::{fmt::Write, time::Duration};

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ghosthand_contracts::{
    action::ActionKind,
    error::{GhosthandError, GhosthandResult},
};

use crate::source::PlanGenerator;

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpGeneratorConfig {
    pub endpoint: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for HttpGeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            timeout_secs: 30,
        }
    }
}

/// Asks a hosted model for plan text.
pub struct HttpPlanGenerator {
    client: reqwest::blocking::Client,
    config: HttpGeneratorConfig,
    api_key: Option<String>,
}

impl HttpPlanGenerator {
    /// Build a client. The API key is read from `config.api_key_env` once.
    pub fn new(config: HttpGeneratorConfig) -> GhosthandResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GhosthandError::ConfigError {
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        Ok(Self {
            client,
            config,
            api_key,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}

impl PlanGenerator for HttpPlanGenerator {
    fn generate(
        &self,
        goal_text: &str,
        user: &str,
        hint_kinds: &[ActionKind],
    ) -> GhosthandResult<String> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| GhosthandError::ConfigError {
                    reason: e.to_string(),
                })?;
            headers.insert(AUTHORIZATION, value);
        }

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt(hint_kinds),
                },
                ChatMessage {
                    role: "user",
                    content: format!("User: {}\nGoal: {}", user, goal_text),
                },
            ],
            temperature: self.config.temperature,
        };

        info!(
            endpoint = %self.config.endpoint,
            model = %self.config.model,
            "requesting generated plan"
        );
        let response = self
            .client
            .post(&self.config.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .map_err(|e| GhosthandError::UnplannableGoal {
                reason: format!("plan generator request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(GhosthandError::UnplannableGoal {
                reason: format!("plan generator returned HTTP {}: {}", status, text),
            });
        }

        let parsed: ChatResponse = response.json().map_err(|e| GhosthandError::UnplannableGoal {
            reason: format!("plan generator response malformed: {}", e),
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| GhosthandError::UnplannableGoal {
                reason: "plan generator returned no choices".to_string(),
            })?;

        debug!(chars = content.len(), "generated plan received");
        Ok(content)
    }
}

/// Describe the closed action set so the model can only pick from it.
pub fn system_prompt(hint_kinds: &[ActionKind]) -> String {
    let mut prompt = String::from(
        "You translate a desktop automation goal into a plan.\n\
         Return ONLY a JSON array. Each element is {\"kind\": <kind>, \"parameters\": {...}}.\n\
         Use only these kinds and parameters (? marks optional):\n",
    );
    for kind in ActionKind::ALL {
        let schema = kind.schema();
        let params: Vec<String> = schema
            .params
            .iter()
            .map(|p| {
                let marker = if p.required { "" } else { "?" };
                format!("{}{}: {}", p.name, marker, p.ty.name())
            })
            .collect();
        let _ = writeln!(prompt, "- {}: {{{}}}", kind, params.join(", "));
    }
    if !hint_kinds.is_empty() {
        let names: Vec<&str> = hint_kinds.iter().map(|k| k.as_str()).collect();
        let _ = writeln!(prompt, "Similar past goals used: {}.", names.join(", "));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_lists_every_kind() {
        let prompt = system_prompt(&[]);
        for kind in ActionKind::ALL {
            assert!(prompt.contains(kind.as_str()), "missing {kind}");
        }
        assert!(prompt.contains("to: string"));
        assert!(prompt.contains("attachment?: string"));
        assert!(!prompt.contains("Similar past goals"));
    }

    #[test]
    fn system_prompt_mentions_hints() {
        let prompt = system_prompt(&[ActionKind::SendEmail]);
        assert!(prompt.contains("Similar past goals used: send-email."));
    }
}
