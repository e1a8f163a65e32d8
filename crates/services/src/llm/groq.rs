use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use intervue_config::LlmSettings;

use super::{GenerationRequest, LlmClient, LlmError};

/// OpenAI-compatible chat-completions client (Groq by default).
///
/// Every call is bounded by the configured timeout; expiry maps to
/// `LlmError::Timeout` so callers fall through to their fallback paths
/// instead of blocking a session.
pub struct GroqClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl GroqClient {
    /// Returns `None` when no API key is configured — callers then run with
    /// fallbacks only, which keeps local dev usable without credentials.
    pub fn from_settings(settings: &LlmSettings) -> Option<Self> {
        let api_key = settings.api_key.clone()?;
        Some(Self {
            http: reqwest::Client::new(),
            base_url: settings.base_url.clone(),
            api_key,
            model: settings.model.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        })
    }

    async fn chat(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(%status, detail = %truncate(&detail, 200), "LLM request rejected");
            return Err(LlmError::Unavailable(format!("status {status}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Unavailable(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        debug!(chars = content.len(), "LLM completion received");
        Ok(content)
    }
}

#[async_trait]
impl LlmClient for GroqClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
        self.chat(&request).await
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
