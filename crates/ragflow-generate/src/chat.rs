use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use ragflow_core::config::GenerationSettings;
use ragflow_core::{Error, Generator};

use crate::prompt::build_prompt;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Generator for any OpenAI-compatible `/v1/chat/completions` server (LM Studio by default).
pub struct ChatCompletionsGenerator {
    client: Client,
    base_url: String,
    settings: GenerationSettings,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatCompletionsGenerator {
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(settings.timeout_secs)).build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            settings: settings.clone(),
        })
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// True when `GET /v1/models` answers 200 within a few seconds.
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/v1/models", self.base_url);
        match self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(url, error = %e, "generation server health check failed");
                false
            }
        }
    }

    async fn chat(&self, prompt: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.settings.system_prompt.as_deref() {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: prompt });
        let body = ChatRequest {
            model: self.settings.model.as_deref(),
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        tracing::debug!(url, max_tokens = body.max_tokens, "requesting completion");
        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = self.settings.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.bearer_auth(key);
        }
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Chat completion failed: Status {}, Body: {}", status, text));
        }
        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("No response content"))
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    async fn complete(&self, question: &str, context: &[String]) -> ragflow_core::Result<String> {
        let prompt = build_prompt(question, context);
        self.chat(&prompt).await.map_err(Error::generation)
    }
}
