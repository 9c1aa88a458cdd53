//! OpenAI-compatible chat-completions backend (OpenAI, Ollama, vLLM, ...).

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::trait_def::{GenerationUnavailable, Generator};
use super::{http_error, status_error};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone)]
pub struct OpenAiCompatibleGenerator {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for OpenAiCompatibleGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleGenerator")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiCompatibleGenerator {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

pub(crate) fn extract_content(body: &Value) -> Result<String, GenerationUnavailable> {
    let content = body
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| GenerationUnavailable::new("response has no choices"))?;
    if content.trim().is_empty() {
        return Err(GenerationUnavailable::new("empty completion"));
    }
    Ok(content.to_string())
}

#[async_trait]
impl Generator for OpenAiCompatibleGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationUnavailable> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        debug!(model = %self.model, prompt_len = prompt.len(), "sending chat completion request");

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(http_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        let json: Value = response.json().await.map_err(http_error)?;
        extract_content(&json)
    }
}
