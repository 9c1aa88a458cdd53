//! Google Gemini backend (`generateContent` REST endpoint).

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::trait_def::{GenerationUnavailable, Generator};
use super::{http_error, status_error};

/// Default API host.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default model when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Generator backed by the Gemini API.
///
/// The API key travels in the `x-goog-api-key` header so it never appears in
/// request URLs (and therefore never in error messages).
#[derive(Clone)]
pub struct GeminiGenerator {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiGenerator")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl GeminiGenerator {
    pub fn new(client: Client, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// Point at a different host (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Concatenate the text parts of the first candidate.
pub(crate) fn extract_text(body: &Value) -> Result<String, GenerationUnavailable> {
    if let Some(reason) = body
        .pointer("/promptFeedback/blockReason")
        .and_then(|r| r.as_str())
    {
        return Err(GenerationUnavailable::new(format!(
            "prompt blocked by provider: {reason}"
        )));
    }

    let parts = body
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| GenerationUnavailable::new("response has no candidates"))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.trim().is_empty() {
        return Err(GenerationUnavailable::new("empty completion"));
    }
    Ok(text)
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationUnavailable> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });

        debug!(model = %self.model, prompt_len = prompt.len(), "sending gemini request");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        let json: Value = response.json().await.map_err(http_error)?;
        extract_text(&json)
    }
}
