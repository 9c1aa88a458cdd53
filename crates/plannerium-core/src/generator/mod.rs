//! Text-generation capability and its HTTP backends.
//!
//! ```text
//! Pipeline stage
//!     |
//!     v
//! &dyn Generator --generate(prompt)--> String | GenerationUnavailable
//!     |
//!     +-- GeminiGenerator            (generateContent REST)
//!     +-- OpenAiCompatibleGenerator  (chat/completions REST)
//! ```

pub mod gemini;
pub mod openai;
pub mod trait_def;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;

pub use gemini::GeminiGenerator;
pub use openai::OpenAiCompatibleGenerator;
pub use trait_def::{GenerationUnavailable, Generator};

/// Which backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    Gemini,
    OpenAi,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
        };
        f.write_str(s)
    }
}

impl FromStr for Provider {
    type Err = ProviderParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" | "openai-compatible" => Ok(Self::OpenAi),
            _ => Err(ProviderParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an unknown [`Provider`] name.
#[derive(Debug, Clone, Error)]
#[error("unknown generator provider {0:?} (expected gemini or openai)")]
pub struct ProviderParseError(pub String);

/// Everything needed to construct a backend.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub provider: Provider,
    pub model: String,
    pub api_key: Option<String>,
    /// Override the provider's default host.
    pub base_url: Option<String>,
    /// Per-request HTTP timeout, independent of the pipeline's stage timeout.
    pub request_timeout: Option<Duration>,
}

/// Build the configured backend.
pub fn build_generator(
    settings: &GeneratorSettings,
) -> Result<Box<dyn Generator>, GenerationUnavailable> {
    let mut builder = Client::builder();
    if let Some(timeout) = settings.request_timeout {
        builder = builder.timeout(timeout);
    }
    let client = builder
        .build()
        .map_err(|e| GenerationUnavailable::new(format!("failed to build HTTP client: {e}")))?;

    match settings.provider {
        Provider::Gemini => {
            let key = settings
                .api_key
                .clone()
                .ok_or_else(|| GenerationUnavailable::new("gemini provider requires an API key"))?;
            let mut generator = GeminiGenerator::new(client, key, &settings.model);
            if let Some(ref base) = settings.base_url {
                generator = generator.with_base_url(base);
            }
            Ok(Box::new(generator))
        }
        Provider::OpenAi => {
            let base = settings
                .base_url
                .clone()
                .unwrap_or_else(|| openai::DEFAULT_BASE_URL.to_string());
            Ok(Box::new(OpenAiCompatibleGenerator::new(
                client,
                base,
                &settings.model,
                settings.api_key.clone(),
            )))
        }
    }
}

/// Convert a transport error, dropping the URL so credentials in query
/// strings cannot leak into messages.
pub(crate) fn http_error(err: reqwest::Error) -> GenerationUnavailable {
    let kind = if err.is_timeout() {
        "request timed out"
    } else if err.is_connect() {
        "connection failed"
    } else if err.is_decode() {
        "could not decode provider response"
    } else {
        "request failed"
    };
    GenerationUnavailable::new(format!("{kind}: {}", err.without_url()))
}

pub(crate) fn status_error(status: StatusCode) -> GenerationUnavailable {
    GenerationUnavailable::new(format!("provider returned HTTP {status}"))
}
