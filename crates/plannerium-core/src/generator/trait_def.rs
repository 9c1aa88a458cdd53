//! The `Generator` trait -- the text-generation capability every stage calls.
//!
//! The pipeline never knows which LLM backend sits behind the trait. The
//! trait is object-safe so callers can hold `Box<dyn Generator>` or
//! `Arc<dyn Generator>`.

use async_trait::async_trait;
use thiserror::Error;

/// The text-generation capability could not produce a completion.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("generation unavailable: {message}")]
pub struct GenerationUnavailable {
    pub message: String,
}

impl GenerationUnavailable {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Given a prompt, return a text completion.
///
/// Calls may be slow and may fail. Implementations must not retry on their
/// own; retry policy belongs to the caller.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Short backend name for logs (e.g. "gemini").
    fn name(&self) -> &str;

    /// Produce a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationUnavailable>;
}

// Compile-time assertion: Generator must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Generator) {}
};
