//! Stage executors.
//!
//! Every stage follows the same contract:
//! 1. Build the prompt from the current state.
//! 2. Call the generator (bounded by the stage timeout, abandoned on
//!    cancellation). Failures propagate unchanged; no retries.
//! 3. Parse the completion with [`crate::response::parse_response`].
//! 4. Extract the stage's top-level key. A missing key yields an empty
//!    sequence and marks the stage as degraded instead of failing.
//! 5. Decode and normalize the records; shape violations are
//!    [`MalformedResponse`].

pub mod decompose;
pub mod optimize;
pub mod prioritize;
pub mod risk;
pub mod schedule;

use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::generator::{GenerationUnavailable, Generator};
use crate::response::{MalformedResponse, parse_response};

pub use decompose::{Decomposition, decompose};
pub use optimize::{Optimizations, optimize};
pub use prioritize::{Prioritization, prioritize};
pub use risk::{RiskAssessment, assess_risks};
pub use schedule::{Scheduling, schedule};

/// The five pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Decomposition,
    Prioritization,
    Scheduling,
    RiskAnalysis,
    Optimization,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Self::Decomposition,
        Self::Prioritization,
        Self::Scheduling,
        Self::RiskAnalysis,
        Self::Optimization,
    ];

    /// Top-level key the stage's response must carry.
    pub fn key(self) -> &'static str {
        match self {
            Self::Decomposition | Self::Prioritization => "tasks",
            Self::Scheduling => "schedule",
            Self::RiskAnalysis => "risks",
            Self::Optimization => "optimizations",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Decomposition => "decomposition",
            Self::Prioritization => "prioritization",
            Self::Scheduling => "scheduling",
            Self::RiskAnalysis => "risk_analysis",
            Self::Optimization => "optimization",
        };
        f.write_str(s)
    }
}

/// Why a single stage failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StageError {
    #[error(transparent)]
    Unavailable(#[from] GenerationUnavailable),

    #[error(transparent)]
    Malformed(#[from] MalformedResponse),

    #[error("stage cancelled")]
    Cancelled,
}

/// What every stage needs besides its own inputs.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub generator: &'a dyn Generator,
    /// Upper bound on a single generator call.
    pub stage_timeout: Option<Duration>,
    pub cancel: &'a CancellationToken,
}

impl<'a> StageContext<'a> {
    pub fn new(generator: &'a dyn Generator, cancel: &'a CancellationToken) -> Self {
        Self {
            generator,
            stage_timeout: None,
            cancel,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Run the generator on `prompt` and decode the JSON payload.
    pub async fn invoke(&self, prompt: &str) -> Result<Value, StageError> {
        let text = self.complete(prompt).await?;
        Ok(parse_response(&text)?)
    }

    async fn complete(&self, prompt: &str) -> Result<String, StageError> {
        let call = self.generator.generate(prompt);
        let result = match self.stage_timeout {
            Some(limit) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(StageError::Cancelled),
                res = tokio::time::timeout(limit, call) => match res {
                    Ok(inner) => inner,
                    Err(_) => Err(GenerationUnavailable::new(format!(
                        "generation timed out after {limit:?}"
                    ))),
                },
            },
            None => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(StageError::Cancelled),
                res = call => res,
            },
        };
        Ok(result?)
    }
}

/// A decoded top-level sequence plus whether the key was missing.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted<T> {
    pub items: Vec<T>,
    pub degraded: bool,
}

/// Pull `key` out of a decoded response and decode each element.
///
/// A missing or `null` key yields an empty, degraded result. A response
/// that is not an object, or a key that is not an array, is malformed.
pub fn extract_key<T: DeserializeOwned>(
    stage: Stage,
    value: Value,
    key: &str,
) -> Result<Extracted<T>, MalformedResponse> {
    let Value::Object(mut map) = value else {
        return Err(MalformedResponse::new(format!(
            "expected a JSON object with a {key:?} key"
        )));
    };

    let raw = match map.remove(key) {
        None | Some(Value::Null) => {
            warn!(stage = %stage, key, "response missing expected key; continuing with an empty list");
            return Ok(Extracted {
                items: Vec::new(),
                degraded: true,
            });
        }
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(MalformedResponse::new(format!("{key:?} must be an array")));
        }
    };

    let items = raw
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item)
                .map_err(|e| MalformedResponse::new(format!("{key}[{i}]: {e}")))
        })
        .collect::<Result<Vec<T>, _>>()?;

    Ok(Extracted {
        items,
        degraded: false,
    })
}

/// Log when a stage's output size falls outside the prompted range.
pub(crate) fn check_count(stage: Stage, count: usize, expected: std::ops::RangeInclusive<usize>) {
    if !expected.contains(&count) {
        warn!(
            stage = %stage,
            count,
            min = expected.start(),
            max = expected.end(),
            "generator returned an unexpected number of items"
        );
    }
}

/// Generator returning one fixed completion, for stage unit tests.
#[cfg(test)]
pub(crate) struct Canned(pub &'static str);

#[cfg(test)]
#[async_trait::async_trait]
impl Generator for Canned {
    fn name(&self) -> &str {
        "canned"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, GenerationUnavailable> {
        Ok(self.0.to_string())
    }
}
