//! Shared test utilities for plannerium integration tests.
//!
//! Provides a scripted [`Generator`] that replays canned completions in
//! order, canned stage responses describing one small consistent plan, and
//! helpers for requests and scratch storage directories.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;

use plannerium_core::generator::{GenerationUnavailable, Generator};
use plannerium_core::model::{Plan, PlanRequest};
use plannerium_core::{PipelineOptions, run_pipeline};

// ---------------------------------------------------------------------------
// Scripted generator
// ---------------------------------------------------------------------------

/// Replays queued results, one per `generate` call, and records every prompt.
///
/// Once the script runs out every further call fails with
/// `GenerationUnavailable("script exhausted")`.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, GenerationUnavailable>>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new(script: impl IntoIterator<Item = Result<String, GenerationUnavailable>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Script made only of successful completions.
    pub fn ok<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Self {
        Self::new(responses.into_iter().map(|r| Ok(r.into())))
    }

    /// All five stages succeed with the canned plan.
    pub fn happy_path() -> Self {
        Self::ok(happy_path_responses())
    }

    /// Sleep this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `generate` calls made so far.
    pub fn calls(&self) -> usize {
        self.prompts.lock().expect("prompt log poisoned").len()
    }

    /// Every prompt received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log poisoned").clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationUnavailable> {
        self.prompts
            .lock()
            .expect("prompt log poisoned")
            .push(prompt.to_string());
        let next = self.script.lock().expect("script poisoned").pop_front();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        next.unwrap_or_else(|| Err(GenerationUnavailable::new("script exhausted")))
    }
}

// ---------------------------------------------------------------------------
// Canned stage responses
// ---------------------------------------------------------------------------

/// Decomposition: three chained tasks across two milestones, fenced.
pub fn decomposition_response() -> String {
    let body = json!({
        "milestones": [
            {"name": "Foundation", "description": "Site is live", "target_date": "2025-03-14"},
            {"name": "Content", "description": "First posts published", "target_date": "2025-03-28"}
        ],
        "tasks": [
            {"id": "task_1", "title": "Choose a platform", "description": "Compare hosted options",
             "milestone": "Foundation", "estimated_hours": 4, "dependencies": [],
             "deliverable": "Platform decision"},
            {"id": "task_2", "title": "Set up the site", "description": "Theme, domain, analytics",
             "milestone": "Foundation", "estimated_hours": 8, "dependencies": ["task_1"],
             "deliverable": "Live site"},
            {"id": "task_3", "title": "Write first posts", "description": "Three launch posts",
             "milestone": "Content", "estimated_hours": 12, "dependencies": ["task_2"],
             "deliverable": "Published posts"}
        ]
    });
    format!("Here is the breakdown:\n```json\n{body:#}\n```\n")
}

/// Prioritization: scores for every decomposed task.
pub fn prioritization_response() -> String {
    json!({
        "tasks": [
            {"id": "task_1", "impact_score": 8, "urgency_score": 7, "effort_score": 6},
            {"id": "task_2", "impact_score": 9, "urgency_score": 9, "effort_score": 2},
            {"id": "task_3", "impact_score": 2, "urgency_score": 2, "effort_score": 9}
        ]
    })
    .to_string()
}

/// Scheduling: three weeks within a 10 hour budget.
pub fn scheduling_response() -> String {
    let body = json!({
        "schedule": [
            {"week_start": "2025-03-03", "week_number": 1, "hours_planned": 10,
             "tasks": [
                {"task_id": "task_1", "task_title": "Choose a platform", "hours_assigned": 4, "milestone": "Foundation"},
                {"task_id": "task_2", "task_title": "Set up the site", "hours_assigned": 6, "milestone": "Foundation"}
             ]},
            {"week_start": "2025-03-10", "week_number": 2, "hours_planned": 10,
             "tasks": [
                {"task_id": "task_2", "task_title": "Set up the site", "hours_assigned": 2, "milestone": "Foundation"},
                {"task_id": "task_3", "task_title": "Write first posts", "hours_assigned": 8, "milestone": "Content"}
             ]},
            {"week_start": "2025-03-17", "week_number": 3, "hours_planned": 4,
             "tasks": [
                {"task_id": "task_3", "task_title": "Write first posts", "hours_assigned": 4, "milestone": "Content"}
             ]}
        ]
    });
    format!("```\n{body}\n```")
}

pub fn risk_response() -> String {
    json!({
        "risks": [
            {"id": "risk_1", "description": "Platform limits custom themes",
             "probability": "Medium", "impact": "Medium", "severity": "Medium",
             "mitigation": "Trial two platforms before committing"},
            {"id": "risk_2", "description": "Writing takes longer than planned",
             "probability": "High", "impact": "High", "severity": "High",
             "mitigation": "Outline all posts in week one"}
        ]
    })
    .to_string()
}

pub fn optimization_response() -> String {
    json!({
        "optimizations": [
            {"category": "Scope Reduction", "title": "Launch with two posts",
             "description": "Publish the third post after launch",
             "impact": "Saves 4 hours", "priority": "High"},
            {"category": "Task Reordering", "title": "Draft posts while the site is set up",
             "description": "Writing does not need the live site",
             "impact": "Finishes a week earlier", "priority": "Medium"}
        ]
    })
    .to_string()
}

/// The five canned responses in stage order.
pub fn happy_path_responses() -> Vec<String> {
    vec![
        decomposition_response(),
        prioritization_response(),
        scheduling_response(),
        risk_response(),
        optimization_response(),
    ]
}

// ---------------------------------------------------------------------------
// Inputs and scratch space
// ---------------------------------------------------------------------------

/// Request matching the canned responses: four weeks at 10 hours.
pub fn sample_request() -> PlanRequest {
    PlanRequest::new(
        "Launch a personal blog",
        date("2025-03-03"),
        date("2025-03-28"),
        10.0,
    )
    .expect("sample request is valid")
}

/// Plan produced by running the pipeline over the canned responses.
pub async fn sample_plan() -> Plan {
    let generator = ScriptedGenerator::happy_path();
    run_pipeline(&sample_request(), &generator, &PipelineOptions::default())
        .await
        .expect("canned responses form a valid plan")
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid YYYY-MM-DD date")
}

/// Fresh temporary directory, removed when the guard drops.
pub fn temp_store_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("failed to create temp dir")
}
