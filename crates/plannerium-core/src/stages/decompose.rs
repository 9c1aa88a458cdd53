//! Stage 1: break the goal into tasks and milestones.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Stage, StageContext, StageError, check_count, extract_key};
use crate::integrity::{check_milestones, validate_tasks};
use crate::model::{Milestone, PlanRequest, Task};
use crate::prompts::build_decomposition_prompt;
use crate::response::MalformedResponse;

/// Output of the decomposition stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    pub tasks: Vec<Task>,
    pub milestones: Vec<Milestone>,
    /// The response had no `tasks` key.
    pub degraded: bool,
}

pub async fn decompose(
    ctx: &StageContext<'_>,
    request: &PlanRequest,
) -> Result<Decomposition, StageError> {
    let prompt = build_decomposition_prompt(request);
    let value = ctx.invoke(&prompt).await?;
    Ok(normalize(value)?)
}

fn normalize(value: Value) -> Result<Decomposition, MalformedResponse> {
    let milestones = decode_milestones(value.get("milestones"))?;
    let extracted = extract_key::<Task>(Stage::Decomposition, value, Stage::Decomposition.key())?;
    let mut tasks = extracted.items;

    // Scores belong to prioritization; drop anything the generator volunteered.
    for task in &mut tasks {
        task.impact_score = None;
        task.urgency_score = None;
        task.effort_score = None;
        task.priority_score = None;
        task.priority_label = None;
    }

    let repairs =
        validate_tasks(&mut tasks).map_err(|e| MalformedResponse::new(e.to_string()))?;
    for warning in repairs.iter().chain(check_milestones(&tasks, &milestones).iter()) {
        warn!(stage = %Stage::Decomposition, "{warning}");
    }

    if !extracted.degraded {
        check_count(Stage::Decomposition, tasks.len(), 8..=15);
    }
    debug!(tasks = tasks.len(), milestones = milestones.len(), "decomposition complete");

    Ok(Decomposition {
        tasks,
        milestones,
        degraded: extracted.degraded,
    })
}

/// Milestones are optional; absence is not a degraded response.
fn decode_milestones(raw: Option<&Value>) -> Result<Vec<Milestone>, MalformedResponse> {
    match raw {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                Milestone::deserialize(item)
                    .map_err(|e| MalformedResponse::new(format!("milestones[{i}]: {e}")))
            })
            .collect(),
        Some(_) => Err(MalformedResponse::new("\"milestones\" must be an array")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::Canned;
    use chrono::NaiveDate;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn request() -> PlanRequest {
        PlanRequest::new(
            "Launch a blog",
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            10.0,
        )
        .unwrap()
    }

    #[test]
    fn decodes_tasks_and_milestones() {
        let out = normalize(json!({
            "milestones": [{"name": "M1", "description": "d", "target_date": "2025-02-01"}],
            "tasks": [
                {"id": "task_1", "title": "A", "milestone": "M1", "estimated_hours": 4},
                {"id": "task_2", "title": "B", "milestone": "M1", "estimated_hours": 6,
                 "dependencies": ["task_1"]}
            ]
        }))
        .unwrap();
        assert_eq!(out.tasks.len(), 2);
        assert_eq!(out.milestones[0].target_date, NaiveDate::from_ymd_opt(2025, 2, 1));
        assert_eq!(out.tasks[1].dependencies, vec!["task_1"]);
        assert!(!out.degraded);
    }

    #[test]
    fn volunteered_scores_are_cleared() {
        let out = normalize(json!({"tasks": [
            {"id": "t", "title": "A", "estimated_hours": 1, "impact_score": 9, "priority_score": 30}
        ]}))
        .unwrap();
        assert!(!out.tasks[0].is_scored());
        assert_eq!(out.tasks[0].impact_score, None);
    }

    #[test]
    fn cycle_is_malformed() {
        let err = normalize(json!({"tasks": [
            {"id": "a", "title": "A", "estimated_hours": 1, "dependencies": ["b"]},
            {"id": "b", "title": "B", "estimated_hours": 1, "dependencies": ["a"]}
        ]}))
        .unwrap_err();
        assert!(err.message.contains("cycle"), "{}", err.message);
    }

    #[test]
    fn missing_tasks_is_degraded() {
        let out = normalize(json!({"milestones": []})).unwrap();
        assert!(out.tasks.is_empty());
        assert!(out.degraded);
    }

    #[test]
    fn bad_date_is_malformed() {
        let err = normalize(json!({
            "milestones": [{"name": "M1", "target_date": "next tuesday"}],
            "tasks": []
        }))
        .unwrap_err();
        assert!(err.message.starts_with("milestones[0]"), "{}", err.message);
    }

    #[tokio::test]
    async fn runs_through_generator() {
        let generator = Canned(
            "```json\n{\"tasks\": [{\"id\": \"task_1\", \"title\": \"Write\", \"estimated_hours\": 3}]}\n```",
        );
        let cancel = CancellationToken::new();
        let ctx = StageContext::new(&generator, &cancel);
        let out = decompose(&ctx, &request()).await.unwrap();
        assert_eq!(out.tasks[0].id, "task_1");
        assert!(out.milestones.is_empty());
    }
}
