//! Stage 2: score each task for impact, urgency and effort.
//!
//! Scores are merged onto the decomposed tasks by id. The task set itself
//! never changes here: invented ids are ignored, omitted tasks stay
//! unscored, and the priority score and label are always recomputed.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Stage, StageContext, StageError, extract_key};
use crate::model::{SCORE_RANGE, Task};
use crate::prompts::build_prioritization_prompt;
use crate::response::MalformedResponse;

/// Output of the prioritization stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Prioritization {
    pub tasks: Vec<Task>,
    pub degraded: bool,
}

/// Only the fields this stage is allowed to contribute.
#[derive(Debug, Deserialize)]
struct ScoredEntry {
    id: String,
    impact_score: f64,
    urgency_score: f64,
    effort_score: f64,
}

pub async fn prioritize(
    ctx: &StageContext<'_>,
    tasks: &[Task],
) -> Result<Prioritization, StageError> {
    let prompt = build_prioritization_prompt(tasks);
    let value = ctx.invoke(&prompt).await?;
    Ok(merge(tasks, value)?)
}

fn merge(tasks: &[Task], value: Value) -> Result<Prioritization, MalformedResponse> {
    let extracted =
        extract_key::<ScoredEntry>(Stage::Prioritization, value, Stage::Prioritization.key())?;

    let mut scores: HashMap<String, (u8, u8, u8)> = HashMap::new();
    for entry in extracted.items {
        if tasks.iter().all(|t| t.id != entry.id) {
            warn!(task_id = %entry.id, "prioritization scored an unknown task; ignored");
            continue;
        }
        let triple = (
            score(&entry.id, "impact_score", entry.impact_score)?,
            score(&entry.id, "urgency_score", entry.urgency_score)?,
            score(&entry.id, "effort_score", entry.effort_score)?,
        );
        if scores.insert(entry.id.clone(), triple).is_some() {
            warn!(task_id = %entry.id, "task scored more than once; last score wins");
        }
    }

    let merged: Vec<Task> = tasks
        .iter()
        .map(|task| {
            let mut task = task.clone();
            match scores.get(&task.id) {
                Some(&(impact, urgency, effort)) => task.apply_scores(impact, urgency, effort),
                None => {
                    if !extracted.degraded {
                        warn!(task_id = %task.id, "prioritization omitted task; left unscored");
                    }
                }
            }
            task
        })
        .collect();

    debug!(
        scored = merged.iter().filter(|t| t.is_scored()).count(),
        total = merged.len(),
        "prioritization complete"
    );

    Ok(Prioritization {
        tasks: merged,
        degraded: extracted.degraded,
    })
}

fn score(task: &str, field: &str, raw: f64) -> Result<u8, MalformedResponse> {
    let in_range = raw.fract() == 0.0
        && raw >= f64::from(*SCORE_RANGE.start())
        && raw <= f64::from(*SCORE_RANGE.end());
    if !in_range {
        return Err(MalformedResponse::new(format!(
            "task {task:?}: {field} must be an integer in 1..=10, got {raw}"
        )));
    }
    Ok(raw as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Level;
    use serde_json::json;

    fn task(id: &str) -> Task {
        serde_json::from_value(json!({"id": id, "title": id, "estimated_hours": 2})).unwrap()
    }

    #[test]
    fn merges_and_recomputes_priority() {
        let tasks = vec![task("a"), task("b")];
        let out = merge(
            &tasks,
            json!({"tasks": [
                {"id": "a", "impact_score": 8, "urgency_score": 7, "effort_score": 6,
                 "priority_score": 99, "priority_label": "Low", "title": "renamed"},
                {"id": "b", "impact_score": 10, "urgency_score": 10, "effort_score": 2}
            ]}),
        )
        .unwrap();

        assert_eq!(out.tasks[0].priority_score, Some(19));
        assert_eq!(out.tasks[0].priority_label, Some(Level::Medium));
        assert_eq!(out.tasks[0].title, "a", "decomposition fields must not change");
        assert_eq!(out.tasks[1].priority_score, Some(26));
        assert_eq!(out.tasks[1].priority_label, Some(Level::High));
    }

    #[test]
    fn task_set_is_preserved() {
        let tasks = vec![task("a"), task("b")];
        let out = merge(
            &tasks,
            json!({"tasks": [
                {"id": "zzz", "impact_score": 5, "urgency_score": 5, "effort_score": 5},
                {"id": "b", "impact_score": 1, "urgency_score": 1, "effort_score": 1}
            ]}),
        )
        .unwrap();
        let ids: Vec<&str> = out.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(!out.tasks[0].is_scored());
        assert_eq!(out.tasks[1].priority_label, Some(Level::Low));
    }

    #[test]
    fn unknown_id_with_bad_scores_is_ignored() {
        let tasks = vec![task("a")];
        let out = merge(
            &tasks,
            json!({"tasks": [
                {"id": "a", "impact_score": 8, "urgency_score": 7, "effort_score": 6},
                {"id": "ghost", "impact_score": 0, "urgency_score": 42, "effort_score": 1.5}
            ]}),
        )
        .unwrap();
        assert_eq!(out.tasks.len(), 1);
        assert_eq!(out.tasks[0].priority_score, Some(19));
    }

    #[test]
    fn out_of_range_score_is_malformed() {
        let tasks = vec![task("a")];
        for bad in [json!(0), json!(11), json!(7.5)] {
            let err = merge(
                &tasks,
                json!({"tasks": [{"id": "a", "impact_score": bad, "urgency_score": 5, "effort_score": 5}]}),
            )
            .unwrap_err();
            assert!(err.message.contains("impact_score"), "{}", err.message);
        }
    }

    #[test]
    fn whole_float_scores_are_accepted() {
        let tasks = vec![task("a")];
        let out = merge(
            &tasks,
            json!({"tasks": [{"id": "a", "impact_score": 5.0, "urgency_score": 5, "effort_score": 5}]}),
        )
        .unwrap();
        assert_eq!(out.tasks[0].priority_score, Some(15));
    }

    #[test]
    fn missing_key_leaves_tasks_unscored() {
        let tasks = vec![task("a")];
        let out = merge(&tasks, json!({})).unwrap();
        assert!(out.degraded);
        assert_eq!(out.tasks.len(), 1);
        assert!(!out.tasks[0].is_scored());
    }
}
