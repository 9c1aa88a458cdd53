//! Stage 5: suggest improvements to the plan.

use serde_json::Value;
use tracing::debug;

use super::{Stage, StageContext, StageError, check_count, extract_key};
use crate::model::{Optimization, Risk, ScheduleWeek, Task};
use crate::prompts::build_optimization_prompt;
use crate::response::MalformedResponse;

/// Output of the optimization stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Optimizations {
    pub items: Vec<Optimization>,
    pub degraded: bool,
}

pub async fn optimize(
    ctx: &StageContext<'_>,
    tasks: &[Task],
    schedule: &[ScheduleWeek],
    risks: &[Risk],
) -> Result<Optimizations, StageError> {
    let prompt = build_optimization_prompt(tasks, schedule, risks);
    let value = ctx.invoke(&prompt).await?;
    Ok(normalize(value)?)
}

fn normalize(value: Value) -> Result<Optimizations, MalformedResponse> {
    let extracted =
        extract_key::<Optimization>(Stage::Optimization, value, Stage::Optimization.key())?;
    if !extracted.degraded {
        check_count(Stage::Optimization, extracted.items.len(), 8..=12);
    }
    debug!(optimizations = extracted.items.len(), "optimization complete");
    Ok(Optimizations {
        items: extracted.items,
        degraded: extracted.degraded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Level, OptimizationCategory};
    use serde_json::json;

    #[test]
    fn categories_are_lenient() {
        let out = normalize(json!({"optimizations": [
            {"category": "scope_reduction", "title": "Cut", "description": "d",
             "impact": "Saves 10 hours", "priority": "high"},
            {"category": "Task-Reordering", "title": "Buffer", "impact": "Fewer slips",
             "priority": "Low"}
        ]}))
        .unwrap();
        assert_eq!(out.items[0].category, OptimizationCategory::ScopeReduction);
        assert_eq!(out.items[0].priority, Level::High);
        assert_eq!(out.items[1].category, OptimizationCategory::TaskReordering);
    }

    #[test]
    fn unknown_category_is_malformed() {
        assert!(
            normalize(json!({"optimizations": [
                {"category": "Vibes", "title": "x", "impact": "y", "priority": "Low"}
            ]}))
            .is_err()
        );
    }
}
