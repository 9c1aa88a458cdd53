//! Stage 3: lay the tasks out across calendar weeks.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Stage, StageContext, StageError, extract_key};
use crate::integrity::check_schedule;
use crate::model::{PlanRequest, ScheduleWeek, ScheduledTaskAssignment, Task};
use crate::prompts::build_scheduling_prompt;
use crate::response::MalformedResponse;

/// Output of the scheduling stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheduling {
    pub weeks: Vec<ScheduleWeek>,
    pub degraded: bool,
}

#[derive(Debug, Deserialize)]
struct RawWeek {
    week_start: NaiveDate,
    week_number: u32,
    #[serde(default)]
    hours_planned: Option<f64>,
    #[serde(default)]
    tasks: Vec<ScheduledTaskAssignment>,
}

pub async fn schedule(
    ctx: &StageContext<'_>,
    tasks: &[Task],
    request: &PlanRequest,
) -> Result<Scheduling, StageError> {
    let prompt = build_scheduling_prompt(tasks, request);
    let value = ctx.invoke(&prompt).await?;
    Ok(normalize(tasks, request, value)?)
}

fn normalize(
    tasks: &[Task],
    request: &PlanRequest,
    value: Value,
) -> Result<Scheduling, MalformedResponse> {
    let extracted = extract_key::<RawWeek>(Stage::Scheduling, value, Stage::Scheduling.key())?;
    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut weeks = Vec::with_capacity(extracted.items.len());
    for raw in extracted.items {
        if raw.week_number == 0 {
            return Err(MalformedResponse::new("schedule week_number must be 1 or greater"));
        }

        let mut assignments = raw.tasks;
        // Fill display fields the generator left blank from the task itself.
        for assignment in &mut assignments {
            if let Some(task) = by_id.get(assignment.task_id.as_str()) {
                if assignment.task_title.is_empty() {
                    assignment.task_title = task.title.clone();
                }
                if assignment.milestone.is_empty() {
                    assignment.milestone = task.milestone.clone();
                }
            }
        }

        let hours_planned = raw
            .hours_planned
            .unwrap_or_else(|| assignments.iter().map(|a| a.hours_assigned).sum());

        weeks.push(ScheduleWeek {
            week_start: raw.week_start,
            week_number: raw.week_number,
            hours_planned,
            tasks: assignments,
        });
    }

    for warning in check_schedule(tasks, &weeks, request.hours_per_week) {
        warn!(stage = %Stage::Scheduling, "{warning}");
    }
    debug!(weeks = weeks.len(), "scheduling complete");

    Ok(Scheduling {
        weeks,
        degraded: extracted.degraded,
    })
}
