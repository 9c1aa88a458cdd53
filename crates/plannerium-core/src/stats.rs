//! Time-tracking statistics for a saved plan.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Plan;

/// Actual hours and completion state recorded against a plan's tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeTracking {
    /// Task id to hours actually spent.
    #[serde(default)]
    pub actual_hours: BTreeMap<String, f64>,
    /// Ids of finished tasks.
    #[serde(default)]
    pub completed: BTreeSet<String>,
}

impl TimeTracking {
    pub fn log_hours(&mut self, task_id: impl Into<String>, hours: f64) {
        *self.actual_hours.entry(task_id.into()).or_insert(0.0) += hours;
    }

    pub fn mark_completed(&mut self, task_id: impl Into<String>) {
        self.completed.insert(task_id.into());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeStatistics {
    pub total_estimated: f64,
    pub total_actual: f64,
    /// `total_actual - total_estimated`; positive means over budget.
    pub variance: f64,
    pub completed_tasks: usize,
    pub total_tasks: usize,
    pub progress_percentage: f64,
    /// `"N days, H hours"` until the deadline, or `"Overdue"`.
    pub time_left: String,
    /// Progress is at least the elapsed fraction of the timeline.
    pub on_track: bool,
}

pub fn time_statistics(
    plan: &Plan,
    tracking: Option<&TimeTracking>,
    now: DateTime<Utc>,
) -> TimeStatistics {
    let empty = TimeTracking::default();
    let tracking = tracking.unwrap_or(&empty);

    let total_estimated = plan.total_estimated_hours();
    let total_actual: f64 = tracking.actual_hours.values().sum();
    let total_tasks = plan.tasks.len();
    let completed_tasks = plan
        .tasks
        .iter()
        .filter(|t| tracking.completed.contains(&t.id))
        .count();
    let progress_percentage = if total_tasks == 0 {
        0.0
    } else {
        completed_tasks as f64 / total_tasks as f64 * 100.0
    };

    let start = midnight(plan.start_date);
    let deadline = midnight(plan.deadline);
    let elapsed_fraction = elapsed_fraction(start, deadline, now);

    TimeStatistics {
        total_estimated,
        total_actual,
        variance: total_actual - total_estimated,
        completed_tasks,
        total_tasks,
        progress_percentage,
        time_left: time_left(deadline, now),
        on_track: progress_percentage >= elapsed_fraction * 100.0,
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn elapsed_fraction(start: DateTime<Utc>, deadline: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let span = (deadline - start).num_seconds();
    if span <= 0 {
        return if now >= deadline { 1.0 } else { 0.0 };
    }
    let elapsed = (now - start).num_seconds() as f64 / span as f64;
    elapsed.clamp(0.0, 1.0)
}

fn time_left(deadline: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = deadline - now;
    if remaining.num_seconds() <= 0 {
        return "Overdue".to_string();
    }
    let days = remaining.num_days();
    let hours = (remaining.num_seconds() % 86_400) / 3_600;
    format!("{days} days, {hours} hours")
}
