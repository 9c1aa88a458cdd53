//! Schedule as CSV, one row per task assignment.

use std::fmt::Write;

use super::hours;
use crate::model::Plan;

pub const HEADER: &str = "Week Start,Week Number,Task Title,Milestone,Hours Assigned";

pub fn schedule_csv(plan: &Plan) -> String {
    let mut out = String::new();
    out.push_str(HEADER);
    out.push_str("\r\n");

    for week in &plan.schedule {
        for assignment in &week.tasks {
            let _ = write!(
                out,
                "{},{},{},{},{}\r\n",
                week.week_start,
                week.week_number,
                field(&assignment.task_title),
                field(&assignment.milestone),
                hours(assignment.hours_assigned),
            );
        }
    }
    out
}

/// Quote a field when it contains a delimiter, quote or line break.
fn field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
