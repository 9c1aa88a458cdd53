//! Self-contained HTML report, also the input to PDF rendering.

use std::fmt::Write;

use html_escape::encode_text;

use super::hours;
use crate::model::{Level, Plan};

const STYLE: &str = r#"
body { font-family: Helvetica, Arial, sans-serif; margin: 2em; color: #222; }
h1 { border-bottom: 2px solid #444; padding-bottom: .2em; }
h2 { margin-top: 1.6em; color: #333; }
table { border-collapse: collapse; width: 100%; margin-top: .5em; }
th, td { border: 1px solid #ccc; padding: 4px 8px; text-align: left; vertical-align: top; }
th { background: #f2f2f2; }
.overview td:first-child { font-weight: bold; width: 12em; }
.level-High { color: #dc3545; font-weight: bold; }
.level-Medium { color: #b8860b; font-weight: bold; }
.level-Low { color: #28a745; font-weight: bold; }
"#;

/// Render the whole plan as one HTML document headed by `title`.
pub fn html_report(plan: &Plan, title: &str) -> String {
    let mut out = String::new();
    let title = encode_text(title);

    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<h1>{title}</h1>\n"
    );

    overview(&mut out, plan);
    milestones(&mut out, plan);
    tasks(&mut out, plan);
    schedule(&mut out, plan);
    risks(&mut out, plan);
    optimizations(&mut out, plan);
    metrics(&mut out, plan);

    out.push_str("</body>\n</html>\n");
    out
}

fn overview(out: &mut String, plan: &Plan) {
    out.push_str("<h2>Project Overview</h2>\n<table class=\"overview\">\n");
    row(out, &["Goal", &plan.goal]);
    row(out, &["Start date", &plan.start_date.to_string()]);
    row(out, &["Deadline", &plan.deadline.to_string()]);
    row(out, &["Hours per week", &hours(plan.hours_per_week)]);
    row(out, &["Total estimated hours", &hours(plan.total_estimated_hours())]);
    row(
        out,
        &["Generated", &plan.generated_at.format("%Y-%m-%d %H:%M UTC").to_string()],
    );
    out.push_str("</table>\n");
}

fn milestones(out: &mut String, plan: &Plan) {
    if plan.milestones.is_empty() {
        return;
    }
    out.push_str("<h2>Milestones</h2>\n<table>\n");
    header(out, &["Milestone", "Description", "Target date"]);
    for m in &plan.milestones {
        let date = m.target_date.map(|d| d.to_string()).unwrap_or_default();
        row(out, &[&m.name, &m.description, &date]);
    }
    out.push_str("</table>\n");
}

fn tasks(out: &mut String, plan: &Plan) {
    out.push_str("<h2>Tasks</h2>\n<table>\n");
    header(
        out,
        &["Task", "Milestone", "Estimated hours", "Priority", "Dependencies"],
    );
    for t in &plan.tasks {
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            encode_text(&t.title),
            encode_text(&t.milestone),
            hours(t.estimated_hours),
            level_cell(t.priority_label, t.priority_score),
            encode_text(&t.dependencies.join(", ")),
        );
    }
    out.push_str("</table>\n");
}

fn schedule(out: &mut String, plan: &Plan) {
    out.push_str("<h2>Weekly Schedule</h2>\n<table>\n");
    header(out, &["Week start", "Week", "Task", "Milestone", "Hours assigned"]);
    for week in &plan.schedule {
        for a in &week.tasks {
            row(
                out,
                &[
                    &week.week_start.to_string(),
                    &format!("Week {}", week.week_number),
                    &a.task_title,
                    &a.milestone,
                    &hours(a.hours_assigned),
                ],
            );
        }
    }
    out.push_str("</table>\n");
}

fn risks(out: &mut String, plan: &Plan) {
    out.push_str("<h2>Risk Analysis</h2>\n<table>\n");
    header(
        out,
        &["Risk", "Probability", "Impact", "Severity", "Mitigation"],
    );
    for r in &plan.risks {
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            encode_text(&r.description),
            level_cell(Some(r.probability), None),
            level_cell(Some(r.impact), None),
            level_cell(Some(r.severity), None),
            encode_text(&r.mitigation),
        );
    }
    out.push_str("</table>\n");
}

fn optimizations(out: &mut String, plan: &Plan) {
    out.push_str("<h2>Optimization Suggestions</h2>\n<table>\n");
    header(out, &["Category", "Suggestion", "Impact", "Priority"]);
    for o in &plan.optimizations {
        let suggestion = if o.description.is_empty() {
            format!("<strong>{}</strong>", encode_text(&o.title))
        } else {
            format!(
                "<strong>{}</strong><br>{}",
                encode_text(&o.title),
                encode_text(&o.description)
            )
        };
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{suggestion}</td><td>{}</td><td>{}</td></tr>\n",
            o.category,
            encode_text(&o.impact),
            level_cell(Some(o.priority), None),
        );
    }
    out.push_str("</table>\n");
}

fn metrics(out: &mut String, plan: &Plan) {
    let m = &plan.performance_metrics;
    out.push_str("<h2>Generation Metrics</h2>\n<table>\n");
    header(out, &["Stage", "Seconds"]);
    for timing in &m.stage_times {
        row(out, &[&timing.stage, &format!("{:.2}", timing.elapsed_secs)]);
    }
    row(out, &["total", &format!("{:.2}", m.total_time_secs)]);
    out.push_str("</table>\n");
    if !m.degraded_stages.is_empty() {
        let _ = write!(
            out,
            "<p><em>Degraded stages: {}</em></p>\n",
            encode_text(&m.degraded_stages.join(", "))
        );
    }
}

fn header(out: &mut String, cells: &[&str]) {
    out.push_str("<tr>");
    for cell in cells {
        let _ = write!(out, "<th>{}</th>", encode_text(cell));
    }
    out.push_str("</tr>\n");
}

fn row(out: &mut String, cells: &[&str]) {
    out.push_str("<tr>");
    for cell in cells {
        let _ = write!(out, "<td>{}</td>", encode_text(cell));
    }
    out.push_str("</tr>\n");
}

fn level_cell(level: Option<Level>, score: Option<u8>) -> String {
    match (level, score) {
        (Some(level), Some(score)) => format!("<span class=\"level-{level}\">{level} ({score})</span>"),
        (Some(level), None) => format!("<span class=\"level-{level}\">{level}</span>"),
        (None, _) => String::new(),
    }
}
