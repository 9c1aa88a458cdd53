//! Schedule and milestones as an iCalendar (RFC 5545) file.
//!
//! Each schedule week becomes a week-long all-day event; each milestone with
//! a target date becomes a one-day event.

use chrono::{Days, NaiveDate};

use super::hours;
use crate::model::{Plan, ScheduleWeek};

const PRODID: &str = "-//plannerium//project plan//EN";
const MAX_LINE_OCTETS: usize = 75;

pub fn calendar_ics(plan: &Plan) -> String {
    let stamp = plan.generated_at.format("%Y%m%dT%H%M%SZ").to_string();
    let mut cal = Calendar::default();

    cal.line("BEGIN:VCALENDAR");
    cal.line("VERSION:2.0");
    cal.line(&format!("PRODID:{PRODID}"));
    cal.line("CALSCALE:GREGORIAN");
    cal.line(&format!("X-WR-CALNAME:{}", escape(&plan.goal)));

    for week in &plan.schedule {
        let end = week.week_start.checked_add_days(Days::new(7)).unwrap_or(week.week_start);
        cal.event(
            &format!("{}-week-{}@plannerium", plan.run_id, week.week_number),
            &stamp,
            week.week_start,
            end,
            &week_summary(week),
            &week_description(week),
        );
    }

    for (i, milestone) in plan.milestones.iter().enumerate() {
        let Some(date) = milestone.target_date else {
            continue;
        };
        let end = date.checked_add_days(Days::new(1)).unwrap_or(date);
        cal.event(
            &format!("{}-milestone-{}@plannerium", plan.run_id, i + 1),
            &stamp,
            date,
            end,
            &format!("Milestone: {}", milestone.name),
            &milestone.description,
        );
    }

    cal.line("END:VCALENDAR");
    cal.out
}

fn week_summary(week: &ScheduleWeek) -> String {
    if week.tasks.is_empty() {
        return format!("Week {}: no tasks", week.week_number);
    }
    let titles: Vec<&str> = week.tasks.iter().map(|a| a.task_title.as_str()).collect();
    format!("Week {}: {}", week.week_number, titles.join(", "))
}

fn week_description(week: &ScheduleWeek) -> String {
    let mut lines = vec![format!("{} hours planned", hours(week.hours_planned))];
    for a in &week.tasks {
        lines.push(format!("{} ({}h)", a.task_title, hours(a.hours_assigned)));
    }
    lines.join("\n")
}

#[derive(Default)]
struct Calendar {
    out: String,
}

impl Calendar {
    fn event(
        &mut self,
        uid: &str,
        stamp: &str,
        start: NaiveDate,
        end: NaiveDate,
        summary: &str,
        description: &str,
    ) {
        self.line("BEGIN:VEVENT");
        self.line(&format!("UID:{uid}"));
        self.line(&format!("DTSTAMP:{stamp}"));
        self.line(&format!("DTSTART;VALUE=DATE:{}", start.format("%Y%m%d")));
        self.line(&format!("DTEND;VALUE=DATE:{}", end.format("%Y%m%d")));
        self.line(&format!("SUMMARY:{}", escape(summary)));
        if !description.is_empty() {
            self.line(&format!("DESCRIPTION:{}", escape(description)));
        }
        self.line("END:VEVENT");
    }

    /// Append one content line, folded at 75 octets, CRLF-terminated.
    fn line(&mut self, content: &str) {
        let mut width = 0;
        for ch in content.chars() {
            let len = ch.len_utf8();
            if width + len > MAX_LINE_OCTETS {
                self.out.push_str("\r\n ");
                width = 1;
            }
            self.out.push(ch);
            width += len;
        }
        self.out.push_str("\r\n");
    }
}

/// Escape TEXT values: backslash, semicolon, comma and newlines.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Milestone, PerformanceMetrics, ScheduledTaskAssignment};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample() -> Plan {
        let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        Plan {
            run_id: Uuid::nil(),
            goal: "Ship v1, on time".into(),
            start_date: start,
            deadline: NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(),
            hours_per_week: 10.0,
            milestones: vec![
                Milestone {
                    name: "Beta".into(),
                    description: "Feature complete".into(),
                    target_date: NaiveDate::from_ymd_opt(2025, 2, 14),
                },
                Milestone {
                    name: "Undated".into(),
                    description: String::new(),
                    target_date: None,
                },
            ],
            tasks: vec![],
            schedule: vec![ScheduleWeek {
                week_start: start,
                week_number: 1,
                hours_planned: 6.0,
                tasks: vec![ScheduledTaskAssignment {
                    task_id: "task_1".into(),
                    task_title: "Set up CI".into(),
                    hours_assigned: 6.0,
                    milestone: "Beta".into(),
                }],
            }],
            risks: vec![],
            optimizations: vec![],
            generated_at: Utc::now(),
            performance_metrics: PerformanceMetrics::default(),
        }
    }

    #[test]
    fn calendar_structure() {
        let ics = calendar_ics(&sample());
        assert!(ics.starts_with("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
        assert_eq!(ics.matches("BEGIN:VEVENT").count(), 2, "undated milestone is skipped");
        assert!(ics.contains("DTSTART;VALUE=DATE:20250106\r\n"));
        assert!(ics.contains("DTEND;VALUE=DATE:20250113\r\n"));
        assert!(ics.contains("SUMMARY:Week 1: Set up CI\r\n"));
        assert!(ics.contains("SUMMARY:Milestone: Beta\r\n"));
        assert!(ics.contains("X-WR-CALNAME:Ship v1\\, on time\r\n"));
    }

    #[test]
    fn every_line_is_crlf_terminated() {
        let ics = calendar_ics(&sample());
        assert!(!ics.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn long_lines_are_folded() {
        let mut cal = Calendar::default();
        cal.line(&format!("SUMMARY:{}", "x".repeat(100)));
        let physical: Vec<&str> = cal.out.trim_end().split("\r\n").collect();
        assert_eq!(physical.len(), 2);
        assert!(physical.iter().all(|l| l.len() <= MAX_LINE_OCTETS));
        assert!(physical[1].starts_with(' '));
    }

    #[test]
    fn escapes_text() {
        assert_eq!(escape("a;b,c\\d\ne"), "a\\;b\\,c\\\\d\\ne");
    }
}
