//! Prompt construction for the five planning stages and the chat assistant.
//!
//! Every builder is a pure function of its inputs: no clock reads, no I/O,
//! no generator calls. Identical inputs produce byte-identical prompts.

use serde::Serialize;

use crate::model::{OptimizationCategory, PlanRequest, Risk, ScheduleWeek, Task};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Render upstream data as indented JSON for inclusion in a prompt.
fn dump<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_string_pretty(value) {
        Ok(s) => s,
        Err(_) => "[]".to_string(),
    }
}

const JSON_ONLY: &str = "Respond with the JSON object only. You may wrap it in a ```json fenced block, \
                         but do not add commentary outside of it.\n";

// ---------------------------------------------------------------------------
// Stage 1: decomposition
// ---------------------------------------------------------------------------

const DECOMPOSITION_SHAPE: &str = r#"{
  "tasks": [
    {
      "id": "task_1",
      "title": "Task name",
      "description": "Detailed description",
      "milestone": "Milestone name",
      "estimated_hours": 8,
      "dependencies": [],
      "deliverable": "What will be delivered"
    }
  ],
  "milestones": [
    {
      "name": "Milestone name",
      "description": "Milestone description",
      "target_date": "YYYY-MM-DD"
    }
  ]
}"#;

/// Stage 1: break the goal into milestones and tasks.
pub fn build_decomposition_prompt(request: &PlanRequest) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str(
        "You are a project decomposition expert. Break down the following goal \
         into a structured project plan.\n\n",
    );
    prompt.push_str(&format!("Goal: {}\n", request.goal));
    prompt.push_str(&format!(
        "Start Date: {}\n",
        request.start_date.format(DATE_FORMAT)
    ));
    prompt.push_str(&format!("Deadline: {}\n", request.deadline.format(DATE_FORMAT)));
    prompt.push_str(&format!(
        "Available Hours per Week: {}\n\n",
        request.hours_per_week
    ));

    prompt.push_str("Return a JSON object with this exact structure:\n");
    prompt.push_str(DECOMPOSITION_SHAPE);
    prompt.push_str("\n\n");

    prompt.push_str("Requirements:\n");
    prompt.push_str("- Create 8-15 tasks that comprehensively cover the goal\n");
    prompt.push_str("- Each task should be specific and actionable\n");
    prompt.push_str("- Give every task a unique id (task_1, task_2, ...) and never reuse one\n");
    prompt.push_str(
        "- Include realistic time estimates in positive hours (total should fit within the timeline)\n",
    );
    prompt.push_str(
        "- List dependencies by task id; a task must not depend on itself and dependencies must not form a cycle\n",
    );
    prompt.push_str("- Group tasks into logical milestones; every task's milestone must name one of the milestones\n");
    prompt.push_str(&format!(
        "- Ensure tasks can be completed by one person working {} hours per week\n",
        request.hours_per_week
    ));
    prompt.push_str("- Dates use the YYYY-MM-DD format\n\n");
    prompt.push_str(JSON_ONLY);

    prompt
}

// ---------------------------------------------------------------------------
// Stage 2: prioritization
// ---------------------------------------------------------------------------

const PRIORITIZATION_SHAPE: &str = r#"{
  "tasks": [
    {
      "id": "task_1",
      "title": "Task name",
      "description": "Task description",
      "milestone": "Milestone name",
      "estimated_hours": 8,
      "dependencies": [],
      "deliverable": "What will be delivered",
      "impact_score": 8,
      "urgency_score": 7,
      "effort_score": 6,
      "priority_score": 19,
      "priority_label": "Medium"
    }
  ]
}"#;

/// Stage 2: score every task on impact, urgency and effort.
pub fn build_prioritization_prompt(tasks: &[Task]) -> String {
    let mut prompt = String::with_capacity(2048 + tasks.len() * 256);

    prompt.push_str(
        "You are a task prioritization expert. Analyze these tasks and assign priority scores.\n\n",
    );
    prompt.push_str("Tasks:\n");
    prompt.push_str(&dump(tasks));
    prompt.push_str("\n\n");

    prompt.push_str("For each task, evaluate:\n");
    prompt.push_str("1. Impact (1-10): How much this task contributes to the overall goal\n");
    prompt.push_str("2. Urgency (1-10): How time-sensitive this task is\n");
    prompt.push_str("3. Effort (1-10): How much work this task requires (higher = more effort)\n\n");

    prompt.push_str("Return the tasks with added priority fields:\n");
    prompt.push_str(PRIORITIZATION_SHAPE);
    prompt.push_str("\n\n");

    prompt.push_str("Priority Score = Impact + Urgency + (10 - Effort)\n");
    prompt.push_str("Priority Labels:\n");
    prompt.push_str("- High: Score 22 or more\n");
    prompt.push_str("- Medium: Score 15-21\n");
    prompt.push_str("- Low: Score 3-14\n\n");

    prompt.push_str(
        "Return exactly the same set of tasks: keep every id unchanged, do not add or drop tasks, \
         and keep all original task fields. Scores must be whole numbers from 1 to 10.\n\n",
    );
    prompt.push_str(JSON_ONLY);

    prompt
}

// ---------------------------------------------------------------------------
// Stage 3: scheduling
// ---------------------------------------------------------------------------

const SCHEDULING_SHAPE: &str = r#"{
  "schedule": [
    {
      "week_start": "YYYY-MM-DD",
      "week_number": 1,
      "hours_planned": 15,
      "tasks": [
        {
          "task_id": "task_1",
          "task_title": "Task name",
          "hours_assigned": 8,
          "milestone": "Milestone name"
        }
      ]
    }
  ]
}"#;

/// Stage 3: lay tasks out week by week.
pub fn build_scheduling_prompt(tasks: &[Task], request: &PlanRequest) -> String {
    let mut prompt = String::with_capacity(2048 + tasks.len() * 256);
    let hours = request.hours_per_week;

    prompt.push_str(
        "You are a project scheduling expert. Create a week-by-week schedule for these tasks.\n\n",
    );
    prompt.push_str("Tasks:\n");
    prompt.push_str(&dump(tasks));
    prompt.push('\n');
    prompt.push_str(&format!(
        "Start Date: {}\n",
        request.start_date.format(DATE_FORMAT)
    ));
    prompt.push_str(&format!("Deadline: {}\n", request.deadline.format(DATE_FORMAT)));
    prompt.push_str(&format!("Available Hours per Week: {hours}\n"));
    prompt.push_str(&format!("Number of Weeks: {}\n\n", request.week_count()));

    prompt.push_str("Create a schedule that:\n");
    prompt.push_str("1. Respects task dependencies\n");
    prompt.push_str(&format!("2. Doesn't exceed {hours} hours per week\n"));
    prompt.push_str("3. Spreads work evenly across weeks\n");
    prompt.push_str("4. Meets the deadline\n\n");

    prompt.push_str("Return a JSON object:\n");
    prompt.push_str(SCHEDULING_SHAPE);
    prompt.push_str("\n\n");

    prompt.push_str("Schedule Requirements:\n");
    prompt.push_str("- Create one weekly entry per calendar week from start date to deadline\n");
    prompt.push_str("- Number weeks sequentially starting at 1\n");
    prompt.push_str("- Assign specific hours to specific tasks each week, referencing tasks by id\n");
    prompt.push_str(
        "- A task may be split across several weeks; its assigned hours should add up to its estimate\n",
    );
    prompt.push_str(&format!(
        "- Ensure no week's hours_planned exceeds {hours} hours\n"
    ));
    prompt.push_str(
        "- Respect task dependencies (don't schedule dependent tasks before prerequisites)\n\n",
    );
    prompt.push_str(JSON_ONLY);

    prompt
}

// ---------------------------------------------------------------------------
// Stage 4: risk analysis
// ---------------------------------------------------------------------------

const RISK_SHAPE: &str = r#"{
  "risks": [
    {
      "id": "risk_1",
      "description": "Technical complexity may cause delays",
      "probability": "Medium",
      "impact": "High",
      "severity": "High",
      "mitigation": "Break down complex tasks earlier, allocate buffer time"
    }
  ]
}"#;

/// Stage 4: identify the project's main risks.
pub fn build_risk_prompt(tasks: &[Task], schedule: &[ScheduleWeek]) -> String {
    let mut prompt = String::with_capacity(2048 + tasks.len() * 256 + schedule.len() * 256);

    prompt.push_str(
        "You are a risk analysis expert. Identify potential risks for this project.\n\n",
    );
    prompt.push_str("Tasks:\n");
    prompt.push_str(&dump(tasks));
    prompt.push_str("\nSchedule:\n");
    prompt.push_str(&dump(schedule));
    prompt.push_str("\n\n");

    prompt.push_str(
        "Identify 5-8 specific risks that could impact this project. For each risk, provide:\n",
    );
    prompt.push_str("- Risk description\n");
    prompt.push_str("- Probability (High/Medium/Low)\n");
    prompt.push_str("- Impact (High/Medium/Low)\n");
    prompt.push_str("- Severity (High/Medium/Low based on probability and impact)\n");
    prompt.push_str("- Mitigation strategy\n\n");

    prompt.push_str("Return a JSON object:\n");
    prompt.push_str(RISK_SHAPE);
    prompt.push_str("\n\n");

    prompt.push_str(
        "Focus on realistic, specific risks that could actually occur during project execution.\n\n",
    );
    prompt.push_str(JSON_ONLY);

    prompt
}

// ---------------------------------------------------------------------------
// Stage 5: optimization
// ---------------------------------------------------------------------------

const OPTIMIZATION_SHAPE: &str = r#"{
  "optimizations": [
    {
      "category": "Scope Reduction",
      "title": "Simplify authentication system",
      "description": "Instead of building custom auth, use a third-party service",
      "impact": "Saves 16 hours, reduces risk",
      "priority": "High"
    }
  ]
}"#;

fn category_blurb(category: OptimizationCategory) -> &'static str {
    match category {
        OptimizationCategory::ScopeReduction => "Ways to simplify or reduce project scope",
        OptimizationCategory::TimelineAdjustment => "Ways to optimize the schedule",
        OptimizationCategory::TaskReordering => "Better ways to sequence tasks",
        OptimizationCategory::TaskCompression => "Ways to combine or streamline tasks",
        OptimizationCategory::ResourceOptimization => "Better use of available hours",
    }
}

/// Stage 5: suggest improvements to scope, timeline and task organization.
pub fn build_optimization_prompt(
    tasks: &[Task],
    schedule: &[ScheduleWeek],
    risks: &[Risk],
) -> String {
    let mut prompt = String::with_capacity(
        2048 + tasks.len() * 256 + schedule.len() * 256 + risks.len() * 256,
    );

    prompt.push_str(
        "You are a project optimization expert. Analyze this project and suggest improvements.\n\n",
    );
    prompt.push_str("Tasks:\n");
    prompt.push_str(&dump(tasks));
    prompt.push_str("\nSchedule:\n");
    prompt.push_str(&dump(schedule));
    prompt.push_str("\nRisks:\n");
    prompt.push_str(&dump(risks));
    prompt.push_str("\n\n");

    prompt.push_str("Provide specific, actionable optimizations in these categories:\n");
    for (i, category) in OptimizationCategory::ALL.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. {} - {}\n",
            i + 1,
            category,
            category_blurb(*category)
        ));
    }
    prompt.push('\n');

    prompt.push_str("Return a JSON object:\n");
    prompt.push_str(OPTIMIZATION_SHAPE);
    prompt.push_str("\n\n");

    prompt.push_str(
        "Provide 8-12 specific optimizations that would meaningfully improve the project plan. \
         The category must be exactly one of the five names above and the priority one of High, Medium, or Low.\n\n",
    );
    prompt.push_str(JSON_ONLY);

    prompt
}

// ---------------------------------------------------------------------------
// Chat assistant
// ---------------------------------------------------------------------------

/// Free-form planning assistant prompt. `context` is typically a short
/// summary of the plan the user is looking at.
pub fn build_chat_prompt(message: &str, context: &str) -> String {
    let mut prompt = String::with_capacity(512 + message.len() + context.len());
    prompt.push_str(
        "You are Plannerium's AI assistant, helping users with project planning and management.\n\n",
    );
    if context.trim().is_empty() {
        prompt.push_str("Context: none provided\n\n");
    } else {
        prompt.push_str(&format!("Context: {}\n\n", context.trim()));
    }
    prompt.push_str(&format!("User Question: {}\n\n", message.trim()));
    prompt.push_str(
        "Please provide a helpful, concise response focused on project planning, \
         task management, and productivity.",
    );
    prompt
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Level, ScheduledTaskAssignment};
    use chrono::NaiveDate;

    fn request() -> PlanRequest {
        PlanRequest::new(
            "Launch a personal blog",
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 30).unwrap(),
            10.0,
        )
        .unwrap()
    }

    fn tasks() -> Vec<Task> {
        vec![Task {
            id: "task_1".into(),
            title: "Pick a platform".into(),
            description: "Compare static site generators".into(),
            milestone: "Setup".into(),
            estimated_hours: 3.0,
            dependencies: vec![],
            deliverable: "Decision doc".into(),
            impact_score: None,
            urgency_score: None,
            effort_score: None,
            priority_score: None,
            priority_label: None,
        }]
    }

    fn schedule() -> Vec<ScheduleWeek> {
        vec![ScheduleWeek {
            week_start: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            week_number: 1,
            hours_planned: 3.0,
            tasks: vec![ScheduledTaskAssignment {
                task_id: "task_1".into(),
                task_title: "Pick a platform".into(),
                hours_assigned: 3.0,
                milestone: "Setup".into(),
            }],
        }]
    }

    fn risks() -> Vec<Risk> {
        vec![Risk {
            id: "risk_1".into(),
            description: "Platform lock-in".into(),
            probability: Level::Low,
            impact: Level::Medium,
            severity: Level::Low,
            mitigation: "Keep content in markdown".into(),
        }]
    }

    // -- decomposition --

    #[test]
    fn decomposition_embeds_inputs() {
        let prompt = build_decomposition_prompt(&request());
        assert!(prompt.contains("Goal: Launch a personal blog"));
        assert!(prompt.contains("Start Date: 2025-03-03"));
        assert!(prompt.contains("Deadline: 2025-03-30"));
        assert!(prompt.contains("Available Hours per Week: 10\n"));
        assert!(prompt.contains("working 10 hours per week"));
    }

    #[test]
    fn decomposition_states_shape_and_count() {
        let prompt = build_decomposition_prompt(&request());
        assert!(prompt.contains("\"tasks\": ["));
        assert!(prompt.contains("\"milestones\": ["));
        assert!(prompt.contains("\"estimated_hours\""));
        assert!(prompt.contains("8-15 tasks"));
    }

    #[test]
    fn fractional_hours_render_as_given() {
        let mut req = request();
        req.hours_per_week = 7.5;
        assert!(build_decomposition_prompt(&req).contains("Available Hours per Week: 7.5"));
    }

    // -- prioritization --

    #[test]
    fn prioritization_dumps_tasks_and_formula() {
        let prompt = build_prioritization_prompt(&tasks());
        assert!(prompt.contains("\"id\": \"task_1\""));
        assert!(prompt.contains("Compare static site generators"));
        assert!(prompt.contains("Priority Score = Impact + Urgency + (10 - Effort)"));
        assert!(prompt.contains("Medium: Score 15-21"));
        assert!(prompt.contains("\"priority_label\": \"Medium\""));
    }

    #[test]
    fn prioritization_handles_empty_tasks() {
        let prompt = build_prioritization_prompt(&[]);
        assert!(prompt.contains("Tasks:\n[]"));
    }

    // -- scheduling --

    #[test]
    fn scheduling_embeds_limits() {
        let prompt = build_scheduling_prompt(&tasks(), &request());
        assert!(prompt.contains("Doesn't exceed 10 hours per week"));
        assert!(prompt.contains("Number of Weeks: 4"));
        assert!(prompt.contains("\"schedule\": ["));
        assert!(prompt.contains("\"hours_assigned\""));
    }

    // -- risk --

    #[test]
    fn risk_prompt_includes_tasks_and_schedule() {
        let prompt = build_risk_prompt(&tasks(), &schedule());
        assert!(prompt.contains("Pick a platform"));
        assert!(prompt.contains("\"week_number\": 1"));
        assert!(prompt.contains("5-8 specific risks"));
        assert!(prompt.contains("\"risks\": ["));
    }

    // -- optimization --

    #[test]
    fn optimization_lists_all_categories() {
        let prompt = build_optimization_prompt(&tasks(), &schedule(), &risks());
        for category in OptimizationCategory::ALL {
            assert!(prompt.contains(&category.to_string()), "missing {category}");
        }
        assert!(prompt.contains("1. Scope Reduction - "));
        assert!(prompt.contains("5. Resource Optimization - "));
        assert!(prompt.contains("Platform lock-in"));
        assert!(prompt.contains("8-12 specific optimizations"));
    }

    // -- determinism --

    #[test]
    fn builders_are_idempotent() {
        let req = request();
        assert_eq!(build_decomposition_prompt(&req), build_decomposition_prompt(&req));
        assert_eq!(
            build_prioritization_prompt(&tasks()),
            build_prioritization_prompt(&tasks())
        );
        assert_eq!(
            build_scheduling_prompt(&tasks(), &req),
            build_scheduling_prompt(&tasks(), &req)
        );
        assert_eq!(
            build_risk_prompt(&tasks(), &schedule()),
            build_risk_prompt(&tasks(), &schedule())
        );
        assert_eq!(
            build_optimization_prompt(&tasks(), &schedule(), &risks()),
            build_optimization_prompt(&tasks(), &schedule(), &risks())
        );
    }

    #[test]
    fn every_stage_prompt_asks_for_json_only() {
        let req = request();
        for prompt in [
            build_decomposition_prompt(&req),
            build_prioritization_prompt(&tasks()),
            build_scheduling_prompt(&tasks(), &req),
            build_risk_prompt(&tasks(), &schedule()),
            build_optimization_prompt(&tasks(), &schedule(), &risks()),
        ] {
            assert!(prompt.ends_with(JSON_ONLY));
        }
    }

    // -- chat --

    #[test]
    fn chat_prompt_with_and_without_context() {
        let with = build_chat_prompt("How do I split this?", "Blog plan, 4 weeks");
        assert!(with.contains("Context: Blog plan, 4 weeks"));
        assert!(with.contains("User Question: How do I split this?"));

        let without = build_chat_prompt("Hi", "   ");
        assert!(without.contains("Context: none provided"));
    }
}
