//! CLI handlers for planning and saved-project commands.
//!
//! Implements:
//! - `plannerium generate <goal>` -- run the planning pipeline
//! - `plannerium list`            -- list saved projects
//! - `plannerium show <name>`     -- show a saved project
//! - `plannerium stats <name>`    -- record progress and show time statistics
//! - `plannerium ask <message>`   -- one-shot planning assistant

use std::fmt::Write as _;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate, Utc};

use plannerium_core::chat;
use plannerium_core::stats::{TimeStatistics, time_statistics};
use plannerium_core::{Generator, Plan, PipelineOptions, PlanRequest, run_pipeline};
use plannerium_store::{ProjectName, ProjectStore, SavedProject};

// -----------------------------------------------------------------------
// plannerium generate <goal>
// -----------------------------------------------------------------------

pub struct GenerateArgs {
    pub goal: String,
    pub start: Option<NaiveDate>,
    pub deadline: NaiveDate,
    pub hours: f64,
    pub json: bool,
    pub save: Option<String>,
}

/// Run the pipeline for one goal and print the result. Ctrl-C abandons the
/// stage in flight.
pub async fn cmd_generate(
    store: &ProjectStore,
    generator: &dyn Generator,
    stage_timeout: Duration,
    args: GenerateArgs,
) -> Result<()> {
    // 1. Validate inputs.
    let start = args.start.unwrap_or_else(|| Local::now().date_naive());
    let request = PlanRequest::new(args.goal, start, args.deadline, args.hours)
        .context("invalid planning request")?;
    let save_as = args.save.as_deref().map(ProjectName::parse).transpose()?;

    // 2. Wire Ctrl-C to the run's cancellation token.
    let options = PipelineOptions::with_timeout(stage_timeout);
    let cancel = options.cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    // 3. Run the pipeline.
    eprintln!(
        "Planning \"{}\" over {} week(s) at {} hours/week using {}...",
        request.goal,
        request.week_count(),
        request.hours_per_week,
        generator.name()
    );
    let result = run_pipeline(&request, generator, &options).await;
    watcher.abort();
    let plan = result?;

    // 4. Print.
    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", format_plan(&plan));
    }

    // 5. Save if asked.
    if let Some(name) = save_as {
        let project = SavedProject::new(name.as_str(), plan);
        let path = store.save(name.as_str(), &project).await?;
        eprintln!("Saved project \"{name}\" to {}", path.display());
    }

    Ok(())
}

// -----------------------------------------------------------------------
// plannerium list
// -----------------------------------------------------------------------

pub async fn cmd_list(store: &ProjectStore) -> Result<()> {
    let names = store.list().await?;

    if names.is_empty() {
        println!(
            "No saved projects in {}. Use `plannerium generate ... --save <name>` to create one.",
            store.dir().display()
        );
        return Ok(());
    }

    let mut projects = Vec::with_capacity(names.len());
    for name in &names {
        match store.load(name).await {
            Ok(Some(project)) => projects.push(project),
            Ok(None) => {}
            Err(e) => tracing::warn!(project = %name, error = %e, "skipping unreadable project"),
        }
    }
    print!("{}", format_project_table(&projects));
    Ok(())
}

// -----------------------------------------------------------------------
// plannerium show <name>
// -----------------------------------------------------------------------

pub async fn cmd_show(store: &ProjectStore, name: &str, json: bool) -> Result<()> {
    let project = load_existing(store, name).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&project)?);
        return Ok(());
    }

    println!("Project:  {}", project.project_name);
    println!("Saved:    {}", project.saved_at.format("%Y-%m-%d %H:%M UTC"));
    println!();
    print!("{}", format_plan(&project.plan));
    Ok(())
}

// -----------------------------------------------------------------------
// plannerium stats <name>
// -----------------------------------------------------------------------

/// Parse a `TASK_ID=HOURS` pair.
pub fn parse_log_entry(raw: &str) -> Result<(String, f64), String> {
    let (task, hours) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TASK_ID=HOURS, got {raw:?}"))?;
    let task = task.trim();
    if task.is_empty() {
        return Err(format!("missing task id in {raw:?}"));
    }
    let hours: f64 = hours
        .trim()
        .parse()
        .map_err(|_| format!("hours must be a number in {raw:?}"))?;
    if !hours.is_finite() || hours < 0.0 {
        return Err(format!("hours must be zero or more in {raw:?}"));
    }
    Ok((task.to_string(), hours))
}

pub async fn cmd_stats(
    store: &ProjectStore,
    name: &str,
    log: &[(String, f64)],
    done: &[String],
    json: bool,
) -> Result<()> {
    // 1. Load.
    let mut project = load_existing(store, name).await?;

    // 2. Apply and persist any new progress.
    if !log.is_empty() || !done.is_empty() {
        let mut tracking = project.time_tracking.clone().unwrap_or_default();
        for (task_id, hours) in log {
            ensure_task(&project.plan, task_id)?;
            tracking.log_hours(task_id.clone(), *hours);
        }
        for task_id in done {
            ensure_task(&project.plan, task_id)?;
            tracking.mark_completed(task_id.clone());
        }
        project = store.update_tracking(name, tracking).await?;
    }

    // 3. Compute and print.
    let stats = time_statistics(&project.plan, project.time_tracking.as_ref(), Utc::now());
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", format_stats(&project.project_name, &stats));
    }
    Ok(())
}

fn ensure_task(plan: &Plan, task_id: &str) -> Result<()> {
    if plan.task(task_id).is_none() {
        bail!("plan has no task {task_id:?}");
    }
    Ok(())
}

// -----------------------------------------------------------------------
// plannerium ask <message>
// -----------------------------------------------------------------------

pub async fn cmd_ask(
    store: &ProjectStore,
    generator: &dyn Generator,
    message: &str,
    project: Option<&str>,
) -> Result<()> {
    let context = match project {
        Some(name) => chat::plan_context(&load_existing(store, name).await?.plan),
        None => String::new(),
    };
    let reply = chat::ask(generator, message, &context)
        .await
        .context("the assistant could not answer")?;
    println!("{reply}");
    Ok(())
}

// -----------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------

async fn load_existing(store: &ProjectStore, name: &str) -> Result<SavedProject> {
    store
        .load(name)
        .await?
        .with_context(|| format!("project {name:?} not found in {}", store.dir().display()))
}

/// Human-readable plan summary: overview, tasks, schedule, risks, suggestions.
fn format_plan(plan: &Plan) -> String {
    let mut out = String::new();
    let m = &plan.performance_metrics;

    let _ = writeln!(out, "Goal:     {}", plan.goal);
    let _ = writeln!(
        out,
        "Timeline: {} to {} at {} hours/week",
        plan.start_date, plan.deadline, plan.hours_per_week
    );
    let _ = writeln!(
        out,
        "Effort:   {} hours estimated, {} hours scheduled",
        m.total_estimated_hours, m.total_scheduled_hours
    );
    let _ = writeln!(
        out,
        "Run:      {} ({:.1}s)",
        plan.run_id, m.total_time_secs
    );
    if !m.degraded_stages.is_empty() {
        let _ = writeln!(
            out,
            "Warning:  incomplete output from {}",
            m.degraded_stages.join(", ")
        );
    }

    if !plan.milestones.is_empty() {
        let _ = writeln!(out, "\nMilestones:");
        for ms in &plan.milestones {
            let due = ms
                .target_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(out, "  {due:<10}  {}", ms.name);
        }
    }

    if !plan.tasks.is_empty() {
        let id_w = plan.tasks.iter().map(|t| t.id.len()).max().unwrap_or(2).max(2);
        let _ = writeln!(out, "\nTasks:");
        let _ = writeln!(
            out,
            "  {:<id_w$}  {:>5}  {:>8}  {:<8}  TITLE",
            "ID", "HOURS", "PRIORITY", "LABEL"
        );
        for t in &plan.tasks {
            let score = t
                .priority_score
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            let label = t
                .priority_label
                .map(|l| l.to_string())
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "  {:<id_w$}  {:>5}  {:>8}  {:<8}  {}",
                t.id, t.estimated_hours, score, label, t.title
            );
        }
    }

    if !plan.schedule.is_empty() {
        let _ = writeln!(out, "\nSchedule:");
        for week in &plan.schedule {
            let titles: Vec<&str> = week.tasks.iter().map(|a| a.task_title.as_str()).collect();
            let _ = writeln!(
                out,
                "  Week {:>2} ({})  {:>5}h  {}",
                week.week_number,
                week.week_start,
                week.hours_planned,
                titles.join(", ")
            );
        }
    }

    if !plan.risks.is_empty() {
        let _ = writeln!(out, "\nRisks:");
        for r in &plan.risks {
            let _ = writeln!(out, "  [{:<6}] {}", r.severity.to_string(), r.description);
            if !r.mitigation.is_empty() {
                let _ = writeln!(out, "           mitigation: {}", r.mitigation);
            }
        }
    }

    if !plan.optimizations.is_empty() {
        let _ = writeln!(out, "\nSuggestions:");
        for o in &plan.optimizations {
            let _ = writeln!(out, "  [{:<6}] {} ({})", o.priority.to_string(), o.title, o.category);
        }
    }

    out
}

fn format_project_table(projects: &[SavedProject]) -> String {
    let name_w = projects
        .iter()
        .map(|p| p.project_name.chars().count())
        .max()
        .unwrap_or(4)
        .max(4);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<name_w$}  {:>5}  {:<10}  SAVED",
        "NAME", "TASKS", "DEADLINE"
    );
    for p in projects {
        let _ = writeln!(
            out,
            "{:<name_w$}  {:>5}  {:<10}  {}",
            p.project_name,
            p.plan.tasks.len(),
            p.plan.deadline.to_string(),
            p.saved_at.format("%Y-%m-%d %H:%M"),
        );
    }
    out
}

fn format_stats(name: &str, stats: &TimeStatistics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Project:    {name}");
    let _ = writeln!(
        out,
        "Progress:   {}/{} tasks ({:.0}%)",
        stats.completed_tasks, stats.total_tasks, stats.progress_percentage
    );
    let _ = writeln!(
        out,
        "Hours:      {} actual / {} estimated (variance {:+})",
        stats.total_actual, stats.total_estimated, stats.variance
    );
    let _ = writeln!(out, "Time left:  {}", stats.time_left);
    let _ = writeln!(
        out,
        "Status:     {}",
        if stats.on_track { "on track" } else { "behind" }
    );
    out
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
