//! Plan data model.
//!
//! Every entity refers to others by identifying string only (task ids,
//! milestone names). Nothing holds a live reference, so a dangling reference
//! is just an id that no longer appears in the owning collection.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Three-step qualitative scale used for risk probability/impact/severity,
/// optimization priority, and task priority labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        };
        f.write_str(s)
    }
}

impl FromStr for Level {
    type Err = LevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(LevelParseError(s.to_owned())),
        }
    }
}

impl TryFrom<String> for Level {
    type Error = LevelParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Error returned when parsing an invalid [`Level`] string.
#[derive(Debug, Clone, Error)]
#[error("invalid level {0:?} (expected Low, Medium, or High)")]
pub struct LevelParseError(pub String);

// ---------------------------------------------------------------------------

/// The fixed label set an optimization suggestion is tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum OptimizationCategory {
    #[serde(rename = "Scope Reduction")]
    ScopeReduction,
    #[serde(rename = "Timeline Adjustment")]
    TimelineAdjustment,
    #[serde(rename = "Task Reordering")]
    TaskReordering,
    #[serde(rename = "Task Compression")]
    TaskCompression,
    #[serde(rename = "Resource Optimization")]
    ResourceOptimization,
}

impl OptimizationCategory {
    /// All categories, in the order they are presented to the generator.
    pub const ALL: [OptimizationCategory; 5] = [
        Self::ScopeReduction,
        Self::TimelineAdjustment,
        Self::TaskReordering,
        Self::TaskCompression,
        Self::ResourceOptimization,
    ];
}

impl fmt::Display for OptimizationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ScopeReduction => "Scope Reduction",
            Self::TimelineAdjustment => "Timeline Adjustment",
            Self::TaskReordering => "Task Reordering",
            Self::TaskCompression => "Task Compression",
            Self::ResourceOptimization => "Resource Optimization",
        };
        f.write_str(s)
    }
}

impl FromStr for OptimizationCategory {
    type Err = CategoryParseError;

    /// Case-insensitive; spaces, underscores and hyphens are interchangeable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .map(|c| match c {
                '_' | '-' => ' ',
                c => c.to_ascii_lowercase(),
            })
            .collect();
        match key.split_whitespace().collect::<Vec<_>>().join(" ").as_str() {
            "scope reduction" => Ok(Self::ScopeReduction),
            "timeline adjustment" => Ok(Self::TimelineAdjustment),
            "task reordering" => Ok(Self::TaskReordering),
            "task compression" => Ok(Self::TaskCompression),
            "resource optimization" => Ok(Self::ResourceOptimization),
            _ => Err(CategoryParseError(s.to_owned())),
        }
    }
}

impl TryFrom<String> for OptimizationCategory {
    type Error = CategoryParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Error returned when parsing an invalid [`OptimizationCategory`] string.
#[derive(Debug, Clone, Error)]
#[error("invalid optimization category {0:?}")]
pub struct CategoryParseError(pub String);

// ---------------------------------------------------------------------------
// Priority arithmetic
// ---------------------------------------------------------------------------

/// Lowest and highest value accepted for impact, urgency and effort scores.
pub const SCORE_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

/// `impact + urgency + (10 - effort)`. Inputs are expected in [`SCORE_RANGE`].
pub fn priority_score(impact: u8, urgency: u8, effort: u8) -> u8 {
    impact + urgency + (10 - effort.min(10))
}

/// Map a priority score to its label: 22 and above is High, 15-21 Medium,
/// anything lower Low.
pub fn priority_label(score: u8) -> Level {
    match score {
        22..=u8::MAX => Level::High,
        15..=21 => Level::Medium,
        _ => Level::Low,
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A unit of work. Created by decomposition, enriched with scores by
/// prioritization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Stable identifier, unique within a plan.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Name of the milestone this task belongs to.
    #[serde(default)]
    pub milestone: String,
    pub estimated_hours: f64,
    /// Ids of tasks that must precede this one.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub deliverable: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_label: Option<Level>,
}

impl Task {
    /// Apply impact/urgency/effort scores and derive the priority fields.
    pub fn apply_scores(&mut self, impact: u8, urgency: u8, effort: u8) {
        let score = priority_score(impact, urgency, effort);
        self.impact_score = Some(impact);
        self.urgency_score = Some(urgency);
        self.effort_score = Some(effort);
        self.priority_score = Some(score);
        self.priority_label = Some(priority_label(score));
    }

    /// Whether prioritization assigned scores to this task.
    pub fn is_scored(&self) -> bool {
        self.priority_score.is_some()
    }
}

/// A named grouping of tasks. Never mutated after decomposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
}

/// Hours of one task placed into one schedule week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTaskAssignment {
    pub task_id: String,
    #[serde(default)]
    pub task_title: String,
    pub hours_assigned: f64,
    #[serde(default)]
    pub milestone: String,
}

/// One calendar week of the schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleWeek {
    pub week_start: NaiveDate,
    /// 1-based sequential week number.
    pub week_number: u32,
    pub hours_planned: f64,
    #[serde(default)]
    pub tasks: Vec<ScheduledTaskAssignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub id: String,
    pub description: String,
    pub probability: Level,
    pub impact: Level,
    pub severity: Level,
    #[serde(default)]
    pub mitigation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Optimization {
    pub category: OptimizationCategory,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Free-text impact, e.g. "Saves 16 hours, reduces risk".
    #[serde(default)]
    pub impact: String,
    pub priority: Level,
}

// ---------------------------------------------------------------------------
// Pipeline input
// ---------------------------------------------------------------------------

/// Errors from validating pipeline inputs.
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("goal must not be empty")]
    EmptyGoal,

    #[error("start date {start} is after deadline {deadline}")]
    StartAfterDeadline { start: NaiveDate, deadline: NaiveDate },

    #[error("hours per week must be a positive number, got {0}")]
    InvalidHoursPerWeek(f64),
}

/// Validated inputs for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub goal: String,
    pub start_date: NaiveDate,
    pub deadline: NaiveDate,
    pub hours_per_week: f64,
}

impl PlanRequest {
    /// Build a request, rejecting an empty goal, a start date after the
    /// deadline, and non-positive hours.
    pub fn new(
        goal: impl Into<String>,
        start_date: NaiveDate,
        deadline: NaiveDate,
        hours_per_week: f64,
    ) -> Result<Self, RequestError> {
        let goal = goal.into().trim().to_string();
        if goal.is_empty() {
            return Err(RequestError::EmptyGoal);
        }
        if start_date > deadline {
            return Err(RequestError::StartAfterDeadline {
                start: start_date,
                deadline,
            });
        }
        if !hours_per_week.is_finite() || hours_per_week <= 0.0 {
            return Err(RequestError::InvalidHoursPerWeek(hours_per_week));
        }
        Ok(Self {
            goal,
            start_date,
            deadline,
            hours_per_week,
        })
    }

    /// Number of calendar weeks touched by `[start_date, deadline]`.
    pub fn week_count(&self) -> u32 {
        let days = (self.deadline - self.start_date).num_days().max(0);
        (days / 7 + 1) as u32
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Elapsed wall time of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: String,
    pub elapsed_secs: f64,
}

/// Timing and size summary attached to every plan.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_time_secs: f64,
    pub stage_times: Vec<StageTiming>,
    pub task_count: usize,
    pub milestone_count: usize,
    pub schedule_weeks: usize,
    pub risk_count: usize,
    pub optimization_count: usize,
    pub total_estimated_hours: f64,
    pub total_scheduled_hours: f64,
    /// Stages whose response lacked the expected top-level key.
    #[serde(default)]
    pub degraded_stages: Vec<String>,
}

/// Final output of a pipeline run. Built once by the driver and never
/// mutated by this crate afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub run_id: Uuid,
    pub goal: String,
    pub start_date: NaiveDate,
    pub deadline: NaiveDate,
    pub hours_per_week: f64,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    pub tasks: Vec<Task>,
    pub schedule: Vec<ScheduleWeek>,
    pub risks: Vec<Risk>,
    pub optimizations: Vec<Optimization>,
    pub generated_at: DateTime<Utc>,
    pub performance_metrics: PerformanceMetrics,
}

impl Plan {
    /// Look up a task by id.
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Sum of `estimated_hours` across all tasks.
    pub fn total_estimated_hours(&self) -> f64 {
        self.tasks.iter().map(|t| t.estimated_hours).sum()
    }
}
