//! Referential integrity across stage outputs.
//!
//! Checks applied to the decomposed task set:
//! - Task ids are non-empty and unique.
//! - Estimates are positive.
//! - Dependencies name existing tasks and never the task itself (repaired,
//!   with a warning, by dropping the offending edge).
//! - The dependency graph is acyclic (topological sort).
//!
//! Cross-stage checks on the schedule are advisory and only produce
//! warnings.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use thiserror::Error;

use crate::model::{Milestone, ScheduleWeek, Task};

/// Hard violations that make a task set unusable.
#[derive(Debug, Error, PartialEq)]
pub enum IntegrityError {
    #[error("task at position {0} has an empty id")]
    EmptyTaskId(usize),

    #[error("duplicate task id: {0:?}")]
    DuplicateTaskId(String),

    #[error("task {task:?} has non-positive estimated_hours {hours}")]
    NonPositiveEstimate { task: String, hours: f64 },

    #[error("dependency cycle detected involving tasks: {0}")]
    CycleDetected(String),
}

/// Soft problems that were repaired or are merely reported.
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrityWarning {
    SelfDependency { task: String },
    UnknownDependency { task: String, dependency: String },
    UnknownMilestone { task: String, milestone: String },
    UnknownScheduledTask { week: u32, task: String },
    ScheduledBeforePrerequisite { task: String, dependency: String },
    WeekOverAllocated { week: u32, hours: f64, limit: f64 },
}

impl fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfDependency { task } => {
                write!(f, "task {task:?} depends on itself; dependency dropped")
            }
            Self::UnknownDependency { task, dependency } => write!(
                f,
                "task {task:?} depends on unknown task {dependency:?}; dependency dropped"
            ),
            Self::UnknownMilestone { task, milestone } => {
                write!(f, "task {task:?} references unknown milestone {milestone:?}")
            }
            Self::UnknownScheduledTask { week, task } => {
                write!(f, "week {week} assigns hours to unknown task {task:?}")
            }
            Self::ScheduledBeforePrerequisite { task, dependency } => write!(
                f,
                "task {task:?} is scheduled before its prerequisite {dependency:?}"
            ),
            Self::WeekOverAllocated { week, hours, limit } => {
                write!(f, "week {week} plans {hours} hours, above the {limit} hour limit")
            }
        }
    }
}

/// Validate a decomposed task set, repairing bad dependency edges in place.
///
/// Returns the warnings for every repair made, or the first hard error.
pub fn validate_tasks(tasks: &mut [Task]) -> Result<Vec<IntegrityWarning>, IntegrityError> {
    let mut seen = HashSet::new();
    for (i, task) in tasks.iter().enumerate() {
        if task.id.trim().is_empty() {
            return Err(IntegrityError::EmptyTaskId(i));
        }
        if !seen.insert(task.id.clone()) {
            return Err(IntegrityError::DuplicateTaskId(task.id.clone()));
        }
        if task.estimated_hours.is_nan() || task.estimated_hours <= 0.0 {
            return Err(IntegrityError::NonPositiveEstimate {
                task: task.id.clone(),
                hours: task.estimated_hours,
            });
        }
    }

    let warnings = normalize_dependencies(tasks, &seen);
    check_for_cycles(tasks)?;
    Ok(warnings)
}

/// Drop self edges, edges to unknown ids, and duplicate edges.
fn normalize_dependencies(tasks: &mut [Task], ids: &HashSet<String>) -> Vec<IntegrityWarning> {
    let mut warnings = Vec::new();
    for task in tasks.iter_mut() {
        let mut kept: Vec<String> = Vec::with_capacity(task.dependencies.len());
        for dep in task.dependencies.drain(..) {
            if dep == task.id {
                warnings.push(IntegrityWarning::SelfDependency {
                    task: task.id.clone(),
                });
            } else if !ids.contains(&dep) {
                warnings.push(IntegrityWarning::UnknownDependency {
                    task: task.id.clone(),
                    dependency: dep,
                });
            } else if !kept.contains(&dep) {
                kept.push(dep);
            }
        }
        task.dependencies = kept;
    }
    warnings
}

/// Detect dependency cycles using Kahn's algorithm.
///
/// Expects every dependency to name an existing task.
fn check_for_cycles(tasks: &[Task]) -> Result<(), IntegrityError> {
    let index: HashMap<&str, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.as_str(), i))
        .collect();

    let n = tasks.len();
    let mut in_degree = vec![0usize; n];
    let mut adj: Vec<Vec<usize>> = vec![vec![]; n];

    for (task_idx, task) in tasks.iter().enumerate() {
        for dep in &task.dependencies {
            let Some(&dep_idx) = index.get(dep.as_str()) else {
                continue;
            };
            // Edge: dep -> task.
            adj[dep_idx].push(task_idx);
            in_degree[task_idx] += 1;
        }
    }

    let mut queue: VecDeque<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, deg)| **deg == 0)
        .map(|(i, _)| i)
        .collect();

    let mut sorted_count = 0usize;
    while let Some(node) = queue.pop_front() {
        sorted_count += 1;
        for &neighbor in &adj[node] {
            in_degree[neighbor] -= 1;
            if in_degree[neighbor] == 0 {
                queue.push_back(neighbor);
            }
        }
    }

    if sorted_count != n {
        // Leftover nodes are cycle members plus tasks downstream of a cycle.
        // Peel off the downstream ones: they have no edge back into the
        // leftover set.
        let mut leftover: Vec<bool> = in_degree.iter().map(|deg| *deg > 0).collect();
        let mut out_degree: Vec<usize> = adj
            .iter()
            .map(|next| next.iter().filter(|&&j| leftover[j]).count())
            .collect();
        let mut sinks: VecDeque<usize> = (0..n)
            .filter(|&i| leftover[i] && out_degree[i] == 0)
            .collect();
        while let Some(node) = sinks.pop_front() {
            leftover[node] = false;
            for (pred, next) in adj.iter().enumerate() {
                if leftover[pred] && next.contains(&node) {
                    out_degree[pred] -= next.iter().filter(|&&j| j == node).count();
                    if out_degree[pred] == 0 {
                        sinks.push_back(pred);
                    }
                }
            }
        }

        let cycle_tasks: Vec<&str> = (0..n)
            .filter(|&i| leftover[i])
            .map(|i| tasks[i].id.as_str())
            .collect();
        return Err(IntegrityError::CycleDetected(cycle_tasks.join(", ")));
    }

    Ok(())
}

/// Tasks whose milestone is not one of the declared milestones.
///
/// Tasks with an empty milestone and plans without milestones are skipped.
pub fn check_milestones(tasks: &[Task], milestones: &[Milestone]) -> Vec<IntegrityWarning> {
    if milestones.is_empty() {
        return Vec::new();
    }
    let names: HashSet<&str> = milestones.iter().map(|m| m.name.as_str()).collect();
    tasks
        .iter()
        .filter(|t| !t.milestone.is_empty() && !names.contains(t.milestone.as_str()))
        .map(|t| IntegrityWarning::UnknownMilestone {
            task: t.id.clone(),
            milestone: t.milestone.clone(),
        })
        .collect()
}

/// Advisory checks on a schedule against the task set and the weekly limit.
pub fn check_schedule(
    tasks: &[Task],
    schedule: &[ScheduleWeek],
    hours_per_week: f64,
) -> Vec<IntegrityWarning> {
    let mut warnings = Vec::new();
    let ids: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();

    // First week each task appears in.
    let mut first_week: HashMap<&str, u32> = HashMap::new();
    for week in schedule {
        if week.hours_planned > hours_per_week {
            warnings.push(IntegrityWarning::WeekOverAllocated {
                week: week.week_number,
                hours: week.hours_planned,
                limit: hours_per_week,
            });
        }
        for assignment in &week.tasks {
            if !ids.contains(assignment.task_id.as_str()) {
                warnings.push(IntegrityWarning::UnknownScheduledTask {
                    week: week.week_number,
                    task: assignment.task_id.clone(),
                });
                continue;
            }
            first_week
                .entry(assignment.task_id.as_str())
                .and_modify(|w| *w = (*w).min(week.week_number))
                .or_insert(week.week_number);
        }
    }

    for task in tasks {
        let Some(&task_week) = first_week.get(task.id.as_str()) else {
            continue;
        };
        for dep in &task.dependencies {
            let Some(&dep_week) = first_week.get(dep.as_str()) else {
                continue;
            };
            if task_week < dep_week {
                warnings.push(IntegrityWarning::ScheduledBeforePrerequisite {
                    task: task.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScheduledTaskAssignment;
    use chrono::NaiveDate;

    fn task(id: &str, deps: &[&str]) -> Task {
        Task {
            id: id.to_string(),
            title: format!("Task {id}"),
            description: String::new(),
            milestone: "M1".to_string(),
            estimated_hours: 2.0,
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            deliverable: String::new(),
            impact_score: None,
            urgency_score: None,
            effort_score: None,
            priority_score: None,
            priority_label: None,
        }
    }

    fn week(n: u32, hours: f64, ids: &[&str]) -> ScheduleWeek {
        ScheduleWeek {
            week_start: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
                + chrono::Days::new(7 * (n as u64 - 1)),
            week_number: n,
            hours_planned: hours,
            tasks: ids
                .iter()
                .map(|id| ScheduledTaskAssignment {
                    task_id: id.to_string(),
                    task_title: String::new(),
                    hours_assigned: 1.0,
                    milestone: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn accepts_valid_dag() {
        let mut tasks = vec![task("a", &[]), task("b", &["a"]), task("c", &["a", "b"])];
        let warnings = validate_tasks(&mut tasks).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn drops_self_and_unknown_dependencies() {
        let mut tasks = vec![task("a", &["a"]), task("b", &["a", "ghost", "a"])];
        let warnings = validate_tasks(&mut tasks).unwrap();
        assert_eq!(tasks[0].dependencies, Vec::<String>::new());
        assert_eq!(tasks[1].dependencies, vec!["a".to_string()]);
        assert_eq!(
            warnings,
            vec![
                IntegrityWarning::SelfDependency { task: "a".into() },
                IntegrityWarning::UnknownDependency {
                    task: "b".into(),
                    dependency: "ghost".into()
                },
            ]
        );
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut tasks = vec![task("a", &[]), task("a", &[])];
        assert_eq!(
            validate_tasks(&mut tasks),
            Err(IntegrityError::DuplicateTaskId("a".into()))
        );
    }

    #[test]
    fn rejects_empty_id() {
        let mut tasks = vec![task("a", &[]), task(" ", &[])];
        assert_eq!(validate_tasks(&mut tasks), Err(IntegrityError::EmptyTaskId(1)));
    }

    #[test]
    fn rejects_non_positive_estimate() {
        let mut t = task("a", &[]);
        t.estimated_hours = 0.0;
        let mut tasks = vec![t];
        assert!(matches!(
            validate_tasks(&mut tasks),
            Err(IntegrityError::NonPositiveEstimate { .. })
        ));
    }

    #[test]
    fn rejects_cycle_and_names_members() {
        let mut tasks = vec![
            task("a", &["c"]),
            task("b", &["a"]),
            task("c", &["b"]),
            task("d", &[]),
            task("e", &["c"]),
            task("f", &["e"]),
        ];
        let err = validate_tasks(&mut tasks).unwrap_err();
        let IntegrityError::CycleDetected(members) = err else {
            panic!("expected cycle, got {err:?}");
        };
        assert_eq!(members, "a, b, c", "downstream dependents are not members");
    }

    #[test]
    fn empty_task_set_is_valid() {
        let mut tasks: Vec<Task> = vec![];
        assert!(validate_tasks(&mut tasks).unwrap().is_empty());
    }

    #[test]
    fn milestone_check_reports_unknown_names() {
        let milestones = vec![Milestone {
            name: "M1".into(),
            description: String::new(),
            target_date: None,
        }];
        let mut stray = task("b", &[]);
        stray.milestone = "M9".into();
        let warnings = check_milestones(&[task("a", &[]), stray], &milestones);
        assert_eq!(
            warnings,
            vec![IntegrityWarning::UnknownMilestone {
                task: "b".into(),
                milestone: "M9".into()
            }]
        );
        assert!(check_milestones(&[task("a", &[])], &[]).is_empty());
    }

    #[test]
    fn schedule_check_flags_problems() {
        let tasks = vec![task("a", &[]), task("b", &["a"])];
        let schedule = vec![week(1, 12.0, &["b", "ghost"]), week(2, 5.0, &["a"])];
        let warnings = check_schedule(&tasks, &schedule, 10.0);
        assert!(warnings.contains(&IntegrityWarning::WeekOverAllocated {
            week: 1,
            hours: 12.0,
            limit: 10.0
        }));
        assert!(warnings.contains(&IntegrityWarning::UnknownScheduledTask {
            week: 1,
            task: "ghost".into()
        }));
        assert!(warnings.contains(&IntegrityWarning::ScheduledBeforePrerequisite {
            task: "b".into(),
            dependency: "a".into()
        }));
    }

    #[test]
    fn same_week_prerequisite_is_fine() {
        let tasks = vec![task("a", &[]), task("b", &["a"])];
        let schedule = vec![week(1, 4.0, &["a", "b"])];
        assert!(check_schedule(&tasks, &schedule, 10.0).is_empty());
    }

    #[test]
    fn warning_messages_are_readable() {
        let w = IntegrityWarning::UnknownDependency {
            task: "b".into(),
            dependency: "x".into(),
        };
        assert_eq!(
            w.to_string(),
            "task \"b\" depends on unknown task \"x\"; dependency dropped"
        );
    }
}
