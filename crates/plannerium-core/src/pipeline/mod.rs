//! Pipeline driver: runs the five stages in order and assembles the Plan.
//!
//! ```text
//! Start -> Decomposed -> Prioritized -> Scheduled -> RiskAssessed -> Optimized -> Assembled
//! ```
//!
//! The walk is strictly forward. The first stage failure aborts the run and
//! surfaces as [`PipelineFailed`]; no partial plan is ever returned.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::generator::Generator;
use crate::model::{PerformanceMetrics, Plan, PlanRequest, StageTiming};
use crate::stages::{self, Stage, StageContext, StageError};

/// Position of a run in the stage sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Start,
    Decomposed,
    Prioritized,
    Scheduled,
    RiskAssessed,
    Optimized,
    Assembled,
}

impl PipelineState {
    /// The following state, or `None` once the plan is assembled.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::Decomposed),
            Self::Decomposed => Some(Self::Prioritized),
            Self::Prioritized => Some(Self::Scheduled),
            Self::Scheduled => Some(Self::RiskAssessed),
            Self::RiskAssessed => Some(Self::Optimized),
            Self::Optimized => Some(Self::Assembled),
            Self::Assembled => None,
        }
    }

    /// The stage whose executor drives the transition out of this state.
    pub fn stage(self) -> Option<Stage> {
        match self {
            Self::Start => Some(Stage::Decomposition),
            Self::Decomposed => Some(Stage::Prioritization),
            Self::Prioritized => Some(Stage::Scheduling),
            Self::Scheduled => Some(Stage::RiskAnalysis),
            Self::RiskAssessed => Some(Stage::Optimization),
            Self::Optimized | Self::Assembled => None,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::Decomposed => "decomposed",
            Self::Prioritized => "prioritized",
            Self::Scheduled => "scheduled",
            Self::RiskAssessed => "risk_assessed",
            Self::Optimized => "optimized",
            Self::Assembled => "assembled",
        };
        f.write_str(s)
    }
}

/// Caller-supplied bounds on a run.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Upper bound on each generator call. `None` waits indefinitely.
    pub stage_timeout: Option<Duration>,
    /// Cancelling abandons the in-flight stage.
    pub cancel: CancellationToken,
}

impl PipelineOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            stage_timeout: Some(timeout),
            ..Self::default()
        }
    }
}

/// A run aborted at `stage`.
///
/// Carries only the stage name and a short cause; never raw generator text.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("planning pipeline failed at {stage} stage: {source}")]
pub struct PipelineFailed {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

/// Run all five stages for `request` and assemble the plan.
///
/// Steps:
/// 1. Decompose the goal into tasks and milestones
/// 2. Score and merge priorities onto the tasks
/// 3. Schedule the prioritized tasks into weeks
/// 4. Assess risks against tasks and schedule
/// 5. Suggest optimizations
/// 6. Assemble the plan with timings and counts
pub async fn run_pipeline(
    request: &PlanRequest,
    generator: &dyn Generator,
    options: &PipelineOptions,
) -> Result<Plan, PipelineFailed> {
    let run_id = Uuid::new_v4();
    let started = Instant::now();
    let ctx = StageContext::new(generator, &options.cancel).with_timeout(options.stage_timeout);
    let mut run = Run::new(run_id);

    tracing::info!(
        run_id = %run_id,
        generator = generator.name(),
        start = %request.start_date,
        deadline = %request.deadline,
        hours_per_week = request.hours_per_week,
        "starting planning pipeline"
    );

    // 1. Decomposition
    let decomposition = run
        .stage(Stage::Decomposition, stages::decompose(&ctx, request))
        .await?;
    run.note_degraded(Stage::Decomposition, decomposition.degraded);

    // 2. Prioritization
    let prioritization = run
        .stage(Stage::Prioritization, stages::prioritize(&ctx, &decomposition.tasks))
        .await?;
    run.note_degraded(Stage::Prioritization, prioritization.degraded);
    let tasks = prioritization.tasks;

    // 3. Scheduling
    let scheduling = run
        .stage(Stage::Scheduling, stages::schedule(&ctx, &tasks, request))
        .await?;
    run.note_degraded(Stage::Scheduling, scheduling.degraded);
    let schedule = scheduling.weeks;

    // 4. Risk analysis
    let assessment = run
        .stage(Stage::RiskAnalysis, stages::assess_risks(&ctx, &tasks, &schedule))
        .await?;
    run.note_degraded(Stage::RiskAnalysis, assessment.degraded);
    let risks = assessment.risks;

    // 5. Optimization
    let optimizations = run
        .stage(
            Stage::Optimization,
            stages::optimize(&ctx, &tasks, &schedule, &risks),
        )
        .await?;
    run.note_degraded(Stage::Optimization, optimizations.degraded);
    let optimizations = optimizations.items;

    // 6. Assemble
    debug_assert_eq!(run.state.next(), Some(PipelineState::Assembled));
    run.state = PipelineState::Assembled;

    let total_estimated_hours = tasks.iter().map(|t| t.estimated_hours).sum();
    let total_scheduled_hours = schedule.iter().map(|w| w.hours_planned).sum();
    let metrics = PerformanceMetrics {
        total_time_secs: started.elapsed().as_secs_f64(),
        stage_times: run.timings,
        task_count: tasks.len(),
        milestone_count: decomposition.milestones.len(),
        schedule_weeks: schedule.len(),
        risk_count: risks.len(),
        optimization_count: optimizations.len(),
        total_estimated_hours,
        total_scheduled_hours,
        degraded_stages: run.degraded,
    };

    tracing::info!(
        run_id = %run_id,
        tasks = metrics.task_count,
        weeks = metrics.schedule_weeks,
        risks = metrics.risk_count,
        optimizations = metrics.optimization_count,
        total_secs = metrics.total_time_secs,
        degraded = metrics.degraded_stages.len(),
        "planning pipeline complete"
    );

    Ok(Plan {
        run_id,
        goal: request.goal.clone(),
        start_date: request.start_date,
        deadline: request.deadline,
        hours_per_week: request.hours_per_week,
        milestones: decomposition.milestones,
        tasks,
        schedule,
        risks,
        optimizations,
        generated_at: Utc::now(),
        performance_metrics: metrics,
    })
}

/// Per-run bookkeeping. Never shared between runs.
struct Run {
    id: Uuid,
    state: PipelineState,
    timings: Vec<StageTiming>,
    degraded: Vec<String>,
}

impl Run {
    fn new(id: Uuid) -> Self {
        Self {
            id,
            state: PipelineState::Start,
            timings: Vec::with_capacity(Stage::ALL.len()),
            degraded: Vec::new(),
        }
    }

    /// Await one stage, record its timing, and advance the state.
    async fn stage<T>(
        &mut self,
        stage: Stage,
        work: impl Future<Output = Result<T, StageError>>,
    ) -> Result<T, PipelineFailed> {
        debug_assert_eq!(self.state.stage(), Some(stage));
        tracing::info!(run_id = %self.id, stage = %stage, "stage starting");

        let started = Instant::now();
        let result = work.await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(value) => {
                self.timings.push(StageTiming {
                    stage: stage.to_string(),
                    elapsed_secs: elapsed,
                });
                if let Some(next) = self.state.next() {
                    self.state = next;
                }
                tracing::info!(
                    run_id = %self.id,
                    stage = %stage,
                    state = %self.state,
                    elapsed_secs = elapsed,
                    "stage complete"
                );
                Ok(value)
            }
            Err(source) => {
                tracing::error!(
                    run_id = %self.id,
                    stage = %stage,
                    elapsed_secs = elapsed,
                    error = %source,
                    "stage failed; aborting pipeline"
                );
                Err(PipelineFailed { stage, source })
            }
        }
    }

    fn note_degraded(&mut self, stage: Stage, degraded: bool) {
        if degraded {
            tracing::warn!(run_id = %self.id, stage = %stage, "stage ran in degraded mode");
            self.degraded.push(stage.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GenerationUnavailable;

    #[test]
    fn states_walk_forward_to_assembled() {
        let mut state = PipelineState::Start;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            state = next;
            seen.push(state);
        }
        assert_eq!(seen.len(), 7);
        assert_eq!(state, PipelineState::Assembled);
    }

    #[test]
    fn each_transition_has_one_stage() {
        let stages: Vec<Stage> = [
            PipelineState::Start,
            PipelineState::Decomposed,
            PipelineState::Prioritized,
            PipelineState::Scheduled,
            PipelineState::RiskAssessed,
        ]
        .iter()
        .filter_map(|s| s.stage())
        .collect();
        assert_eq!(stages, Stage::ALL);
        assert_eq!(PipelineState::Optimized.stage(), None);
    }

    #[test]
    fn failure_message_names_stage_not_payload() {
        let err = PipelineFailed {
            stage: Stage::Scheduling,
            source: StageError::Unavailable(GenerationUnavailable::new("connection refused")),
        };
        assert_eq!(
            err.to_string(),
            "planning pipeline failed at scheduling stage: generation unavailable: connection refused"
        );
    }
}
