//! Stage 4: identify project risks.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{Stage, StageContext, StageError, check_count, extract_key};
use crate::model::{Level, Risk, ScheduleWeek, Task};
use crate::prompts::build_risk_prompt;
use crate::response::MalformedResponse;

/// Output of the risk-analysis stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub risks: Vec<Risk>,
    pub degraded: bool,
}

#[derive(Debug, Deserialize)]
struct RawRisk {
    #[serde(default)]
    id: String,
    description: String,
    probability: Level,
    impact: Level,
    severity: Level,
    #[serde(default)]
    mitigation: String,
}

pub async fn assess_risks(
    ctx: &StageContext<'_>,
    tasks: &[Task],
    schedule: &[ScheduleWeek],
) -> Result<RiskAssessment, StageError> {
    let prompt = build_risk_prompt(tasks, schedule);
    let value = ctx.invoke(&prompt).await?;
    Ok(normalize(value)?)
}

fn normalize(value: Value) -> Result<RiskAssessment, MalformedResponse> {
    let extracted = extract_key::<RawRisk>(Stage::RiskAnalysis, value, Stage::RiskAnalysis.key())?;

    let risks: Vec<Risk> = extracted
        .items
        .into_iter()
        .enumerate()
        .map(|(i, raw)| Risk {
            id: if raw.id.trim().is_empty() {
                format!("risk_{}", i + 1)
            } else {
                raw.id
            },
            description: raw.description,
            probability: raw.probability,
            impact: raw.impact,
            severity: raw.severity,
            mitigation: raw.mitigation,
        })
        .collect();

    if !extracted.degraded {
        check_count(Stage::RiskAnalysis, risks.len(), 5..=8);
    }
    debug!(risks = risks.len(), "risk analysis complete");

    Ok(RiskAssessment {
        risks,
        degraded: extracted.degraded,
    })
}
