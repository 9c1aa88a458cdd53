//! One-shot planning assistant.

use crate::generator::{GenerationUnavailable, Generator};
use crate::model::Plan;
use crate::prompts::build_chat_prompt;

/// Ask the assistant a question, optionally grounded in `context`.
pub async fn ask(
    generator: &dyn Generator,
    message: &str,
    context: &str,
) -> Result<String, GenerationUnavailable> {
    let prompt = build_chat_prompt(message, context);
    let reply = generator.generate(&prompt).await?;
    let reply = reply.trim();
    if reply.is_empty() {
        return Err(GenerationUnavailable::new("empty completion"));
    }
    tracing::debug!(generator = generator.name(), reply_len = reply.len(), "chat reply");
    Ok(reply.to_string())
}

/// Short textual summary of a plan for use as chat context.
pub fn plan_context(plan: &Plan) -> String {
    let mut out = format!(
        "Goal: {}\nTimeline: {} to {} at {} hours per week\n",
        plan.goal, plan.start_date, plan.deadline, plan.hours_per_week
    );
    if !plan.tasks.is_empty() {
        out.push_str("Tasks:\n");
        for t in &plan.tasks {
            let label = t.priority_label.map(|l| l.to_string()).unwrap_or_else(|| "-".into());
            out.push_str(&format!(
                "- {} ({}h, priority {label}, milestone {})\n",
                t.title, t.estimated_hours, t.milestone
            ));
        }
    }
    if !plan.risks.is_empty() {
        out.push_str("Risks:\n");
        for r in &plan.risks {
            out.push_str(&format!("- {} (severity {})\n", r.description, r.severity));
        }
    }
    out
}
