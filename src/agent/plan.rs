use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::agent::{AgentError, Plan, PlannedCommand};
use crate::config::Settings;
use crate::llm::client::{ChatMessage, LLMClient};
use crate::llm::sanitize::extract_payload;
use crate::security::{CommandValidator, ValidationError};

/// The model's plan could not be used; nothing from it runs
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("LLM returned invalid JSON: {0}")]
    InvalidJson(String),

    #[error("LLM response is missing a 'commands' list.")]
    MissingCommandsList,

    #[error("Command entry {index} must include 'command' and 'reason' strings.")]
    InvalidEntry { index: usize },

    #[error("{0}")]
    Validation(#[from] ValidationError),
}

/// Parse a model reply into a bounded, validated plan
///
/// Accepts `{"commands": [{"command": ..., "reason": ...}]}`, optionally
/// fenced or preceded by a reasoning block. The `commands` list must be present;
/// `[]` is a valid empty plan. Entries past `max_commands` are dropped before
/// validation.
pub fn parse_plan(
    raw: &str,
    max_commands: usize,
    validator: &CommandValidator,
) -> Result<Plan, PlanError> {
    let candidate = extract_payload(raw);
    let data: Value =
        serde_json::from_str(&candidate).map_err(|_| PlanError::InvalidJson(candidate.clone()))?;

    let object = data.as_object().ok_or(PlanError::MissingCommandsList)?;
    let Some(Value::Array(entries)) = object.get("commands") else {
        return Err(PlanError::MissingCommandsList);
    };

    if entries.len() > max_commands {
        debug!(proposed = entries.len(), kept = max_commands, "dropping commands beyond the plan limit");
    }

    entries
        .iter()
        .take(max_commands)
        .enumerate()
        .map(|(index, entry)| parse_entry(index, entry, validator))
        .collect()
}

fn parse_entry(
    index: usize,
    entry: &Value,
    validator: &CommandValidator,
) -> Result<PlannedCommand, PlanError> {
    let field = |name: &str| entry.get(name).and_then(Value::as_str);
    let (Some(command), Some(reason)) = (field("command"), field("reason")) else {
        return Err(PlanError::InvalidEntry { index });
    };

    validator.validate(command)?;

    Ok(PlannedCommand {
        command: command.trim().to_string(),
        reason: reason.trim().to_string(),
    })
}

/// Ask the model which git commands would answer the question
pub async fn plan_git_commands(
    client: &dyn LLMClient,
    settings: &Settings,
    validator: &CommandValidator,
    context: &str,
    question: &str,
) -> Result<Plan, AgentError> {
    let messages = [
        ChatMessage::system(settings.plan_prompt()),
        ChatMessage::user(format!(
            "Repository context:\n{}\n\nQuestion: {}\nReturn at most {} commands.",
            context, question, settings.limits.max_commands
        )),
    ];

    let raw_plan = client.chat(&messages).await?;
    let plan = parse_plan(&raw_plan, settings.limits.max_commands, validator)?;

    info!(commands = plan.len(), "plan accepted");
    Ok(plan)
}
