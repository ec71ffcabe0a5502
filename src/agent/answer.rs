use tracing::debug;

use crate::agent::CommandExecution;
use crate::config::Settings;
use crate::llm::client::{ChatMessage, LLMClient, LLMError};
use crate::llm::sanitize::strip_thinking;

/// Sent in place of command outputs when nothing ran
pub const NO_EXECUTIONS_NOTICE: &str =
    "No commands were executed. Answer using the repository context only.";

/// Render executions in plan order for the answer request
pub fn format_executions(executions: &[CommandExecution]) -> String {
    if executions.is_empty() {
        return NO_EXECUTIONS_NOTICE.to_string();
    }

    executions
        .iter()
        .map(|execution| {
            format!(
                "Command: {}\nReason: {}\nSuccess: {}\nOutput:\n{}",
                execution.command,
                execution.reason,
                if execution.success { "yes" } else { "no" },
                execution.output
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Second model call: answer the question from context plus evidence
pub async fn generate_final_answer(
    client: &dyn LLMClient,
    settings: &Settings,
    context: &str,
    question: &str,
    executions: &[CommandExecution],
) -> Result<String, LLMError> {
    let messages = [
        ChatMessage::system(settings.answer_prompt()),
        ChatMessage::user(format!(
            "Repository context:\n{}\n\nQuestion: {}\n\nExecuted command outputs:\n{}\n\n\
Provide a concise answer that cites commands or commit hashes when possible.",
            context,
            question,
            format_executions(executions)
        )),
    ];

    debug!(executions = executions.len(), "requesting final answer");
    let response = client.chat(&messages).await?;
    Ok(strip_thinking(&response))
}

/// Single model call answering from gathered context alone (`ask`)
pub async fn answer_from_context(
    client: &dyn LLMClient,
    settings: &Settings,
    context: &str,
    question: &str,
) -> Result<String, LLMError> {
    let messages = [
        ChatMessage::system(settings.system_prompt()),
        ChatMessage::user(format!(
            "Repository context:\n{}\n\nQuestion: {}",
            context, question
        )),
    ];

    let response = client.chat(&messages).await?;
    Ok(strip_thinking(&response))
}
