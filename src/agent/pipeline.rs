use tracing::{info, warn};

use crate::agent::answer::generate_final_answer;
use crate::agent::executor::execute_plan;
use crate::agent::plan::plan_git_commands;
use crate::agent::{AgentError, AgentRunResult};
use crate::audit::AuditLogger;
use crate::config::Settings;
use crate::git::GitExecutor;
use crate::llm::client::LLMClient;
use crate::llm::context::ContextBuilder;

/// Answer a question with one planned batch of read-only git commands
///
/// Runs context → plan → execute → answer. A bad plan aborts the run before
/// any planned command executes; individual command failures do not.
pub async fn run_command_agent(
    settings: &Settings,
    client: &dyn LLMClient,
    question: &str,
) -> Result<AgentRunResult, AgentError> {
    let executor = GitExecutor::new(&settings.repo_path);
    let validator = settings.validator();
    let audit = AuditLogger::from_settings(settings);

    let context = ContextBuilder::new(&executor, &settings.context).gather(None);
    info!(chars = context.len(), "context gathered");

    let plan = match plan_git_commands(client, settings, &validator, &context, question).await {
        Ok(plan) => plan,
        Err(AgentError::Plan(e)) => {
            warn!("rejected command plan: {}", e);
            if let Some(audit) = &audit {
                audit.record_rejection("<plan>", &e.to_string());
            }
            return Err(AgentError::Plan(e));
        }
        Err(e) => return Err(e),
    };

    let executions = execute_plan(&plan, &executor, &validator, settings.limits.max_output_chars);
    if let Some(audit) = &audit {
        executions.iter().for_each(|execution| audit.record_execution(execution));
    }
    info!(
        executed = executions.len(),
        failed = executions.iter().filter(|e| !e.success).count(),
        "plan executed"
    );

    let answer = generate_final_answer(client, settings, &context, question, &executions).await?;
    info!("answer received");

    Ok(AgentRunResult {
        plan,
        executions,
        answer,
    })
}
