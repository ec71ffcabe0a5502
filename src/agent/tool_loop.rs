use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::agent::executor::truncate_output;
use crate::agent::{AgentError, AgentRunResult, CommandExecution, PlannedCommand};
use crate::audit::AuditLogger;
use crate::config::Settings;
use crate::git::{GitExecutor, GitRunner};
use crate::llm::client::{ChatMessage, LLMClient};
use crate::llm::context::ContextBuilder;
use crate::llm::sanitize::{extract_payload, strip_thinking};
use crate::security::CommandValidator;

/// Something the model can call by name during the tool loop
pub trait Tool {
    fn name(&self) -> &str;

    fn description(&self) -> String;

    /// Run the tool and return the observation shown to the model
    ///
    /// Never fails: problems are reported in the returned text so the model
    /// can correct itself.
    fn invoke(&mut self, input: &Value) -> String;
}

/// The `git` tool: validated, read-only git in the target repository
///
/// Every command that actually reaches git is kept as a [`CommandExecution`].
/// Rejected commands are not executions; they only reach the audit log.
pub struct GitTool<'a, R: GitRunner> {
    runner: &'a R,
    validator: CommandValidator,
    output_budget: usize,
    audit: Option<&'a AuditLogger>,
    executions: Vec<CommandExecution>,
}

impl<'a, R: GitRunner> GitTool<'a, R> {
    pub fn new(runner: &'a R, validator: CommandValidator, output_budget: usize) -> Self {
        Self {
            runner,
            validator,
            output_budget,
            audit: None,
            executions: Vec::new(),
        }
    }

    pub fn with_audit(mut self, audit: Option<&'a AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn executions(&self) -> &[CommandExecution] {
        &self.executions
    }

    pub fn into_executions(self) -> Vec<CommandExecution> {
        self.executions
    }
}

impl<R: GitRunner> Tool for GitTool<'_, R> {
    fn name(&self) -> &str {
        "git"
    }

    fn description(&self) -> String {
        format!(
            "Run a read-only git command. Allowed subcommands: {}.",
            self.validator.allowed_display()
        )
    }

    fn invoke(&mut self, input: &Value) -> String {
        let Some(command) = input.get("command").and_then(Value::as_str) else {
            return "Error: the git tool needs a 'command' string.".to_string();
        };
        let reason = input.get("reason").and_then(Value::as_str).unwrap_or_default();

        let validated = match self.validator.validate(command) {
            Ok(validated) => validated,
            Err(e) => {
                warn!(command, "tool call rejected: {}", e);
                if let Some(audit) = self.audit {
                    audit.record_rejection(command, &e.to_string());
                }
                return format!("Error: {}", e);
            }
        };

        let args: Vec<&str> = validated.args.iter().map(String::as_str).collect();
        let (output, success) = match self.runner.run(&args) {
            Ok(stdout) => (truncate_output(&stdout, self.output_budget), true),
            Err(e) => (truncate_output(&e.to_string(), self.output_budget), false),
        };

        let execution = CommandExecution {
            command: validated.command,
            reason: reason.trim().to_string(),
            output: output.clone(),
            success,
        };
        if let Some(audit) = self.audit {
            audit.record_execution(&execution);
        }
        self.executions.push(execution);

        if success {
            output
        } else {
            format!("Git error: {}", output)
        }
    }
}

/// One model turn in the tool protocol
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentAction {
    Git {
        command: String,
        #[serde(default)]
        reason: String,
    },
    FinalAnswer {
        answer: String,
    },
}

/// How a raw model reply was understood
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentReply {
    Action(AgentAction),
    /// Looked like JSON but was not a valid action
    Invalid(String),
    /// Plain prose; taken as the final answer
    Prose(String),
}

pub fn parse_reply(raw: &str) -> AgentReply {
    let payload = extract_payload(raw);

    match serde_json::from_str::<Value>(&payload) {
        Ok(value) if value.is_object() => match serde_json::from_value::<AgentAction>(value) {
            Ok(action) => AgentReply::Action(action),
            Err(e) => AgentReply::Invalid(e.to_string()),
        },
        Err(e) if payload.starts_with('{') => AgentReply::Invalid(e.to_string()),
        _ => AgentReply::Prose(strip_thinking(raw)),
    }
}

const FINAL_TURN_NOTICE: &str = "You have used all available git commands. Reply now with \
{\"action\": \"final_answer\", \"answer\": \"...\"} using the evidence gathered so far.";

/// Answer a question by letting the model call the `git` tool turn by turn
pub async fn run_tool_agent(
    settings: &Settings,
    client: &dyn LLMClient,
    question: &str,
) -> Result<AgentRunResult, AgentError> {
    let executor = GitExecutor::new(&settings.repo_path);
    run_tool_agent_with(settings, client, &executor, question).await
}

/// [`run_tool_agent`] against a caller-supplied runner
pub async fn run_tool_agent_with<R: GitRunner>(
    settings: &Settings,
    client: &dyn LLMClient,
    runner: &R,
    question: &str,
) -> Result<AgentRunResult, AgentError> {
    let max_steps = settings.limits.max_agent_steps;
    let audit = AuditLogger::from_settings(settings);
    let mut tool = GitTool::new(runner, settings.validator(), settings.limits.max_output_chars)
        .with_audit(audit.as_ref());

    let context = ContextBuilder::new(runner, &settings.context).gather(None);
    info!(chars = context.len(), max_steps, "context gathered, starting tool loop");

    let mut messages = vec![
        ChatMessage::system(settings.agent_prompt()),
        ChatMessage::user(format!(
            "Repository context:\n{}\n\nQuestion: {}",
            context, question
        )),
    ];
    let mut steps = 0;

    let answer = loop {
        let reply = client.chat(&messages).await?;
        messages.push(ChatMessage::assistant(reply.clone()));

        let observation = match parse_reply(&reply) {
            AgentReply::Prose(text) => break text,
            AgentReply::Action(AgentAction::FinalAnswer { answer }) => break answer.trim().to_string(),
            _ if steps >= max_steps => return Err(AgentError::StepLimitReached(max_steps)),
            AgentReply::Action(AgentAction::Git { command, reason }) => {
                debug!(step = steps + 1, %command, "tool call");
                let result = tool.invoke(&json!({ "command": command, "reason": reason }));
                format!("Result of `{}`:\n{}", command, result)
            }
            AgentReply::Invalid(e) => {
                debug!(step = steps + 1, "invalid action: {}", e);
                format!(
                    "Error: could not read your reply as an action ({}). Reply with a single JSON \
object using \"action\": \"git\" or \"action\": \"final_answer\".",
                    e
                )
            }
        };

        steps += 1;
        if steps == max_steps {
            messages.push(ChatMessage::user(format!("{}\n\n{}", observation, FINAL_TURN_NOTICE)));
        } else {
            messages.push(ChatMessage::user(observation));
        }
    };

    let executions = tool.into_executions();
    info!(steps, executed = executions.len(), "tool loop finished");

    let plan = executions
        .iter()
        .map(|execution| PlannedCommand {
            command: execution.command.clone(),
            reason: execution.reason.clone(),
        })
        .collect();

    Ok(AgentRunResult {
        plan,
        executions,
        answer,
    })
}
