//! Question answering over a repository.
//!
//! Two modes share the same building blocks:
//! - the plan pipeline ([`pipeline::run_command_agent`]): gather context, ask
//!   the model for a bounded command plan, run it, ask for the answer;
//! - the tool loop ([`tool_loop::run_tool_agent`]): the model calls a single
//!   validated `git` tool turn by turn until it answers or runs out of steps.

pub mod answer;
pub mod executor;
pub mod pipeline;
pub mod plan;
pub mod tool_loop;

pub use answer::{answer_from_context, generate_final_answer};
pub use executor::{execute_plan, truncate_output};
pub use pipeline::run_command_agent;
pub use plan::{parse_plan, plan_git_commands, PlanError};
pub use tool_loop::{run_tool_agent, GitTool, Tool};

use crate::llm::client::LLMError;
use thiserror::Error;

/// A model-proposed command that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCommand {
    pub command: String,
    pub reason: String,
}

/// Ordered commands to run; order is execution order
pub type Plan = Vec<PlannedCommand>;

/// Outcome of running one command
///
/// `output` is always trimmed and truncated to the output budget, never raw
/// process output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandExecution {
    pub command: String,
    pub reason: String,
    pub output: String,
    pub success: bool,
}

/// Everything one question produced
#[derive(Debug, Clone)]
pub struct AgentRunResult {
    pub plan: Plan,
    pub executions: Vec<CommandExecution>,
    pub answer: String,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Invalid command plan: {0}")]
    Plan(#[from] PlanError),

    #[error("LLM request failed: {0}")]
    Llm(#[from] LLMError),

    #[error("Agent stopped after {0} steps without a final answer")]
    StepLimitReached(usize),
}
