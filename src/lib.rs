pub mod agent;
pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod llm;
pub mod security;
pub mod ui;

// Re-export commonly used types for convenience
pub use agent::{AgentError, AgentRunResult, CommandExecution, Plan, PlannedCommand};
pub use config::Settings;
pub use error::{AppError, AppResult, GitError, GitResult};
pub use git::{GitExecutor, GitRunner, GitVersion};
pub use llm::{ChatMessage, LLMClient, LLMError};
pub use security::{CommandValidator, ValidationError};
