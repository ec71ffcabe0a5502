use std::io;
use thiserror::Error;

// Import module-level errors for AppError
use crate::agent::AgentError;
use crate::config::settings::ConfigError;
use crate::llm::client::LLMError;
use crate::security::validator::ValidationError;

/// Errors that can occur while running git
#[derive(Debug, Error)]
pub enum GitError {
    /// Non-zero exit. Carries git's own message (stderr, else stdout).
    #[error("{0}")]
    CommandFailed(String),

    #[error("Failed to parse git output: {0}")]
    ParseError(String),

    #[error("Git version {0} is too old. Minimum required: 2.20")]
    GitVersionTooOld(String),

    #[error("Failed to detect git version: {0}")]
    GitVersionDetectionFailed(String),

    #[error("Failed to execute git: {0}")]
    IoError(#[from] io::Error),
}

/// Top-level application error that wraps all module-specific errors
///
/// Every module error converts into `AppError` via `From`, so the CLI layer can
/// use `?` throughout and decide on the exit code in one place.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LLMError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Command rejected: {0}")]
    Security(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for git operations
pub type GitResult<T> = std::result::Result<T, GitError>;

/// Result type for application-level operations
pub type AppResult<T> = std::result::Result<T, AppError>;
