use std::collections::BTreeSet;
use thiserror::Error;
use crate::security::{
    describe_allowlist, ALLOWED_GIT_SUBCOMMANDS, DENIED_LONG_OPTIONS, DENIED_LONG_OPTION_EXCEPTIONS,
    GIT_PROGRAM,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Command has unbalanced quotes or escapes: {0}")]
    Unparseable(String),

    #[error("Commands must start with 'git'.")]
    NotGitCommand,

    #[error("Commands must include a subcommand, e.g., 'git log'.")]
    MissingSubcommand,

    #[error("Subcommand '{subcommand}' is not allowed. Allowed: {allowed}.")]
    SubcommandNotAllowed { subcommand: String, allowed: String },

    #[error("Option '{0}' is not allowed: it can run programs or write files.")]
    DangerousFlag(String),
}

/// A command that passed validation, already split into an argument vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCommand {
    /// The command as written, trimmed
    pub command: String,
    pub subcommand: String,
    /// Arguments after the program token; `args[0]` is the subcommand
    pub args: Vec<String>,
}

/// Checks model-proposed command strings against the read-only allowlist
#[derive(Debug, Clone)]
pub struct CommandValidator {
    allowed_subcommands: BTreeSet<String>,
}

impl CommandValidator {
    pub fn new() -> Self {
        Self::with_allowed(ALLOWED_GIT_SUBCOMMANDS)
    }

    /// Build a validator for a narrowed allowlist
    ///
    /// Entries outside `ALLOWED_GIT_SUBCOMMANDS` are ignored; settings
    /// validation reports them before we get here.
    pub fn with_allowed<S: AsRef<str>>(subcommands: &[S]) -> Self {
        let allowed_subcommands = subcommands
            .iter()
            .map(AsRef::as_ref)
            .filter(|sub| ALLOWED_GIT_SUBCOMMANDS.contains(sub))
            .map(str::to_string)
            .collect();

        Self { allowed_subcommands }
    }

    /// Validate a git command string
    pub fn validate(&self, command: &str) -> Result<ValidatedCommand, ValidationError> {
        let command = command.trim();
        let tokens = tokenize(command)?;

        let mut tokens = tokens.into_iter();
        match tokens.next() {
            None => return Err(ValidationError::EmptyCommand),
            Some(program) if program != GIT_PROGRAM => return Err(ValidationError::NotGitCommand),
            Some(_) => {}
        }

        let args: Vec<String> = tokens.collect();
        let subcommand = args.first().ok_or(ValidationError::MissingSubcommand)?;

        if !self.is_allowed(subcommand) {
            return Err(ValidationError::SubcommandNotAllowed {
                subcommand: subcommand.clone(),
                allowed: self.allowed_display(),
            });
        }

        check_dangerous_flags(subcommand, &args[1..])?;

        Ok(ValidatedCommand {
            command: command.to_string(),
            subcommand: subcommand.clone(),
            args,
        })
    }

    /// Check if subcommand is in allowlist
    pub fn is_allowed(&self, subcommand: &str) -> bool {
        self.allowed_subcommands.contains(subcommand)
    }

    pub fn allowed(&self) -> impl Iterator<Item = &str> {
        self.allowed_subcommands.iter().map(String::as_str)
    }

    /// Sorted, comma-separated allowlist for prompts and error messages
    pub fn allowed_display(&self) -> String {
        let names: Vec<&str> = self.allowed().collect();
        describe_allowlist(&names)
    }
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject options that escape read-only inspection
///
/// Everything after a bare `--` is a pathspec and is not inspected.
fn check_dangerous_flags(subcommand: &str, args: &[String]) -> Result<(), ValidationError> {
    match args
        .iter()
        .take_while(|arg| arg.as_str() != "--")
        .find(|arg| is_dangerous_flag(subcommand, arg.as_str()))
    {
        Some(flag) => Err(ValidationError::DangerousFlag(flag.clone())),
        None => Ok(()),
    }
}

fn is_dangerous_flag(subcommand: &str, arg: &str) -> bool {
    if let Some(long) = arg.strip_prefix("--") {
        let name = long.split('=').next().unwrap_or(long);
        return !name.is_empty()
            && !DENIED_LONG_OPTION_EXCEPTIONS.contains(&name)
            && DENIED_LONG_OPTIONS.iter().any(|denied| denied.starts_with(name));
    }

    let Some(short) = arg.strip_prefix('-') else {
        return false;
    };
    // grep bundles short flags, so `-nO<cmd>` still opens a pager
    match subcommand {
        "grep" => short.contains('O') || short == "c",
        _ => short.starts_with('O') || short == "c",
    }
}

/// Split a command line into words using POSIX shell quoting rules
///
/// No expansion happens: `$(...)`, backticks and pipes survive as literal
/// argument text and are never seen by a shell.
pub fn tokenize(command: &str) -> Result<Vec<String>, ValidationError> {
    shlex::split(command).ok_or_else(|| ValidationError::Unparseable(command.to_string()))
}
