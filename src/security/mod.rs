pub mod validator;

pub use validator::{CommandValidator, ValidatedCommand, ValidationError};

/// Program token every model-proposed command must start with
pub const GIT_PROGRAM: &str = "git";

/// Allowlist of read-only git subcommands the model may run
///
/// Shared by the CommandValidator, the plan prompt and the tool description so
/// the model is only ever offered what the validator will accept. Settings may
/// narrow this list but never extend it.
pub const ALLOWED_GIT_SUBCOMMANDS: &[&str] = &[
    "log",
    "show",
    "rev-list",
    "rev-parse",
    "describe",
    "status",
    "shortlog",
    "cat-file",
    "diff",
    "ls-tree",
    "grep",
    "blame",
];

/// Long options that make an allowlisted subcommand run a program or write a
/// file: pager and diff drivers, `--output` redirection, config injection
///
/// Matched against any prefix git would accept as an abbreviation.
pub const DENIED_LONG_OPTIONS: &[&str] = &[
    "output",
    "open-files-in-pager",
    "ext-diff",
    "textconv",
    "config-env",
    "exec",
];

/// Real options that happen to abbreviate a denied one
pub const DENIED_LONG_OPTION_EXCEPTIONS: &[&str] = &["text"];

/// Comma-separated, sorted rendering of a subcommand list for prompts and errors
pub fn describe_allowlist<S: AsRef<str>>(subcommands: &[S]) -> String {
    let mut names: Vec<&str> = subcommands.iter().map(AsRef::as_ref).collect();
    names.sort_unstable();
    names.dedup();
    names.join(", ")
}
