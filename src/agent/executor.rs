use tracing::{debug, warn};

use crate::agent::{CommandExecution, PlannedCommand};
use crate::git::GitRunner;
use crate::security::CommandValidator;

/// Placeholder for commands that print nothing
pub const NO_OUTPUT: &str = "<no output>";

/// Appended to output cut at the budget
pub const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// Room kept for the marker when cutting
const MARKER_ALLOWANCE: usize = 20;

/// Trim and bound command output to `budget` characters
///
/// Counts characters, not bytes, so a cut never splits a code point.
pub fn truncate_output(text: &str, budget: usize) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return NO_OUTPUT.to_string();
    }

    if trimmed.chars().count() <= budget {
        return trimmed.to_string();
    }

    let keep = budget.saturating_sub(MARKER_ALLOWANCE);
    let head: String = trimmed.chars().take(keep).collect();
    format!("{}{}", head.trim_end(), TRUNCATION_MARKER)
}

/// Run one validated command line and capture its outcome
///
/// Shared by the plan executor and the tool loop. Never fails: validation and
/// git errors both come back as `success == false`.
pub fn run_command<R: GitRunner>(
    runner: &R,
    validator: &CommandValidator,
    command: &str,
    reason: &str,
    budget: usize,
) -> CommandExecution {
    let outcome = validator
        .validate(command)
        .map_err(|e| e.to_string())
        .and_then(|validated| {
            let args: Vec<&str> = validated.args.iter().map(String::as_str).collect();
            runner.run(&args).map_err(|e| e.to_string())
        });

    let (output, success) = match outcome {
        Ok(stdout) => (stdout, true),
        Err(message) => {
            warn!(command, "command failed: {}", message);
            (message, false)
        }
    };

    CommandExecution {
        command: command.to_string(),
        reason: reason.to_string(),
        output: truncate_output(&output, budget),
        success,
    }
}

/// Execute a plan in order, one result per entry
///
/// Entries are re-validated even though the parser already checked them.
pub fn execute_plan<R: GitRunner>(
    plan: &[PlannedCommand],
    runner: &R,
    validator: &CommandValidator,
    budget: usize,
) -> Vec<CommandExecution> {
    plan.iter()
        .map(|planned| {
            debug!(command = %planned.command, "executing planned command");
            run_command(runner, validator, &planned.command, &planned.reason, budget)
        })
        .collect()
}
