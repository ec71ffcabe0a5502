use crate::error::{GitError, GitResult};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// Raw result of a git invocation
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub success: bool,
}

/// Anything that can run git with an argument vector
///
/// `GitExecutor` is the real implementation; tests substitute recorders to
/// observe exactly which argument vectors reach the process boundary.
pub trait GitRunner {
    /// Run git with `args` (program name excluded) and return trimmed stdout
    fn run(&self, args: &[&str]) -> GitResult<String>;

    /// Directory git runs in
    fn repo_path(&self) -> &Path;

    /// Best-effort variant: failures become an inline `<git error: ...>` marker
    fn try_run(&self, args: &[&str]) -> String {
        match self.run(args) {
            Ok(output) => output,
            Err(e) => format!("<git error: {}>", e),
        }
    }
}

/// Executes git commands within a repository
#[derive(Debug, Clone)]
pub struct GitExecutor {
    repo_path: PathBuf,
}

impl GitExecutor {
    /// Create a new GitExecutor for the given repository path
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Self {
        Self {
            repo_path: repo_path.as_ref().to_path_buf(),
        }
    }

    /// Execute git and capture its output regardless of exit status
    ///
    /// Arguments go to the process as a literal argv; nothing is
    /// shell-interpreted. Example: `executor.execute(&["log", "-n", "5"])`
    pub fn execute(&self, args: &[&str]) -> GitResult<CommandOutput> {
        debug!(repo = %self.repo_path.display(), args = ?args, "running git");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()?;

        Ok(Self::process_output(output))
    }

    fn process_output(output: Output) -> CommandOutput {
        CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
            success: output.status.success(),
        }
    }

    /// Pick the most useful message from a failed invocation
    fn failure_message(args: &[&str], output: &CommandOutput) -> String {
        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }

        let stdout = output.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }

        format!("git {} exited with status {}", args.join(" "), output.exit_code)
    }
}

impl GitRunner for GitExecutor {
    fn run(&self, args: &[&str]) -> GitResult<String> {
        let output = self.execute(args)?;

        if !output.success {
            let message = Self::failure_message(args, &output);
            debug!(exit_code = output.exit_code, %message, "git failed");
            return Err(GitError::CommandFailed(message));
        }

        Ok(output.stdout.trim().to_string())
    }

    fn repo_path(&self) -> &Path {
        &self.repo_path
    }
}
