use crate::config::ContextConfig;
use crate::git::GitRunner;
use tracing::{debug, warn};

/// `hash | author | date | subject`, one commit per line
const LOG_FORMAT: &str = "--pretty=format:%h | %an | %ad | %s";

/// Snapshot of repository state handed to the model before any reasoning
///
/// Every inspection goes through `try_run`, so a failing command (an empty
/// repository has no `HEAD`) shows up inline as `<git error: ...>` instead of
/// aborting the whole context.
pub struct ContextBuilder<'a, R: GitRunner> {
    runner: &'a R,
    commit_history_limit: usize,
    include_diff: bool,
}

impl<'a, R: GitRunner> ContextBuilder<'a, R> {
    pub fn new(runner: &'a R, config: &ContextConfig) -> Self {
        Self {
            runner,
            commit_history_limit: config.commit_history_limit,
            include_diff: config.include_diff,
        }
    }

    /// Gather the labeled sections, in fixed order, into one text block
    pub fn gather(&self, grep: Option<&str>) -> String {
        let mut sections = vec![format!("Repository: {}", self.runner.repo_path().display())];

        sections.push(format!(
            "Branch: {}",
            self.inspect(&["rev-parse", "--abbrev-ref", "HEAD"])
        ));
        sections.push(format!("Status:\n{}", self.inspect(&["status", "-sb"])));

        let depth = format!("-n{}", self.commit_history_limit);
        sections.push(format!(
            "Recent commits:\n{}",
            self.inspect(&["log", depth.as_str(), "--date=short", LOG_FORMAT])
        ));

        if let Some(term) = grep.filter(|term| !term.is_empty()) {
            let filter = format!("--grep={}", term);
            sections.push(format!(
                "Grep results:\n{}",
                self.inspect(&["log", "--date=short", LOG_FORMAT, filter.as_str()])
            ));
        }

        if self.include_diff {
            sections.push(format!("Staged diff:\n{}", self.inspect(&["diff", "--staged"])));
            sections.push(format!("Working diff:\n{}", self.inspect(&["diff"])));
        }

        let context = sections
            .into_iter()
            .filter(|section| !section.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        debug!(chars = context.len(), "repository context gathered");
        context
    }

    fn inspect(&self, args: &[&str]) -> String {
        let output = self.runner.try_run(args);
        if output.starts_with("<git error:") {
            warn!(args = ?args, "context section degraded: {}", output);
        }
        output
    }
}
