use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::agent::CommandExecution;
use crate::config::Settings;

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024; // 10MB

/// Append-only record of git commands the model caused to run
///
/// Write-only: nothing in the program reads the log back.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    log_path: PathBuf,
    repo_path: PathBuf,
    user: String,
}

impl AuditLogger {
    /// Create a logger writing to `log_path`, creating parent directories
    pub fn with_path<P: AsRef<Path>, R: AsRef<Path>>(log_path: P, repo_path: R) -> std::io::Result<Self> {
        let log_path = log_path.as_ref().to_path_buf();

        if let Some(parent) = log_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        Ok(Self {
            log_path,
            repo_path: repo_path.as_ref().to_path_buf(),
            user: "unknown".to_string(),
        })
    }

    /// Name recorded on every entry
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Logger for the configured audit path, if any
    ///
    /// A path that cannot be prepared disables auditing with a warning rather
    /// than failing the question.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        let path = settings.audit_log.as_ref()?;
        match Self::with_path(path, &settings.repo_path) {
            Ok(logger) => Some(logger.with_user(&settings.audit_user)),
            Err(e) => {
                warn!(path = %path.display(), "audit log disabled: {}", e);
                None
            }
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Record an executed command and whether it succeeded
    pub fn log_execution(&self, execution: &CommandExecution) -> std::io::Result<()> {
        let status = if execution.success { "ok" } else { "failed" };
        self.append(&format!("[{}] {}", status, execution.command))
    }

    /// Record a command the validator refused, for spotting model misbehavior
    pub fn log_rejection(&self, command: &str, reason: &str) -> std::io::Result<()> {
        self.append(&format!(
            "[VALIDATION-REJECTED] command=\"{}\" reason=\"{}\"",
            command, reason
        ))
    }

    /// Best-effort variants used from the agent paths
    pub fn record_execution(&self, execution: &CommandExecution) {
        if let Err(e) = self.log_execution(execution) {
            warn!(path = %self.log_path.display(), "failed to write audit log: {}", e);
        }
    }

    pub fn record_rejection(&self, command: &str, reason: &str) {
        if let Err(e) = self.log_rejection(command, reason) {
            warn!(path = %self.log_path.display(), "failed to write audit log: {}", e);
        }
    }

    fn append(&self, entry: &str) -> std::io::Result<()> {
        self.rotate_if_needed()?;

        let timestamp = Utc::now().to_rfc3339();
        let line = format!(
            "[{}] [{}] [{}] {}\n",
            timestamp,
            self.user,
            self.repo_path.display(),
            entry.replace('\n', " ")
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        file.write_all(line.as_bytes())?;
        file.flush()
    }

    /// Move the log to `<name>.1` once it exceeds MAX_LOG_SIZE
    fn rotate_if_needed(&self) -> std::io::Result<()> {
        let Ok(metadata) = fs::metadata(&self.log_path) else {
            return Ok(());
        };

        if metadata.len() > MAX_LOG_SIZE {
            let mut backup = self.log_path.clone().into_os_string();
            backup.push(".1");
            fs::rename(&self.log_path, PathBuf::from(backup))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn execution(command: &str, success: bool) -> CommandExecution {
        CommandExecution {
            command: command.to_string(),
            reason: "test".to_string(),
            output: "out".to_string(),
            success,
        }
    }

    #[test]
    fn test_appends_one_line_per_entry() {
        let dir = TempDir::new().unwrap();
        let logger = AuditLogger::with_path(dir.path().join("logs/audit.log"), "/work/repo").unwrap();

        logger.log_execution(&execution("git log -n 5", true)).unwrap();
        logger.log_execution(&execution("git show nope", false)).unwrap();
        logger.log_rejection("git push", "Subcommand 'push' is not allowed").unwrap();

        let contents = fs::read_to_string(logger.log_path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("[/work/repo] [ok] git log -n 5"));
        assert!(lines[1].ends_with("[failed] git show nope"));
        assert!(lines[2].contains("[VALIDATION-REJECTED] command=\"git push\""));
    }

    #[test]
    fn test_multiline_commands_stay_on_one_line() {
        let dir = TempDir::new().unwrap();
        let logger = AuditLogger::with_path(dir.path().join("audit.log"), "/repo").unwrap();

        logger.log_rejection("git log\nrm -rf /", "not git").unwrap();

        let contents = fs::read_to_string(logger.log_path()).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn test_rotation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        fs::write(&path, vec![b'x'; (MAX_LOG_SIZE + 1) as usize]).unwrap();

        let logger = AuditLogger::with_path(&path, "/repo").unwrap();
        logger.log_execution(&execution("git status", true)).unwrap();

        assert!(dir.path().join("audit.log.1").exists());
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn test_from_settings_carries_user() {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings::with_repo("/work/repo");
        settings.audit_log = Some(dir.path().join("audit.log"));
        settings.audit_user = "auditor".to_string();

        let logger = AuditLogger::from_settings(&settings).unwrap();
        logger.log_execution(&execution("git status", true)).unwrap();

        let contents = fs::read_to_string(logger.log_path()).unwrap();
        assert!(contents.contains("] [auditor] [/work/repo] [ok] git status"));
    }

    #[test]
    fn test_from_settings_disabled_by_default() {
        let settings = Settings::with_repo("/repo");
        assert!(AuditLogger::from_settings(&settings).is_none());
    }
}
