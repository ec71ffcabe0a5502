use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::security::{describe_allowlist, CommandValidator, ALLOWED_GIT_SUBCOMMANDS};

/// Planned commands kept from one model response
pub const MAX_COMMANDS: usize = 4;
/// Character budget for a single command's output
pub const MAX_OUTPUT_CHARS: usize = 4000;
/// Tool invocations allowed in the iterative agent
pub const MAX_AGENT_STEPS: usize = 6;

const DEFAULT_PROVIDER: &str = "openai";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: f64 = 60.0;
const DEFAULT_COMMIT_HISTORY: usize = 8;
const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_AUDIT_USER: &str = "unknown";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a repository analyst. Use the provided Git context to answer questions. \
Always cite commit hashes and authors when relevant.";

pub const DEFAULT_ANSWER_SYSTEM_PROMPT: &str = "You are a repository analyst. Use ONLY the provided Git command outputs (and repository context) \
to answer the question. Cite commit hashes, authors, and dates when relevant. If the data is \
insufficient, say so explicitly.";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

/// Model provider and transport settings
#[derive(Debug, Clone)]
pub struct LLMConfig {
    /// `openai` (or any OpenAI-compatible server), `anthropic`, `ollama`, `lmstudio`
    pub provider: String,
    pub model: String,
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub temperature: f32,
}

/// What the context gatherer collects
#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub commit_history_limit: usize,
    pub include_diff: bool,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_commands: usize,
    pub max_output_chars: usize,
    pub max_agent_steps: usize,
}

/// System prompt overrides; `None` means the built-in prompt
#[derive(Debug, Clone, Default)]
pub struct PromptConfig {
    pub system: Option<String>,
    pub plan: Option<String>,
    pub answer: Option<String>,
    pub agent: Option<String>,
}

/// Process-wide configuration, built once at startup and read-only afterwards
#[derive(Debug, Clone)]
pub struct Settings {
    pub repo_path: PathBuf,
    pub allowed_subcommands: Vec<String>,
    pub llm: LLMConfig,
    pub context: ContextConfig,
    pub limits: LimitsConfig,
    pub prompts: PromptConfig,
    /// Append-only record of agent-executed commands
    pub audit_log: Option<PathBuf>,
    /// Login name stamped on audit entries
    pub audit_user: String,
}

/// On-disk layer. Every field is optional so a file can set just one value.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    repo: Option<PathBuf>,
    allowed_subcommands: Option<Vec<String>>,
    audit_log: Option<PathBuf>,
    llm: FileLLM,
    context: FileContext,
    limits: FileLimits,
    prompts: FilePrompts,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileLLM {
    provider: Option<String>,
    model: Option<String>,
    api_base: Option<String>,
    api_key: Option<String>,
    timeout_seconds: Option<f64>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileContext {
    commits: Option<usize>,
    include_diff: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileLimits {
    max_commands: Option<usize>,
    max_output_chars: Option<usize>,
    max_agent_steps: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FilePrompts {
    system: Option<String>,
    plan: Option<String>,
    answer: Option<String>,
    agent: Option<String>,
}

impl Settings {
    /// Built-in defaults for a repository, ignoring files and environment
    pub fn with_repo<P: AsRef<Path>>(repo_path: P) -> Self {
        Settings {
            repo_path: repo_path.as_ref().to_path_buf(),
            allowed_subcommands: ALLOWED_GIT_SUBCOMMANDS.iter().map(|s| s.to_string()).collect(),
            llm: LLMConfig {
                provider: DEFAULT_PROVIDER.to_string(),
                model: DEFAULT_MODEL.to_string(),
                api_base: None,
                api_key: None,
                request_timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
                temperature: DEFAULT_TEMPERATURE,
            },
            context: ContextConfig {
                commit_history_limit: DEFAULT_COMMIT_HISTORY,
                include_diff: false,
            },
            limits: LimitsConfig {
                max_commands: MAX_COMMANDS,
                max_output_chars: MAX_OUTPUT_CHARS,
                max_agent_steps: MAX_AGENT_STEPS,
            },
            prompts: PromptConfig::default(),
            audit_log: None,
            audit_user: DEFAULT_AUDIT_USER.to_string(),
        }
    }

    /// Load settings from defaults, the config file and the process environment
    ///
    /// `.env` must already have been loaded into the environment by the caller.
    pub fn load() -> Result<Self, ConfigError> {
        let current_dir = std::env::current_dir()?;
        Self::load_with(current_dir, |key| std::env::var(key).ok())
    }

    /// Same as `load`, with an injectable environment lookup
    pub fn load_with<F>(current_dir: PathBuf, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut settings = Settings::with_repo(current_dir);

        if let Some(path) = Self::config_path(&lookup) {
            if path.is_file() {
                settings.apply_file(&path)?;
            }
        }

        settings.apply_env(&lookup)?;
        settings.validate()?;

        Ok(settings)
    }

    /// `$REPO_LENS_CONFIG`, else `$XDG_CONFIG_HOME/repo-lens/config.toml`,
    /// else `~/.config/repo-lens/config.toml`
    fn config_path<F>(lookup: &F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(explicit) = lookup("REPO_LENS_CONFIG") {
            return Some(expand_home(&explicit, lookup));
        }

        let base = lookup("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| lookup("HOME").map(|home| PathBuf::from(home).join(".config")))?;

        Some(base.join("repo-lens").join("config.toml"))
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let contents = fs::read_to_string(path)?;
        let file: FileConfig = toml::from_str(&contents)?;

        if let Some(repo) = file.repo {
            self.repo_path = repo;
        }
        if let Some(allowed) = file.allowed_subcommands {
            self.allowed_subcommands = allowed;
        }
        if file.audit_log.is_some() {
            self.audit_log = file.audit_log;
        }

        let llm = file.llm;
        if let Some(provider) = llm.provider {
            self.llm.provider = provider;
        }
        if let Some(model) = llm.model {
            self.llm.model = model;
        }
        if llm.api_base.is_some() {
            self.llm.api_base = llm.api_base;
        }
        if llm.api_key.is_some() {
            self.llm.api_key = llm.api_key;
        }
        if let Some(seconds) = llm.timeout_seconds {
            self.llm.request_timeout = parse_timeout(seconds)?;
        }
        if let Some(temperature) = llm.temperature {
            self.llm.temperature = temperature;
        }

        if let Some(commits) = file.context.commits {
            self.context.commit_history_limit = commits;
        }
        if let Some(include_diff) = file.context.include_diff {
            self.context.include_diff = include_diff;
        }

        if let Some(value) = file.limits.max_commands {
            self.limits.max_commands = value;
        }
        if let Some(value) = file.limits.max_output_chars {
            self.limits.max_output_chars = value;
        }
        if let Some(value) = file.limits.max_agent_steps {
            self.limits.max_agent_steps = value;
        }

        let prompts = file.prompts;
        self.prompts.system = prompts.system.or(self.prompts.system.take());
        self.prompts.plan = prompts.plan.or(self.prompts.plan.take());
        self.prompts.answer = prompts.answer.or(self.prompts.answer.take());
        self.prompts.agent = prompts.agent.or(self.prompts.agent.take());

        Ok(())
    }

    fn apply_env<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(repo) = lookup("REPO_LENS_REPO") {
            self.repo_path = expand_home(&repo, lookup);
        }
        if let Some(provider) = lookup("REPO_LENS_PROVIDER") {
            self.llm.provider = provider.trim().to_lowercase();
        }
        if let Some(model) = lookup("REPO_LENS_MODEL") {
            self.llm.model = model;
        }
        if let Some(api_base) = lookup("REPO_LENS_API_BASE") {
            self.llm.api_base = Some(api_base);
        }

        let vendor_key = if self.llm.provider == "anthropic" {
            "ANTHROPIC_API_KEY"
        } else {
            "OPENAI_API_KEY"
        };
        if let Some(key) = lookup("REPO_LENS_API_KEY").or_else(|| lookup(vendor_key)) {
            self.llm.api_key = Some(key);
        }

        if let Some(raw) = lookup("REPO_LENS_TIMEOUT") {
            let seconds = raw.trim().parse::<f64>().map_err(|_| {
                ConfigError::InvalidValue(format!("REPO_LENS_TIMEOUT must be a number of seconds, got '{}'", raw))
            })?;
            self.llm.request_timeout = parse_timeout(seconds)?;
        }
        if let Some(raw) = lookup("REPO_LENS_COMMITS") {
            self.context.commit_history_limit = raw.trim().parse::<usize>().map_err(|_| {
                ConfigError::InvalidValue(format!("REPO_LENS_COMMITS must be a positive integer, got '{}'", raw))
            })?;
        }
        if let Some(raw) = lookup("REPO_LENS_INCLUDE_DIFF") {
            self.context.include_diff = matches!(raw.trim(), "1" | "true" | "yes");
        }

        if let Some(prompt) = lookup("REPO_LENS_SYSTEM_PROMPT") {
            self.prompts.system = Some(prompt);
        }
        if let Some(prompt) = lookup("REPO_LENS_PLAN_PROMPT") {
            self.prompts.plan = Some(prompt);
        }
        if let Some(prompt) = lookup("REPO_LENS_ANSWER_PROMPT") {
            self.prompts.answer = Some(prompt);
        }
        if let Some(prompt) = lookup("REPO_LENS_AGENT_PROMPT") {
            self.prompts.agent = Some(prompt);
        }

        if let Some(path) = lookup("REPO_LENS_AUDIT_LOG") {
            self.audit_log = Some(expand_home(&path, lookup));
        }
        if let Some(user) = lookup("USER").filter(|user| !user.trim().is_empty()) {
            self.audit_user = user;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.provider.trim().is_empty() {
            return Err(ConfigError::InvalidValue("provider must not be empty".to_string()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue("model must not be empty".to_string()));
        }
        if self.context.commit_history_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "commit history limit must be greater than 0".to_string(),
            ));
        }
        if self.limits.max_commands == 0 || self.limits.max_agent_steps == 0 {
            return Err(ConfigError::InvalidValue(
                "max_commands and max_agent_steps must be greater than 0".to_string(),
            ));
        }
        // Room for a useful prefix plus the truncation marker
        if self.limits.max_output_chars < 40 {
            return Err(ConfigError::InvalidValue(
                "max_output_chars must be at least 40".to_string(),
            ));
        }

        if self.allowed_subcommands.is_empty() {
            return Err(ConfigError::InvalidValue(
                "allowed_subcommands must not be empty".to_string(),
            ));
        }
        if let Some(extra) = self
            .allowed_subcommands
            .iter()
            .find(|sub| !ALLOWED_GIT_SUBCOMMANDS.contains(&sub.as_str()))
        {
            return Err(ConfigError::InvalidValue(format!(
                "'{}' is not a read-only subcommand. Choose from: {}",
                extra,
                describe_allowlist(ALLOWED_GIT_SUBCOMMANDS)
            )));
        }

        Ok(())
    }

    /// Validator for the configured allowlist
    pub fn validator(&self) -> CommandValidator {
        CommandValidator::with_allowed(&self.allowed_subcommands)
    }

    /// Display label like "Openai (gpt-4o-mini)"
    pub fn provider_label(&self) -> String {
        let mut chars = self.llm.provider.chars();
        let provider = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        format!("{} ({})", provider, self.llm.model)
    }

    /// Prompt for the context-only `ask` mode
    pub fn system_prompt(&self) -> &str {
        self.prompts.system.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    /// Prompt asking the model for a JSON command plan
    pub fn plan_prompt(&self) -> String {
        if let Some(prompt) = &self.prompts.plan {
            return prompt.clone();
        }

        format!(
            "You are a Git analyst. Decide which read-only Git commands to run to answer the user's \
question. Choose from the subcommands: {}. Return STRICT JSON: \
{{\"commands\": [{{\"command\": \"git ...\", \"reason\": \"...\"}}]}} with at most {} entries. \
IMPORTANT: Commands are executed directly, NOT through a shell. \
NEVER use shell operators (|, >, <), command substitution ($( ), ` `), or variable expansion ($VAR).",
            describe_allowlist(&self.allowed_subcommands),
            self.limits.max_commands
        )
    }

    /// Prompt for the final answer after plan execution
    pub fn answer_prompt(&self) -> &str {
        self.prompts.answer.as_deref().unwrap_or(DEFAULT_ANSWER_SYSTEM_PROMPT)
    }

    /// Prompt describing the iterative tool protocol
    pub fn agent_prompt(&self) -> String {
        if let Some(prompt) = &self.prompts.agent {
            return prompt.clone();
        }

        format!(
            "You are a repository analyst with one tool, `git`, which runs read-only Git commands in the \
repository. Allowed subcommands: {}. Commands must start with 'git' and are executed directly, NOT \
through a shell, so never use pipes, redirects, or substitutions.\n\n\
Reply with exactly one JSON object per turn and nothing else:\n\
- to run a command: {{\"action\": \"git\", \"command\": \"git log -n 5\", \"reason\": \"why\"}}\n\
- to finish: {{\"action\": \"final_answer\", \"answer\": \"your answer\"}}\n\n\
You may run at most {} commands. Cite commit hashes, authors, and dates when relevant.",
            describe_allowlist(&self.allowed_subcommands),
            self.limits.max_agent_steps
        )
    }
}

fn parse_timeout(seconds: f64) -> Result<Duration, ConfigError> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(ConfigError::InvalidValue(format!(
            "request timeout must be a positive number of seconds, got {}",
            seconds
        )));
    }
    Ok(Duration::from_secs_f64(seconds))
}

/// Expand a leading `~/` using `HOME`
fn expand_home<F>(raw: &str, lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    match (raw.strip_prefix("~/"), lookup("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ if raw == "~" => lookup("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(raw)),
        _ => PathBuf::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn load(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        Settings::load_with(PathBuf::from("/work/repo"), env(pairs))
    }

    #[test]
    fn test_audit_user_from_environment() {
        assert_eq!(load(&[]).unwrap().audit_user, "unknown");
        assert_eq!(load(&[("USER", "dev")]).unwrap().audit_user, "dev");
        assert_eq!(load(&[("USER", " ")]).unwrap().audit_user, "unknown");
    }

    #[test]
    fn test_defaults() {
        let settings = load(&[]).unwrap();
        assert_eq!(settings.repo_path, PathBuf::from("/work/repo"));
        assert_eq!(settings.llm.provider, "openai");
        assert_eq!(settings.llm.model, "gpt-4o-mini");
        assert_eq!(settings.llm.request_timeout, Duration::from_secs(60));
        assert_eq!(settings.context.commit_history_limit, 8);
        assert!(!settings.context.include_diff);
        assert_eq!(settings.limits.max_commands, 4);
        assert_eq!(settings.limits.max_output_chars, 4000);
        assert_eq!(settings.limits.max_agent_steps, 6);
        assert_eq!(settings.allowed_subcommands.len(), ALLOWED_GIT_SUBCOMMANDS.len());
        assert!(settings.audit_log.is_none());
    }

    #[test]
    fn test_environment_overrides() {
        let settings = load(&[
            ("REPO_LENS_REPO", "/tmp/other"),
            ("REPO_LENS_PROVIDER", "Ollama"),
            ("REPO_LENS_MODEL", "llama3"),
            ("REPO_LENS_API_BASE", "http://localhost:11434/v1"),
            ("REPO_LENS_TIMEOUT", "2.5"),
            ("REPO_LENS_COMMITS", "3"),
            ("REPO_LENS_INCLUDE_DIFF", "1"),
            ("REPO_LENS_PLAN_PROMPT", "custom plan"),
        ])
        .unwrap();

        assert_eq!(settings.repo_path, PathBuf::from("/tmp/other"));
        assert_eq!(settings.llm.provider, "ollama");
        assert_eq!(settings.llm.model, "llama3");
        assert_eq!(settings.llm.api_base.as_deref(), Some("http://localhost:11434/v1"));
        assert_eq!(settings.llm.request_timeout, Duration::from_millis(2500));
        assert_eq!(settings.context.commit_history_limit, 3);
        assert!(settings.context.include_diff);
        assert_eq!(settings.plan_prompt(), "custom plan");
    }

    #[test]
    fn test_include_diff_requires_explicit_opt_in() {
        let settings = load(&[("REPO_LENS_INCLUDE_DIFF", "0")]).unwrap();
        assert!(!settings.context.include_diff);
    }

    #[test]
    fn test_api_key_fallbacks() {
        let settings = load(&[("OPENAI_API_KEY", "sk-openai")]).unwrap();
        assert_eq!(settings.llm.api_key.as_deref(), Some("sk-openai"));

        let settings = load(&[
            ("REPO_LENS_API_KEY", "explicit"),
            ("OPENAI_API_KEY", "sk-openai"),
        ])
        .unwrap();
        assert_eq!(settings.llm.api_key.as_deref(), Some("explicit"));

        let settings = load(&[
            ("REPO_LENS_PROVIDER", "anthropic"),
            ("OPENAI_API_KEY", "sk-openai"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
        ])
        .unwrap();
        assert_eq!(settings.llm.api_key.as_deref(), Some("sk-ant"));
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let settings = load(&[("REPO_LENS_MODEL", "  "), ("REPO_LENS_COMMITS", "")]).unwrap();
        assert_eq!(settings.llm.model, "gpt-4o-mini");
        assert_eq!(settings.context.commit_history_limit, 8);
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        assert!(matches!(
            load(&[("REPO_LENS_TIMEOUT", "soon")]).unwrap_err(),
            ConfigError::InvalidValue(_)
        ));
        assert!(matches!(
            load(&[("REPO_LENS_TIMEOUT", "-1")]).unwrap_err(),
            ConfigError::InvalidValue(_)
        ));
        assert!(matches!(
            load(&[("REPO_LENS_COMMITS", "many")]).unwrap_err(),
            ConfigError::InvalidValue(_)
        ));
        assert!(matches!(
            load(&[("REPO_LENS_COMMITS", "0")]).unwrap_err(),
            ConfigError::InvalidValue(_)
        ));
    }

    #[test]
    fn test_home_expansion() {
        let settings = load(&[("HOME", "/home/dev"), ("REPO_LENS_REPO", "~/src/project")]).unwrap();
        assert_eq!(settings.repo_path, PathBuf::from("/home/dev/src/project"));
    }

    #[test]
    fn test_config_file_layer_then_env() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
allowed_subcommands = ["log", "show"]

[llm]
provider = "anthropic"
model = "claude-sonnet-4-5"
timeout_seconds = 10

[context]
commits = 20

[limits]
max_commands = 2
"#,
        )
        .unwrap();

        let settings = load(&[
            ("REPO_LENS_CONFIG", path.to_str().unwrap()),
            ("REPO_LENS_COMMITS", "5"),
        ])
        .unwrap();

        assert_eq!(settings.llm.provider, "anthropic");
        assert_eq!(settings.llm.model, "claude-sonnet-4-5");
        assert_eq!(settings.llm.request_timeout, Duration::from_secs(10));
        assert_eq!(settings.context.commit_history_limit, 5);
        assert_eq!(settings.limits.max_commands, 2);
        assert_eq!(settings.allowed_subcommands, vec!["log", "show"]);
        assert!(settings.plan_prompt().contains("Choose from the subcommands: log, show."));
        assert!(settings.plan_prompt().contains("at most 2 entries"));
    }

    #[test]
    fn test_config_file_unknown_key_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[llm]\nprovidr = \"openai\"\n").unwrap();

        let result = load(&[("REPO_LENS_CONFIG", path.to_str().unwrap())]);
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_allowlist_cannot_be_widened() {
        let mut settings = Settings::with_repo("/repo");
        settings.allowed_subcommands.push("push".to_string());
        assert!(matches!(settings.validate().unwrap_err(), ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_output_budget_floor() {
        let mut settings = Settings::with_repo("/repo");
        settings.limits.max_output_chars = 10;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_provider_label() {
        let settings = Settings::with_repo("/repo");
        assert_eq!(settings.provider_label(), "Openai (gpt-4o-mini)");
    }

    #[test]
    fn test_default_prompts_mention_allowlist_and_limits() {
        let settings = Settings::with_repo("/repo");
        let plan = settings.plan_prompt();
        for subcommand in ALLOWED_GIT_SUBCOMMANDS {
            assert!(plan.contains(subcommand), "plan prompt missing {}", subcommand);
        }
        assert!(plan.contains("at most 4 entries"));
        assert!(settings.agent_prompt().contains("at most 6 commands"));
        assert_eq!(settings.system_prompt(), DEFAULT_SYSTEM_PROMPT);
        assert_eq!(settings.answer_prompt(), DEFAULT_ANSWER_SYSTEM_PROMPT);
    }
}
