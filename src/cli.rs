use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};
use tracing::{debug, info};

use crate::agent::{self, AgentRunResult, Plan};
use crate::config::Settings;
use crate::error::AppResult;
use crate::git::{GitExecutor, GitRunner, GitVersion};
use crate::llm::{self, ContextBuilder};
use crate::ui::{Panel, PanelStyle};

/// Ask questions about a Git repository
#[derive(Parser, Debug)]
#[command(name = "repo-lens", version, about, long_about = None)]
pub struct Cli {
    /// Path to the Git repository. Defaults to $REPO_LENS_REPO, else the current directory.
    #[arg(short = 'r', long, global = true, value_name = "PATH", value_parser = existing_dir)]
    pub repo: Option<PathBuf>,

    /// Enable debug logging for repo-lens
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask the configured LLM about the repository using gathered context
    Ask {
        /// Your natural-language question
        question: String,

        /// Also search commit messages for TERM
        #[arg(long, value_name = "TERM")]
        grep: Option<String>,
    },

    /// Plan and run read-only Git commands to answer the question
    Agent {
        /// Question to answer using Git commands
        question: String,

        /// Let the model call git turn by turn instead of planning up front
        #[arg(long)]
        iterative: bool,
    },

    /// Thin wrappers around the git CLI
    #[command(subcommand)]
    Git(GitAction),

    /// Run a shell command inside the repository
    Shell {
        /// Command line passed to `sh -c`
        command: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum GitAction {
    /// Short branch and status summary
    Status,

    Pull {
        #[arg(default_value = "origin")]
        remote: String,
        branch: Option<String>,
    },

    Push {
        #[arg(default_value = "origin")]
        remote: String,
        branch: Option<String>,
    },

    /// Check out a branch or commit (the target is split into words)
    Checkout {
        /// Branch, commit, or "-b new-branch"
        #[arg(allow_hyphen_values = true)]
        target: String,
    },

    CreateBranch {
        name: String,

        /// Base commit
        #[arg(long, default_value = "HEAD")]
        base: String,
    },

    /// Recent commits as "hash | author | date | subject"
    Log {
        #[arg(short = 'n', long, default_value_t = 5)]
        limit: usize,
    },

    /// Run git with exact arguments
    Run {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn existing_dir(value: &str) -> Result<PathBuf, String> {
    let path = Path::new(value);
    if !path.is_dir() {
        return Err(format!("'{}' is not an existing directory", value));
    }
    path.canonicalize().map_err(|e| format!("cannot resolve '{}': {}", value, e))
}

impl GitAction {
    /// Argument vector passed to git for this wrapper
    pub fn git_args(&self) -> AppResult<Vec<String>> {
        let args = match self {
            GitAction::Status => vec!["status".to_string(), "-sb".to_string()],
            GitAction::Pull { remote, branch } => remote_args("pull", remote, branch.as_deref()),
            GitAction::Push { remote, branch } => remote_args("push", remote, branch.as_deref()),
            GitAction::Checkout { target } => {
                let mut args = vec!["checkout".to_string()];
                args.extend(crate::security::validator::tokenize(target)?);
                args
            }
            GitAction::CreateBranch { name, base } => {
                vec!["checkout".to_string(), "-b".to_string(), name.clone(), base.clone()]
            }
            GitAction::Log { limit } => vec![
                "log".to_string(),
                format!("-n{}", limit),
                "--date=short".to_string(),
                "--pretty=format:%h | %an | %ad | %s".to_string(),
            ],
            GitAction::Run { args } => args.clone(),
        };
        Ok(args)
    }
}

fn remote_args(subcommand: &str, remote: &str, branch: Option<&str>) -> Vec<String> {
    let mut args = vec![subcommand.to_string(), remote.to_string()];
    if let Some(branch) = branch {
        args.push(branch.to_string());
    }
    args
}

/// Numbered summary of an executed plan
pub fn format_plan(plan: &Plan) -> String {
    if plan.is_empty() {
        return "No additional Git commands were required; using existing context.".to_string();
    }

    plan.iter()
        .enumerate()
        .map(|(idx, item)| format!("{}. {}\n   Reason: {}", idx + 1, item.command, item.reason))
        .collect::<Vec<_>>()
        .join("\n")
}

fn load_settings(repo: Option<PathBuf>) -> AppResult<Settings> {
    let mut settings = Settings::load()?;
    if let Some(repo) = repo {
        settings.repo_path = repo;
    }
    debug!(repo = %settings.repo_path.display(), provider = %settings.llm.provider, "settings loaded");
    Ok(settings)
}

/// Dispatch a parsed command line
pub async fn run(cli: Cli) -> AppResult<ExitCode> {
    let version = GitVersion::validate()?;
    debug!(%version, "git version ok");

    let settings = load_settings(cli.repo)?;

    match cli.command {
        Commands::Ask { question, grep } => run_ask(&settings, &question, grep.as_deref()).await,
        Commands::Agent { question, iterative } => run_agent(&settings, &question, iterative).await,
        Commands::Git(action) => run_git(&settings, &action),
        Commands::Shell { command } => run_shell(&settings, &command),
    }
}

async fn run_ask(settings: &Settings, question: &str, grep: Option<&str>) -> AppResult<ExitCode> {
    let label = settings.provider_label();
    let client = llm::create_client(settings)?;

    let executor = GitExecutor::new(&settings.repo_path);
    let context = ContextBuilder::new(&executor, &settings.context).gather(grep);

    Panel::titled("repo-lens", format!("Context gathered. Querying {}...", label)).print();

    let answer = agent::answer_from_context(client.as_ref(), settings, &context, question).await?;
    Panel::titled(label, answer).print();

    Ok(ExitCode::SUCCESS)
}

async fn run_agent(settings: &Settings, question: &str, iterative: bool) -> AppResult<ExitCode> {
    let label = settings.provider_label();
    let client = llm::create_client(settings)?;

    let mode = if iterative { "tool loop" } else { "command agent" };
    Panel::titled("repo-lens", format!("Running {} with {}...", mode, label)).print();
    info!(mode, "answering question");

    let result = if iterative {
        agent::run_tool_agent(settings, client.as_ref(), question).await?
    } else {
        agent::run_command_agent(settings, client.as_ref(), question).await?
    };

    print_run(&result, &label);
    Ok(ExitCode::SUCCESS)
}

fn print_run(result: &AgentRunResult, label: &str) {
    if !result.executions.is_empty() {
        Panel::titled("Executed Git commands", format_plan(&result.plan)).print();

        for execution in &result.executions {
            let (status, style) = if execution.success {
                ("success", PanelStyle::Info)
            } else {
                ("failed", PanelStyle::Error)
            };
            Panel::titled(
                format!("$ {} ({})", execution.command, status),
                format!("Reason: {}\n\n{}", execution.reason, execution.output),
            )
            .with_style(style)
            .print();
        }
    }

    Panel::titled(label, result.answer.as_str())
        .with_style(PanelStyle::Success)
        .print();
}

fn run_git(settings: &Settings, action: &GitAction) -> AppResult<ExitCode> {
    let args = action.git_args()?;
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let executor = GitExecutor::new(&settings.repo_path);
    let output = executor.run(&args)?;
    if !output.is_empty() {
        println!("{}", output);
    }

    Ok(ExitCode::SUCCESS)
}

/// User-typed command; goes through the shell on purpose, unlike anything the
/// model proposes
fn run_shell(settings: &Settings, command: &str) -> AppResult<ExitCode> {
    debug!(command, "running shell command");
    let status = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(&settings.repo_path)
        .status()?;

    Ok(match status.code() {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => ExitCode::FAILURE,
    })
}
