use clap::Parser;
use repo_lens::cli::{self, Cli};
use repo_lens::ui::Panel;
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

/// `--verbose` wins; otherwise REPO_LENS_LOG, then RUST_LOG, then warnings only
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("repo_lens=debug,warn")
    } else {
        EnvFilter::try_from_env("REPO_LENS_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Real environment variables take precedence over .env entries
    let dotenv_result = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = dotenv_result {
        if !e.not_found() {
            tracing::warn!("could not load .env: {}", e);
        }
    }

    match cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            Panel::error(e.to_string()).eprint();
            ExitCode::FAILURE
        }
    }
}
