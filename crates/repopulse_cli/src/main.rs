//! Repopulse CLI - GitHub repository analytics in the terminal.

mod commands;
mod config;
mod shutdown;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

use crate::commands::RepoArgs;

#[derive(Parser)]
#[command(name = "repopulse")]
#[command(version)]
#[command(about = "GitHub repository analytics")]
#[command(
    long_about = "Repopulse fetches a GitHub repository's metadata, languages, contributors, \
recent commits and weekly activity, derives health scores from them, and renders \
the result as tables or JSON. The watch command keeps the snapshot fresh by polling."
)]
#[command(after_long_help = r#"EXAMPLES
    Analyze a repository once:
        $ repopulse analyze facebook/react

    Print the snapshot as JSON:
        $ repopulse analyze rust-lang/rust -o json

    Refresh every minute until Ctrl+C:
        $ repopulse watch tokio-rs/tokio --interval 60

    Generate shell completions:
        $ repopulse completions bash > ~/.local/share/bash-completion/completions/repopulse

CONFIGURATION
    Repopulse reads configuration from:
      1. ~/.config/repopulse/config.toml (or $XDG_CONFIG_HOME/repopulse/config.toml)
      2. ./repopulse.toml
      3. Environment variables (REPOPULSE_* prefix, e.g., REPOPULSE_GITHUB_TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    REPOPULSE_GITHUB_TOKEN     GitHub personal access token (GITHUB_TOKEN also works)
    REPOPULSE_GITHUB_URL       API base URL (default: https://api.github.com)
    REPOPULSE_POLLING_ENABLED  Whether watch keeps refreshing (default: true)
    REPOPULSE_POLLING_INTERVAL Seconds between refreshes (default: 30)
    REPOPULSE_NETWORK_TIMEOUT  Request timeout in seconds (default: 30)
    REPOPULSE_NETWORK_RPS      Requests per second, 0 disables pacing (default: 10)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and print a repository snapshot
    Analyze {
        #[command(flatten)]
        args: RepoArgs,
    },
    /// Fetch a snapshot and keep refreshing it until Ctrl+C
    Watch {
        #[command(flatten)]
        args: RepoArgs,

        /// Seconds between refreshes (default from config or 30)
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    shutdown::setup_shutdown_handler();

    // Structured logging only when stdout is not a terminal
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("repopulse=info,repopulse_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        commands::meta::handle_completions(*shell)?;
        return Ok(());
    }

    // Load configuration (config files -> env vars -> defaults)
    let config = config::Config::load();

    match cli.command {
        Commands::Analyze { args } => {
            commands::analyze::handle_analyze(args, &config).await?;
        }
        Commands::Watch { args, interval } => {
            commands::watch::handle_watch(args, interval, &config).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
