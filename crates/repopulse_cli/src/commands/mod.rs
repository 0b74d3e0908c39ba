pub(crate) mod analyze;
pub(crate) mod meta;
pub(crate) mod output;
pub(crate) mod watch;

use repopulse::{AnalyticsError, AnalyticsSession, GitHubClient};

use crate::config::Config;

/// Arguments shared by every command that analyzes a repository.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct RepoArgs {
    /// Repository as owner/name (e.g., rust-lang/rust)
    pub repo: String,

    /// GitHub token (overrides config and environment)
    #[arg(short, long)]
    pub token: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = output::OutputFormat::Table)]
    pub output: output::OutputFormat,
}

/// Build a session whose notifications are printed as they happen.
pub(crate) fn build_session(
    args: &RepoArgs,
    config: &Config,
    interval_override: Option<u64>,
) -> Result<AnalyticsSession, AnalyticsError> {
    let token = config.github_token(args.token.clone());
    if token.is_none() {
        tracing::debug!("No GitHub token configured, using unauthenticated requests");
    }
    let client = GitHubClient::new(token.as_deref(), &config.client_options())?;
    output::install_notification_printer(client.notifications());
    Ok(AnalyticsSession::new(
        client,
        config.session_options(interval_override),
    ))
}
