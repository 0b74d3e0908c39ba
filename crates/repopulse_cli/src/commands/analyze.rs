use repopulse::AnalyticsError;

use super::output::print_snapshot;
use super::{RepoArgs, build_session};
use crate::config::Config;

/// Fetch one snapshot and print it.
pub(crate) async fn handle_analyze(
    args: RepoArgs,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = build_session(&args, config, None)?;
    let snapshot = session.analyze(&args.repo).await.map_err(describe)?;
    print_snapshot(&snapshot, args.output)?;
    Ok(())
}

/// Turn an analysis error into the one-line message shown on exit.
pub(crate) fn describe(err: AnalyticsError) -> Box<dyn std::error::Error> {
    repopulse::github::short_error_message(&err).into()
}
