use std::sync::Arc;

use console::Term;
use repopulse::AnalyticsSnapshot;

use super::analyze::describe;
use super::output::print_snapshot;
use super::{RepoArgs, build_session};
use crate::config::Config;
use crate::shutdown::shutdown_requested;

/// Fetch a snapshot, then keep refreshing it until Ctrl+C.
///
/// The snapshot is re-rendered after every committed refresh. Failed
/// refreshes keep the last snapshot on screen.
pub(crate) async fn handle_watch(
    args: RepoArgs,
    interval: Option<u64>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = build_session(&args, config, interval)?;
    session.configure_polling(config.polling.enabled);

    let mut updates = session.subscribe();
    let mut shown = session.analyze(&args.repo).await.map_err(describe)?;
    let _ = updates.borrow_and_update();
    render(&shown, &args)?;

    if !session.is_polling() {
        tracing::warn!("Polling is disabled in the configuration, nothing to watch");
        return Ok(());
    }
    tracing::info!(
        repo = %shown.repository,
        interval_secs = config.session_options(interval).poll_interval.as_secs(),
        "Watching for updates"
    );

    loop {
        tokio::select! {
            _ = shutdown_requested() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().snapshot.clone();
                if let Some(snapshot) = snapshot
                    && !Arc::ptr_eq(&snapshot, &shown)
                {
                    render(&snapshot, &args)?;
                    shown = snapshot;
                }
            }
        }
    }

    session.configure_polling(false);
    tracing::debug!(state = %session.state(), "Stopped watching");
    Ok(())
}

fn render(snapshot: &AnalyticsSnapshot, args: &RepoArgs) -> std::io::Result<()> {
    let term = Term::stdout();
    if term.is_term() {
        term.clear_screen()?;
    }
    print_snapshot(snapshot, args.output)
}
