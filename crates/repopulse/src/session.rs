//! The session facade: analyze a repository and keep it fresh.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;

use crate::analytics::{
    Aggregator, AnalyticsSnapshot, MetricsEstimator, PipelineOptions, RandomEstimator,
    RepositoryId,
};
use crate::github::error::{Result, short_error_message};
use crate::github::{DEFAULT_PAGE_SIZE, GitHubClient};
use crate::notify::NotificationCenter;
use crate::poller::{DEFAULT_POLL_INTERVAL, Poller};
use crate::store::{Generation, SessionState, SessionView, SnapshotStore};

/// Tunables of an [`AnalyticsSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub poll_interval: Duration,
    pub page_size: u32,
    pub top_contributors: usize,
    pub recent_commits: usize,
    pub activity_weeks: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            page_size: DEFAULT_PAGE_SIZE,
            top_contributors: 6,
            recent_commits: 10,
            activity_weeks: 7,
        }
    }
}

impl SessionOptions {
    pub fn pipeline(&self) -> PipelineOptions {
        PipelineOptions {
            page_size: self.page_size,
            top_contributors: self.top_contributors,
            recent_commits: self.recent_commits,
            activity_weeks: self.activity_weeks,
        }
    }
}

/// Analyzes one repository at a time and optionally polls it.
///
/// Cloning is cheap; clones share the same store, poller and client.
///
/// ```ignore
/// let session = AnalyticsSession::new(client, SessionOptions::default());
/// let snapshot = session.analyze("rust-lang/rust").await?;
/// session.configure_polling(true);
/// let mut updates = session.subscribe();
/// while updates.changed().await.is_ok() {
///     render(&updates.borrow_and_update());
/// }
/// ```
#[derive(Clone)]
pub struct AnalyticsSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    client: Mutex<GitHubClient>,
    aggregator: Aggregator,
    store: SnapshotStore,
    poller: Mutex<Poller>,
    polling_enabled: AtomicBool,
    poll_interval: Duration,
    notifications: NotificationCenter,
}

impl AnalyticsSession {
    /// Create a session with random placeholder estimates.
    pub fn new(client: GitHubClient, options: SessionOptions) -> Self {
        Self::with_estimator(client, options, Arc::new(RandomEstimator::new()))
    }

    pub fn with_estimator(
        client: GitHubClient,
        options: SessionOptions,
        estimator: Arc<dyn MetricsEstimator>,
    ) -> Self {
        let notifications = client.notifications().clone();
        Self {
            inner: Arc::new(SessionInner {
                client: Mutex::new(client),
                aggregator: Aggregator::new(options.pipeline(), estimator),
                store: SnapshotStore::new(),
                poller: Mutex::new(Poller::new()),
                polling_enabled: AtomicBool::new(false),
                poll_interval: options.poll_interval,
                notifications,
            }),
        }
    }

    /// Run a full fetch for `input` (`owner/name`) and commit the result.
    ///
    /// A malformed identifier fails without any request and leaves the store
    /// as it was. Any running poll timer is stopped before the fetch starts;
    /// it restarts on success when polling is enabled. On failure the store
    /// is cleared and the session returns to `Idle`.
    ///
    /// If a newer `analyze` or a `reset` happens while this fetch is in
    /// flight, the result is returned to the caller but not committed.
    /// Dropping the returned future before it completes counts as a failure:
    /// the session returns to `Idle` with a cancellation error.
    pub async fn analyze(&self, input: &str) -> Result<Arc<AnalyticsSnapshot>> {
        let inner = &self.inner;
        let id = match RepositoryId::parse(input) {
            Ok(id) => id,
            Err(err) => {
                inner.notifications.error(err.to_string());
                inner.store.record_error(err.to_string());
                return Err(err);
            }
        };

        let generation = {
            let mut poller = inner.lock_poller();
            poller.bind_current_runtime();
            poller.stop();
            inner.store.begin(&id)
        };
        let pending = PendingAnalysis {
            inner: &**inner,
            id: &id,
            generation,
            armed: true,
        };
        let client = inner.client();
        tracing::debug!(repo = %id, "Analyzing repository");

        let result = inner.aggregator.run(&client, &id).await;
        pending.disarm();

        match result {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                if inner.store.replace(generation, Arc::clone(&snapshot)) {
                    tracing::info!(
                        repo = %id,
                        commits = snapshot.stats.total_commits,
                        contributors = snapshot.stats.contributors,
                        "Snapshot committed"
                    );
                    SessionInner::sync_polling(inner);
                } else {
                    tracing::debug!(repo = %id, "Discarding result of a superseded analysis");
                }
                Ok(snapshot)
            }
            Err(err) => {
                if inner.fail(generation, err.to_string()) {
                    tracing::debug!(repo = %id, error = %short_error_message(&err), "Analysis failed");
                } else {
                    tracing::debug!(repo = %id, "Discarding failure of a superseded analysis");
                }
                Err(err)
            }
        }
    }

    /// Turn periodic refresh on or off.
    ///
    /// Takes effect immediately when a snapshot is committed, otherwise after
    /// the next successful analysis.
    pub fn configure_polling(&self, enabled: bool) {
        self.inner.polling_enabled.store(enabled, Ordering::SeqCst);
        SessionInner::sync_polling(&self.inner);
    }

    pub fn polling_enabled(&self) -> bool {
        self.inner.polling_enabled.load(Ordering::SeqCst)
    }

    /// Change the token used by subsequent fetches.
    ///
    /// A fetch already in flight keeps the token it started with.
    pub fn set_token(&self, token: Option<String>) {
        let mut client = self.inner.lock_client();
        *client = client.with_token(token);
    }

    /// Clear the snapshot, stop polling and return to `Idle`.
    pub fn reset(&self) {
        let mut poller = self.inner.lock_poller();
        poller.stop();
        self.inner.store.reset();
    }

    pub fn snapshot(&self) -> Option<Arc<AnalyticsSnapshot>> {
        self.inner.store.snapshot()
    }

    pub fn state(&self) -> SessionState {
        self.inner.store.state()
    }

    pub fn repository(&self) -> Option<RepositoryId> {
        self.inner.store.repository()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.store.last_error()
    }

    pub fn view(&self) -> SessionView {
        self.inner.store.view()
    }

    /// Receive a [`SessionView`] after every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.inner.store.subscribe()
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.inner.notifications
    }

    pub fn is_polling(&self) -> bool {
        self.inner.lock_poller().is_running()
    }
}

impl SessionInner {
    fn client(&self) -> GitHubClient {
        self.lock_client().clone()
    }

    fn lock_client(&self) -> MutexGuard<'_, GitHubClient> {
        self.client.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_poller(&self) -> MutexGuard<'_, Poller> {
        self.poller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear the store for `generation` and stop polling.
    ///
    /// Returns `false` when a newer request superseded `generation`.
    fn fail(&self, generation: Generation, message: String) -> bool {
        let mut poller = self.lock_poller();
        let failed = self.store.fail(generation, message);
        if failed {
            poller.stop();
        }
        failed
    }

    /// Bring the poll timer in line with the polling flag and the store.
    ///
    /// The store is read under the poller lock so a concurrent `reset` cannot
    /// slip in between the check and the start.
    fn sync_polling(this: &Arc<Self>) {
        let enabled = this.polling_enabled.load(Ordering::SeqCst);
        let mut poller = this.lock_poller();
        let target = this
            .store
            .repository()
            .filter(|_| this.store.state().has_snapshot());

        let polling = match (enabled, target) {
            (true, Some(target)) => {
                if poller.is_running() && poller.target() == Some(&target) {
                    true
                } else {
                    let session = Arc::downgrade(this);
                    poller.start(target, this.poll_interval, move |id| {
                        poll_tick(Weak::clone(&session), id)
                    })
                }
            }
            _ => {
                poller.stop();
                false
            }
        };
        this.store.set_polling(polling);
    }
}

/// Fails its generation on drop unless disarmed.
///
/// Covers an `analyze` future dropped mid-fetch, so the store never stays
/// `Loading`.
struct PendingAnalysis<'a> {
    inner: &'a SessionInner,
    id: &'a RepositoryId,
    generation: Generation,
    armed: bool,
}

impl PendingAnalysis<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingAnalysis<'_> {
    fn drop(&mut self) {
        if self.armed
            && self
                .inner
                .fail(self.generation, format!("Analysis of {} was cancelled", self.id))
        {
            tracing::debug!(repo = %self.id, "Analysis cancelled");
        }
    }
}

/// One poll tick: re-run the pipeline and merge into the current snapshot.
///
/// Failures are logged and leave the snapshot untouched.
async fn poll_tick(session: Weak<SessionInner>, id: RepositoryId) {
    let Some(inner) = session.upgrade() else {
        return;
    };
    let generation = inner.store.generation();
    if inner.store.repository().as_ref() != Some(&id) {
        return;
    }

    let client = inner.client();
    match inner.aggregator.run(&client, &id).await {
        Ok(update) => {
            if inner.store.merge(generation, update) {
                tracing::debug!(repo = %id, "Merged poll update");
            } else {
                tracing::debug!(repo = %id, "Discarding stale poll update");
            }
        }
        Err(err) => {
            tracing::warn!(
                repo = %id,
                error = %short_error_message(&err),
                "Poll failed; keeping previous snapshot"
            );
        }
    }
}

impl std::fmt::Debug for AnalyticsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsSession")
            .field("state", &self.state())
            .field("repository", &self.repository())
            .field("polling_enabled", &self.polling_enabled())
            .finish_non_exhaustive()
    }
}
