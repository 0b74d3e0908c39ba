//! The current snapshot, its lifecycle state, and change notification.
//!
//! Every mutation publishes a fresh [`SessionView`] on a `watch` channel.
//! Writers capture a [`Generation`] when they start; a write carrying an
//! outdated generation is rejected, so a slow fetch can never overwrite the
//! result of a newer request.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;

use crate::analytics::{AnalyticsSnapshot, RepositoryId};

/// Lifecycle state of the analytics session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing analyzed, or the last analysis failed.
    #[default]
    Idle,
    /// A full fetch is in flight.
    Loading,
    /// A snapshot is available and polling is off.
    Ready,
    /// A snapshot is available and the poll timer is running.
    Polling,
}

impl SessionState {
    /// Whether a snapshot is committed in this state.
    #[inline]
    #[must_use]
    pub fn has_snapshot(self) -> bool {
        matches!(self, Self::Ready | Self::Polling)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Polling => "polling",
        };
        f.write_str(label)
    }
}

/// What observers see after each change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionView {
    pub state: SessionState,
    pub snapshot: Option<Arc<AnalyticsSnapshot>>,
    pub error: Option<String>,
    pub repository: Option<RepositoryId>,
}

/// Token identifying the request a write belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

#[derive(Debug, Default)]
struct StoreInner {
    generation: u64,
    state: SessionState,
    snapshot: Option<Arc<AnalyticsSnapshot>>,
    repository: Option<RepositoryId>,
    error: Option<String>,
}

impl StoreInner {
    fn view(&self) -> SessionView {
        SessionView {
            state: self.state,
            snapshot: self.snapshot.clone(),
            error: self.error.clone(),
            repository: self.repository.clone(),
        }
    }

    fn is_current(&self, generation: Generation) -> bool {
        self.generation == generation.0
    }
}

/// Holds at most one fully populated snapshot.
#[derive(Debug)]
pub struct SnapshotStore {
    inner: Mutex<StoreInner>,
    tx: watch::Sender<SessionView>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionView::default());
        Self {
            inner: Mutex::new(StoreInner::default()),
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.tx.subscribe()
    }

    pub fn view(&self) -> SessionView {
        self.lock().view()
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn snapshot(&self) -> Option<Arc<AnalyticsSnapshot>> {
        self.lock().snapshot.clone()
    }

    pub fn repository(&self) -> Option<RepositoryId> {
        self.lock().repository.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// The generation a write started now would carry.
    pub fn generation(&self) -> Generation {
        Generation(self.lock().generation)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.lock().is_current(generation)
    }

    /// Start a full fetch of `repository`.
    ///
    /// Invalidates every in-flight write. The previous snapshot stays
    /// visible only when the same repository is being refreshed.
    pub fn begin(&self, repository: &RepositoryId) -> Generation {
        self.update(|inner| {
            inner.generation += 1;
            if inner.repository.as_ref() != Some(repository) {
                inner.snapshot = None;
            }
            inner.repository = Some(repository.clone());
            inner.state = SessionState::Loading;
            inner.error = None;
            Generation(inner.generation)
        })
    }

    /// Replace the snapshot with the result of a full fetch.
    ///
    /// Returns false, leaving the store untouched, when `generation` is stale.
    pub fn replace(&self, generation: Generation, snapshot: Arc<AnalyticsSnapshot>) -> bool {
        self.update(|inner| {
            if !inner.is_current(generation) {
                return false;
            }
            inner.snapshot = Some(snapshot);
            inner.state = SessionState::Ready;
            inner.error = None;
            true
        })
    }

    /// Merge a poll result into the current snapshot.
    ///
    /// Returns false when `generation` is stale or there is nothing to merge
    /// into.
    pub fn merge(&self, generation: Generation, update: AnalyticsSnapshot) -> bool {
        self.update(|inner| {
            if !inner.is_current(generation) {
                return false;
            }
            let Some(current) = inner.snapshot.as_ref() else {
                return false;
            };
            let mut merged = AnalyticsSnapshot::clone(current);
            merged.merge(update);
            inner.snapshot = Some(Arc::new(merged));
            true
        })
    }

    /// Record a failed full fetch: clear everything and return to `Idle`.
    ///
    /// Returns false, leaving the store untouched, when `generation` is stale.
    pub fn fail(&self, generation: Generation, message: String) -> bool {
        self.update(|inner| {
            if !inner.is_current(generation) {
                return false;
            }
            inner.snapshot = None;
            inner.repository = None;
            inner.state = SessionState::Idle;
            inner.error = Some(message);
            true
        })
    }

    /// Record an error that did not involve a fetch.
    pub fn record_error(&self, message: String) {
        self.update(|inner| inner.error = Some(message));
    }

    /// Switch between `Ready` and `Polling`.
    ///
    /// Ignored unless a snapshot is committed.
    pub fn set_polling(&self, polling: bool) -> SessionState {
        self.update(|inner| {
            if inner.state.has_snapshot() {
                inner.state = if polling {
                    SessionState::Polling
                } else {
                    SessionState::Ready
                };
            }
            inner.state
        })
    }

    /// Drop everything and invalidate in-flight writes.
    pub fn reset(&self) {
        self.update(|inner| {
            let generation = inner.generation + 1;
            *inner = StoreInner {
                generation,
                ..StoreInner::default()
            };
        });
    }

    fn update<R>(&self, f: impl FnOnce(&mut StoreInner) -> R) -> R {
        let mut inner = self.lock();
        let result = f(&mut inner);
        self.tx.send_replace(inner.view());
        result
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{
        ActivityPoint, ActivitySeries, ActivitySource, HealthMetrics, RepositoryMetadata,
        StatsSummary,
    };
    use chrono::DateTime;

    fn id(s: &str) -> RepositoryId {
        RepositoryId::parse(s).expect("valid id")
    }

    fn snapshot(repo: &str, stars: u64, source: ActivitySource) -> AnalyticsSnapshot {
        let at = DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp");
        AnalyticsSnapshot {
            repository: id(repo),
            metadata: RepositoryMetadata {
                full_name: repo.to_string(),
                description: None,
                html_url: format!("https://github.com/{repo}"),
                homepage: None,
                default_branch: None,
                language: None,
                license: None,
                topics: Vec::new(),
                stars,
                forks: 0,
                watchers: 0,
                open_issues: 0,
                size_kb: 0,
                created_at: None,
                updated_at: at,
                pushed_at: None,
                archived: false,
                fork: false,
            },
            stats: StatsSummary {
                stars,
                ..StatsSummary::default()
            },
            languages: Vec::new(),
            contributors: Vec::new(),
            commits: Vec::new(),
            activity: ActivitySeries {
                source,
                points: vec![ActivityPoint {
                    label: "Mon".to_string(),
                    commits: stars,
                }],
            },
            health: HealthMetrics::default(),
            fetched_at: at,
        }
    }

    #[test]
    fn test_full_fetch_lifecycle() {
        let store = SnapshotStore::new();
        assert_eq!(store.state(), SessionState::Idle);

        let generation = store.begin(&id("o/r"));
        assert_eq!(store.state(), SessionState::Loading);

        assert!(store.replace(generation, Arc::new(snapshot("o/r", 1, ActivitySource::Measured))));
        assert_eq!(store.state(), SessionState::Ready);
        assert_eq!(store.snapshot().map(|s| s.stats.stars), Some(1));

        assert_eq!(store.set_polling(true), SessionState::Polling);
        assert_eq!(store.set_polling(false), SessionState::Ready);
    }

    #[test]
    fn test_stale_generation_is_rejected() {
        let store = SnapshotStore::new();
        let first = store.begin(&id("o/first"));
        let second = store.begin(&id("o/second"));
        assert!(first < second);

        assert!(!store.replace(first, Arc::new(snapshot("o/first", 1, ActivitySource::Measured))));
        assert!(store.snapshot().is_none());
        assert!(!store.fail(first, "late failure".to_string()));
        assert_eq!(store.state(), SessionState::Loading);

        assert!(store.replace(second, Arc::new(snapshot("o/second", 2, ActivitySource::Measured))));
        assert_eq!(store.repository(), Some(id("o/second")));
    }

    #[test]
    fn test_failure_clears_store() {
        let store = SnapshotStore::new();
        let generation = store.begin(&id("o/r"));
        store.replace(generation, Arc::new(snapshot("o/r", 1, ActivitySource::Measured)));

        let generation = store.begin(&id("o/r"));
        assert!(store.snapshot().is_some(), "refresh keeps the old snapshot visible");
        assert!(store.fail(generation, "Not found".to_string()));

        let view = store.view();
        assert_eq!(view.state, SessionState::Idle);
        assert!(view.snapshot.is_none());
        assert!(view.repository.is_none());
        assert_eq!(view.error.as_deref(), Some("Not found"));
    }

    #[test]
    fn test_switching_repository_discards_snapshot() {
        let store = SnapshotStore::new();
        let generation = store.begin(&id("o/a"));
        store.replace(generation, Arc::new(snapshot("o/a", 1, ActivitySource::Measured)));

        store.begin(&id("o/b"));
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn test_merge_keeps_measured_activity() {
        let store = SnapshotStore::new();
        let generation = store.begin(&id("o/r"));
        store.replace(generation, Arc::new(snapshot("o/r", 1, ActivitySource::Measured)));

        assert!(store.merge(generation, snapshot("o/r", 5, ActivitySource::Synthetic)));
        let merged = store.snapshot().expect("snapshot");
        assert_eq!(merged.stats.stars, 5);
        assert_eq!(merged.activity.source, ActivitySource::Measured);
        assert_eq!(merged.activity.points[0].commits, 1);
    }

    #[test]
    fn test_merge_without_snapshot_or_after_reset_is_ignored() {
        let store = SnapshotStore::new();
        let generation = store.begin(&id("o/r"));
        assert!(!store.merge(generation, snapshot("o/r", 5, ActivitySource::Measured)));

        store.replace(generation, Arc::new(snapshot("o/r", 1, ActivitySource::Measured)));
        store.reset();
        assert!(!store.merge(generation, snapshot("o/r", 5, ActivitySource::Measured)));
        assert_eq!(store.view(), SessionView::default());
    }

    #[test]
    fn test_set_polling_without_snapshot_is_ignored() {
        let store = SnapshotStore::new();
        assert_eq!(store.set_polling(true), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_subscribers_see_every_change() {
        let store = SnapshotStore::new();
        let mut rx = store.subscribe();

        let generation = store.begin(&id("o/r"));
        rx.changed().await.expect("sender alive");
        assert_eq!(rx.borrow_and_update().state, SessionState::Loading);

        store.replace(generation, Arc::new(snapshot("o/r", 3, ActivitySource::Measured)));
        rx.changed().await.expect("sender alive");
        let view = rx.borrow_and_update().clone();
        assert_eq!(view.state, SessionState::Ready);
        assert_eq!(view.snapshot.map(|s| s.stats.stars), Some(3));
    }
}
