//! The fetch pipeline: every endpoint needed for one snapshot.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use super::derive::{RawRepositoryData, derive_snapshot, top_contributors};
use super::estimator::{MetricsEstimator, RandomEstimator};
use super::model::{AnalyticsSnapshot, RepositoryId};
use crate::github::error::{AnalyticsError, Result, short_error_message};
use crate::github::types::{
    GitHubCommit, GitHubContributor, GitHubRepo, LanguageBytes, SearchCount, UserProfile,
    WeeklyCommitActivity,
};
use crate::github::{DEFAULT_PAGE_SIZE, GitHubClient, PaginatedFetchConfig};

/// Limits applied by one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Page size for the contributor list.
    pub page_size: u32,
    /// Contributors enriched with a profile and surfaced.
    pub top_contributors: usize,
    /// Most recent commits surfaced.
    pub recent_commits: usize,
    /// Weeks of measured activity surfaced.
    pub activity_weeks: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            top_contributors: 6,
            recent_commits: 10,
            activity_weeks: 7,
        }
    }
}

/// Runs the fetch pipeline and derives a snapshot.
#[derive(Clone)]
pub struct Aggregator {
    options: PipelineOptions,
    estimator: Arc<dyn MetricsEstimator>,
}

impl Aggregator {
    pub fn new(options: PipelineOptions, estimator: Arc<dyn MetricsEstimator>) -> Self {
        Self { options, estimator }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Fetch and derive a snapshot stamped with the current time.
    pub async fn run(&self, client: &GitHubClient, id: &RepositoryId) -> Result<AnalyticsSnapshot> {
        self.run_at(client, id, Utc::now()).await
    }

    /// Fetch and derive a snapshot, using `now` for time-based scores.
    pub async fn run_at(
        &self,
        client: &GitHubClient,
        id: &RepositoryId,
        now: DateTime<Utc>,
    ) -> Result<AnalyticsSnapshot> {
        let raw = self.fetch(client, id).await?;
        Ok(derive_snapshot(
            raw,
            &self.options,
            self.estimator.as_ref(),
            now,
        ))
    }

    /// Fetch every endpoint for `id`.
    ///
    /// The four required endpoints run concurrently with the weekly
    /// statistics and fail fast on the first required failure. The pull
    /// request count and contributor profiles follow; their failures degrade
    /// to defaults.
    ///
    /// A failed run raises exactly one notification. Failures of the
    /// tolerated endpoints are only logged.
    pub async fn fetch(&self, client: &GitHubClient, id: &RepositoryId) -> Result<RawRepositoryData> {
        let quiet = client.silenced();
        let base = format!("/repos/{}/{}", id.owner, id.name);
        let commits_path = format!("{base}/commits?per_page=100");
        let languages_path = format!("{base}/languages");
        let weekly_path = format!("{base}/stats/commit_activity");
        let contributor_pages =
            PaginatedFetchConfig::contributors(&id.owner, &id.name, self.options.page_size);

        let (repo, commits, languages, contributors, weekly_activity) = tokio::try_join!(
            required("repository", quiet.get::<GitHubRepo>(&base)),
            required("commits", quiet.get::<Vec<GitHubCommit>>(&commits_path)),
            required("languages", quiet.get::<LanguageBytes>(&languages_path)),
            required("contributors", quiet.fetch_all::<GitHubContributor>(&contributor_pages)),
            async { Ok::<_, AnalyticsError>(weekly_activity(&quiet, &weekly_path).await) },
        )
        .inspect_err(|err| client.notify_failure(err))?;

        let pull_requests = pull_request_count(&quiet, id).await;
        let profiles = self.profiles(&quiet, &contributors).await;

        tracing::debug!(
            repo = %id,
            commits = commits.len(),
            languages = languages.len(),
            contributors = contributors.len(),
            weekly = weekly_activity.is_some(),
            pull_requests,
            profiles = profiles.len(),
            "Fetched repository data"
        );

        Ok(RawRepositoryData {
            repository: id.clone(),
            repo,
            commits,
            languages,
            contributors,
            weekly_activity,
            pull_requests,
            profiles,
        })
    }

    async fn profiles(
        &self,
        client: &GitHubClient,
        contributors: &[GitHubContributor],
    ) -> BTreeMap<String, UserProfile> {
        let top = top_contributors(contributors, self.options.top_contributors);
        let lookups = top.iter().map(|contributor| async move {
            let path = format!("/users/{}", contributor.login);
            match client.get::<UserProfile>(&path).await {
                Ok(profile) => Some((contributor.login.clone(), profile)),
                Err(err) => {
                    tracing::debug!(
                        login = %contributor.login,
                        error = %short_error_message(&err),
                        "Profile lookup failed"
                    );
                    None
                }
            }
        });
        join_all(lookups).await.into_iter().flatten().collect()
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(PipelineOptions::default(), Arc::new(RandomEstimator::new()))
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

async fn required<T>(
    endpoint: &'static str,
    fetch: impl Future<Output = Result<T>>,
) -> Result<T> {
    fetch
        .await
        .map_err(|err| AnalyticsError::required(endpoint, err))
}

/// Weekly commit totals, or `None` when GitHub has none to give.
///
/// GitHub answers 202 with an empty object while it computes the statistics;
/// anything other than an array counts as no data.
async fn weekly_activity(client: &GitHubClient, path: &str) -> Option<Vec<WeeklyCommitActivity>> {
    let value = match client.get_json(path).await {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(error = %short_error_message(&err), "Weekly activity unavailable");
            return None;
        }
    };
    if !value.is_array() {
        tracing::debug!("Weekly activity not computed yet");
        return None;
    }
    match serde_json::from_value(value) {
        Ok(weeks) => Some(weeks),
        Err(err) => {
            tracing::debug!(error = %err, "Weekly activity could not be decoded");
            None
        }
    }
}

/// Number of pull requests ever opened, 0 when the search fails.
async fn pull_request_count(client: &GitHubClient, id: &RepositoryId) -> u64 {
    let path = format!("/search/issues?q=repo:{}/{}+is:pr&per_page=1", id.owner, id.name);
    match client.get::<SearchCount>(&path).await {
        Ok(result) => result.total_count,
        Err(err) => {
            tracing::debug!(error = %short_error_message(&err), "Pull request count unavailable");
            0
        }
    }
}
