//! Snapshot data model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::github::AnalyticsError;

/// A repository identified as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RepositoryId {
    pub owner: String,
    pub name: String,
}

impl RepositoryId {
    /// Parse `owner/name`.
    ///
    /// Surrounding whitespace is ignored. Exactly one `/` with non-empty
    /// halves is required; anything else is a validation error.
    pub fn parse(input: &str) -> Result<Self, AnalyticsError> {
        let trimmed = input.trim();
        let Some((owner, name)) = trimmed.split_once('/') else {
            return Err(AnalyticsError::validation(input));
        };
        let (owner, name) = (owner.trim(), name.trim());
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(AnalyticsError::validation(input));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    #[inline]
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepositoryId {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Share of the codebase written in one language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageEntry {
    pub name: String,
    pub bytes: u64,
    /// Percentage of total bytes, one decimal.
    pub percentage: f64,
    /// Hex display color.
    pub color: String,
}

/// Profile fields fetched for a top contributor.
///
/// All fields are empty/zero when the profile lookup failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContributorProfile {
    pub followers: u64,
    pub public_repos: u64,
    pub bio: String,
    pub company: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributorEntry {
    pub login: String,
    /// Profile name, or the login when the profile has none.
    pub display_name: String,
    pub avatar_url: String,
    pub html_url: String,
    pub commits: u64,
    /// Share of all commits, whole percent.
    pub percentage: u32,
    pub profile: ContributorProfile,
    /// Estimated, not measured.
    pub additions: u64,
    /// Estimated, not measured.
    pub deletions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitEntry {
    pub sha: String,
    /// First line of the commit message.
    pub message: String,
    pub author: String,
    pub avatar_url: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub html_url: String,
}

/// Where an activity series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySource {
    /// Weekly totals reported by the API.
    Measured,
    /// Placeholder values generated because the API had no data.
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityPoint {
    pub label: String,
    pub commits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivitySeries {
    pub source: ActivitySource,
    pub points: Vec<ActivityPoint>,
}

impl ActivitySeries {
    #[inline]
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.source == ActivitySource::Synthetic
    }
}

/// Six health scores, each in `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthMetrics {
    pub activity: u32,
    pub community: u32,
    pub maintenance: u32,
    pub documentation: u32,
    pub code_quality: u32,
    pub growth: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryMetadata {
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub homepage: Option<String>,
    pub default_branch: Option<String>,
    pub language: Option<String>,
    pub license: Option<String>,
    pub topics: Vec<String>,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    pub open_issues: u64,
    pub size_kb: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub archived: bool,
    pub fork: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSummary {
    /// Sum of contributions over every contributor.
    pub total_commits: u64,
    /// Size of the full contributor list.
    pub contributors: u64,
    pub pull_requests: u64,
    pub open_issues: u64,
    /// `total_bytes / 50`, an estimate.
    pub lines_of_code: u64,
    pub total_bytes: u64,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
}

/// Everything derived for one repository at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    pub repository: RepositoryId,
    pub metadata: RepositoryMetadata,
    pub stats: StatsSummary,
    pub languages: Vec<LanguageEntry>,
    pub contributors: Vec<ContributorEntry>,
    pub commits: Vec<CommitEntry>,
    pub activity: ActivitySeries,
    pub health: HealthMetrics,
    pub fetched_at: DateTime<Utc>,
}

impl AnalyticsSnapshot {
    /// Shallow-merge a newer snapshot into this one.
    ///
    /// Newer values win per top-level field, except that a synthetic activity
    /// series never replaces a measured one.
    pub fn merge(&mut self, update: AnalyticsSnapshot) {
        let AnalyticsSnapshot {
            repository,
            metadata,
            stats,
            languages,
            contributors,
            commits,
            activity,
            health,
            fetched_at,
        } = update;

        self.repository = repository;
        self.metadata = metadata;
        self.stats = stats;
        self.languages = languages;
        self.contributors = contributors;
        self.commits = commits;
        if !activity.is_synthetic() || self.activity.is_synthetic() {
            self.activity = activity;
        }
        self.health = health;
        self.fetched_at = fetched_at;
    }
}
