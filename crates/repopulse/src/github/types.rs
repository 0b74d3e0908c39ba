//! GitHub API data types.
//!
//! These structs deserialize GitHub REST responses. We define only the fields
//! we need, which keeps decoding resilient to API changes; most fields are
//! optional or defaulted because the API omits them for deleted accounts,
//! anonymous contributors, and empty repositories.
//!
//! API docs: https://docs.github.com/en/rest

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Repository metadata (`GET /repos/{owner}/{repo}`).
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepo {
    /// Full name including owner (e.g., "owner/repo").
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub homepage: Option<String>,
    pub default_branch: Option<String>,
    /// Primary programming language.
    pub language: Option<String>,
    pub license: Option<GitHubLicense>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    /// Watchers in the "subscribed" sense; `watchers_count` mirrors stars.
    #[serde(default)]
    pub subscribers_count: Option<u64>,
    #[serde(default)]
    pub watchers_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
    /// Size in KB.
    #[serde(default)]
    pub size: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub fork: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubLicense {
    pub spdx_id: Option<String>,
    pub name: Option<String>,
}

/// Language byte counts (`GET /repos/{owner}/{repo}/languages`).
pub type LanguageBytes = BTreeMap<String, u64>;

/// An item of `GET /repos/{owner}/{repo}/commits`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommit {
    pub sha: String,
    pub html_url: String,
    pub commit: GitCommitDetail,
    /// The linked GitHub account, absent when the author email is unknown.
    pub author: Option<GitHubAccount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitCommitDetail {
    pub message: String,
    pub author: Option<GitSignature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitSignature {
    pub name: Option<String>,
    pub email: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubAccount {
    pub login: String,
    pub avatar_url: Option<String>,
}

/// An item of `GET /repos/{owner}/{repo}/contributors`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubContributor {
    pub login: String,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
    #[serde(default)]
    pub contributions: u64,
}

/// User profile (`GET /users/{login}`).
///
/// Every field is defaulted so a failed lookup can be represented by
/// `UserProfile::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub followers: u64,
    pub public_repos: u64,
}

/// One week of `GET /repos/{owner}/{repo}/stats/commit_activity`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WeeklyCommitActivity {
    /// Start of the week, epoch seconds.
    pub week: i64,
    pub total: u64,
    #[serde(default)]
    pub days: Vec<u64>,
}

/// The subset of `GET /search/issues` we read.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchCount {
    pub total_count: u64,
}
