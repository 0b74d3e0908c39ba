//! Derived metrics: turn raw API data into an [`AnalyticsSnapshot`].
//!
//! Everything here is a pure function of its inputs, the injected
//! [`MetricsEstimator`] and the supplied clock reading.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::aggregator::PipelineOptions;
use super::estimator::MetricsEstimator;
use super::languages::language_color;
use super::model::{
    ActivityPoint, ActivitySeries, ActivitySource, AnalyticsSnapshot, CommitEntry,
    ContributorEntry, ContributorProfile, HealthMetrics, LanguageEntry, RepositoryId,
    RepositoryMetadata, StatsSummary,
};
use crate::github::types::{
    GitHubCommit, GitHubContributor, GitHubRepo, LanguageBytes, UserProfile, WeeklyCommitActivity,
};

/// Bytes per line used by the lines-of-code estimate.
pub const BYTES_PER_LINE: f64 = 50.0;

/// Day labels of the synthetic activity series.
pub const SYNTHETIC_DAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Everything the aggregator fetched for one repository.
#[derive(Debug, Clone)]
pub struct RawRepositoryData {
    pub repository: RepositoryId,
    pub repo: GitHubRepo,
    pub commits: Vec<GitHubCommit>,
    pub languages: LanguageBytes,
    /// The full contributor list.
    pub contributors: Vec<GitHubContributor>,
    /// `None` when the weekly statistics were unavailable.
    pub weekly_activity: Option<Vec<WeeklyCommitActivity>>,
    pub pull_requests: u64,
    /// Profiles of the top contributors keyed by login. Missing entries mean
    /// the lookup failed.
    pub profiles: BTreeMap<String, UserProfile>,
}

/// Build a snapshot from raw data.
pub fn derive_snapshot(
    raw: RawRepositoryData,
    options: &PipelineOptions,
    estimator: &dyn MetricsEstimator,
    now: DateTime<Utc>,
) -> AnalyticsSnapshot {
    let metadata = repository_metadata(&raw.repo);
    let languages = language_entries(&raw.languages);
    let total_bytes: u64 = raw.languages.values().sum();
    let total_commits = total_commits(&raw.contributors);

    let top = top_contributors(&raw.contributors, options.top_contributors);
    let top_commits: Vec<u64> = top.iter().map(|c| c.contributions).collect();
    let percentages = contribution_percentages(&top_commits, total_commits);
    let contributors = top
        .into_iter()
        .zip(percentages)
        .map(|(contributor, percentage)| {
            let profile = raw.profiles.get(&contributor.login);
            contributor_entry(contributor, profile, percentage, estimator)
        })
        .collect();

    let commits = raw
        .commits
        .iter()
        .take(options.recent_commits)
        .map(commit_entry)
        .collect();

    let activity = activity_series(
        raw.weekly_activity.as_deref(),
        options.activity_weeks,
        estimator,
    );

    let stats = StatsSummary {
        total_commits,
        contributors: raw.contributors.len() as u64,
        pull_requests: raw.pull_requests,
        open_issues: metadata.open_issues,
        lines_of_code: lines_of_code(total_bytes),
        total_bytes,
        stars: metadata.stars,
        forks: metadata.forks,
        watchers: metadata.watchers,
    };

    let health = health_metrics(
        &HealthInputs {
            updated_at: metadata.updated_at,
            contributors: stats.contributors,
            stars: metadata.stars,
            open_issues: metadata.open_issues,
            pull_requests: raw.pull_requests,
            size_kb: metadata.size_kb,
        },
        now,
        estimator,
    );

    AnalyticsSnapshot {
        repository: raw.repository,
        metadata,
        stats,
        languages,
        contributors,
        commits,
        activity,
        health,
        fetched_at: now,
    }
}

pub fn repository_metadata(repo: &GitHubRepo) -> RepositoryMetadata {
    let license = repo.license.as_ref().and_then(|license| {
        license
            .spdx_id
            .clone()
            .filter(|id| id != "NOASSERTION")
            .or_else(|| license.name.clone())
    });

    RepositoryMetadata {
        full_name: repo.full_name.clone(),
        description: repo.description.clone(),
        html_url: repo.html_url.clone(),
        homepage: repo.homepage.clone().filter(|h| !h.is_empty()),
        default_branch: repo.default_branch.clone(),
        language: repo.language.clone(),
        license,
        topics: repo.topics.clone(),
        stars: repo.stargazers_count,
        forks: repo.forks_count,
        watchers: repo.subscribers_count.unwrap_or(repo.watchers_count),
        open_issues: repo.open_issues_count,
        size_kb: repo.size,
        created_at: repo.created_at,
        updated_at: repo.updated_at,
        pushed_at: repo.pushed_at,
        archived: repo.archived,
        fork: repo.fork,
    }
}

/// Language shares, one decimal, sorted descending by share then by name.
///
/// Empty when the byte total is zero.
pub fn language_entries(languages: &LanguageBytes) -> Vec<LanguageEntry> {
    let total: u64 = languages.values().sum();
    if total == 0 {
        return Vec::new();
    }

    let mut entries: Vec<LanguageEntry> = languages
        .iter()
        .map(|(name, &bytes)| LanguageEntry {
            name: name.clone(),
            bytes,
            percentage: round_to_tenth(bytes as f64 / total as f64 * 100.0),
            color: language_color(name).to_string(),
        })
        .collect();

    entries.sort_by(|a, b| {
        b.percentage
            .total_cmp(&a.percentage)
            .then_with(|| a.name.cmp(&b.name))
    });
    entries
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Approximate lines of code from a byte total.
pub fn lines_of_code(total_bytes: u64) -> u64 {
    (total_bytes as f64 / BYTES_PER_LINE).round() as u64
}

/// Sum of contributions across every contributor.
pub fn total_commits(contributors: &[GitHubContributor]) -> u64 {
    contributors.iter().map(|c| c.contributions).sum()
}

/// The `limit` contributors with the most commits, ties in API order.
pub fn top_contributors(contributors: &[GitHubContributor], limit: usize) -> Vec<&GitHubContributor> {
    let mut ranked: Vec<&GitHubContributor> = contributors.iter().collect();
    ranked.sort_by(|a, b| b.contributions.cmp(&a.contributions));
    ranked.truncate(limit);
    ranked
}

/// Whole-percent shares of `total` for each entry of `commits`.
///
/// Each share is rounded to the nearest integer. When rounding pushes the sum
/// past 100, the entries rounded up the furthest give back one point each
/// until it fits. All shares are 0 when `total` is 0.
pub fn contribution_percentages(commits: &[u64], total: u64) -> Vec<u32> {
    if total == 0 {
        return vec![0; commits.len()];
    }

    let exact: Vec<f64> = commits
        .iter()
        .map(|&c| c as f64 / total as f64 * 100.0)
        .collect();
    let mut rounded: Vec<u32> = exact.iter().map(|e| e.round() as u32).collect();

    let sum: u32 = rounded.iter().sum();
    if sum > 100 {
        let mut by_overshoot: Vec<usize> = (0..rounded.len()).collect();
        by_overshoot.sort_by(|&a, &b| {
            let over_a = rounded[a] as f64 - exact[a];
            let over_b = rounded[b] as f64 - exact[b];
            over_b.total_cmp(&over_a)
        });
        for &index in by_overshoot.iter().take((sum - 100) as usize) {
            rounded[index] -= 1;
        }
    }
    rounded
}

pub fn contributor_entry(
    contributor: &GitHubContributor,
    profile: Option<&UserProfile>,
    percentage: u32,
    estimator: &dyn MetricsEstimator,
) -> ContributorEntry {
    let display_name = profile
        .and_then(|p| p.name.clone())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| contributor.login.clone());
    let profile = profile.map(contributor_profile).unwrap_or_default();

    ContributorEntry {
        login: contributor.login.clone(),
        display_name,
        avatar_url: contributor.avatar_url.clone().unwrap_or_default(),
        html_url: contributor
            .html_url
            .clone()
            .unwrap_or_else(|| format!("https://github.com/{}", contributor.login)),
        commits: contributor.contributions,
        percentage,
        profile,
        additions: estimator.additions(contributor.contributions),
        deletions: estimator.deletions(contributor.contributions),
    }
}

fn contributor_profile(profile: &UserProfile) -> ContributorProfile {
    ContributorProfile {
        followers: profile.followers,
        public_repos: profile.public_repos,
        bio: profile.bio.clone().unwrap_or_default(),
        company: profile.company.clone().unwrap_or_default(),
        location: profile.location.clone().unwrap_or_default(),
    }
}

pub fn commit_entry(commit: &GitHubCommit) -> CommitEntry {
    let signature = commit.commit.author.as_ref();
    let author = commit
        .author
        .as_ref()
        .map(|account| account.login.clone())
        .or_else(|| signature.and_then(|s| s.name.clone()))
        .unwrap_or_else(|| "unknown".to_string());
    let avatar_url = commit
        .author
        .as_ref()
        .and_then(|account| account.avatar_url.clone())
        .unwrap_or_else(|| {
            identicon_url(signature.and_then(|s| s.email.as_deref()).unwrap_or_default())
        });

    CommitEntry {
        sha: commit.sha.clone(),
        message: commit.commit.message.lines().next().unwrap_or_default().to_string(),
        author,
        avatar_url,
        timestamp: signature.and_then(|s| s.date),
        html_url: commit.html_url.clone(),
    }
}

/// Generated avatar for an author without a linked account.
pub fn identicon_url(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    format!("https://www.gravatar.com/avatar/{:x}?d=identicon", digest)
}

/// The last `weeks` weeks of measured activity, or a synthetic week.
///
/// Measured points are labelled with the week's start date. Without data
/// (`None` or an empty list) the series is seven `Mon`..`Sun` points drawn
/// from the estimator and flagged as synthetic.
pub fn activity_series(
    weekly: Option<&[WeeklyCommitActivity]>,
    weeks: usize,
    estimator: &dyn MetricsEstimator,
) -> ActivitySeries {
    match weekly {
        Some(weekly) if !weekly.is_empty() => {
            let start = weekly.len().saturating_sub(weeks);
            ActivitySeries {
                source: ActivitySource::Measured,
                points: weekly[start..]
                    .iter()
                    .map(|week| ActivityPoint {
                        label: week_label(week.week),
                        commits: week.total,
                    })
                    .collect(),
            }
        }
        _ => ActivitySeries {
            source: ActivitySource::Synthetic,
            points: SYNTHETIC_DAY_LABELS
                .iter()
                .map(|day| ActivityPoint {
                    label: (*day).to_string(),
                    commits: estimator.synthetic_daily_commits(),
                })
                .collect(),
        },
    }
}

fn week_label(epoch_seconds: i64) -> String {
    DateTime::from_timestamp(epoch_seconds, 0)
        .map(|start| start.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| epoch_seconds.to_string())
}

/// Inputs of [`health_metrics`] taken from the repository.
#[derive(Debug, Clone)]
pub struct HealthInputs {
    pub updated_at: DateTime<Utc>,
    pub contributors: u64,
    pub stars: u64,
    pub open_issues: u64,
    pub pull_requests: u64,
    pub size_kb: u64,
}

/// Six health scores, each clamped to `[0, 100]` then rounded.
pub fn health_metrics(
    inputs: &HealthInputs,
    now: DateTime<Utc>,
    estimator: &dyn MetricsEstimator,
) -> HealthMetrics {
    let days_since_update = (now - inputs.updated_at).num_days() as f64;
    let stars = inputs.stars as f64;

    let activity = score(100.0 - 2.0 * days_since_update);
    let community = score(inputs.contributors as f64 * 5.0 + stars / 100.0);
    let maintenance = score(
        100.0 - 2.0 * inputs.open_issues as f64 + inputs.pull_requests as f64 / 10.0,
    );
    let growth = score((stars / 100.0 + activity as f64 / 2.0).min(100.0));

    HealthMetrics {
        activity,
        community,
        maintenance,
        documentation: estimator.documentation_score(inputs.size_kb > 0).min(100),
        code_quality: estimator.code_quality_score().min(100),
        growth,
    }
}

fn score(value: f64) -> u32 {
    value.clamp(0.0, 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::estimator::FixedEstimator;
    use chrono::TimeDelta;

    fn bytes(pairs: &[(&str, u64)]) -> LanguageBytes {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn contributor(login: &str, contributions: u64) -> GitHubContributor {
        GitHubContributor {
            login: login.to_string(),
            avatar_url: Some(format!("https://avatars.test/{login}")),
            html_url: None,
            contributions,
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_717_200_000, 0).expect("valid timestamp")
    }

    fn inputs(updated_days_ago: i64) -> HealthInputs {
        HealthInputs {
            updated_at: now() - TimeDelta::days(updated_days_ago),
            contributors: 4,
            stars: 250,
            open_issues: 10,
            pull_requests: 30,
            size_kb: 1200,
        }
    }

    #[test]
    fn test_react_languages_and_lines_of_code() {
        let languages = bytes(&[("JavaScript", 800), ("CSS", 200)]);
        let entries = language_entries(&languages);

        let summary: Vec<(&str, f64)> = entries
            .iter()
            .map(|e| (e.name.as_str(), e.percentage))
            .collect();
        assert_eq!(summary, vec![("JavaScript", 80.0), ("CSS", 20.0)]);
        assert_eq!(entries[0].color, "#f1e05a");
        assert_eq!(lines_of_code(1000), 20);
    }

    #[test]
    fn test_language_percentages_sum_to_100_and_sort_descending() {
        let cases = [
            bytes(&[("Rust", 1), ("Go", 1), ("C", 1)]),
            bytes(&[("Rust", 9_999), ("Shell", 1)]),
            bytes(&[("A", 17), ("B", 29), ("C", 31), ("D", 7), ("E", 3)]),
        ];
        for languages in &cases {
            let entries = language_entries(languages);
            let sum: f64 = entries.iter().map(|e| e.percentage).sum();
            let tolerance = 0.05 * entries.len() as f64 + 1e-9;
            assert!((sum - 100.0).abs() <= tolerance, "sum {sum} for {languages:?}");
            assert!(
                entries
                    .windows(2)
                    .all(|pair| pair[0].percentage >= pair[1].percentage)
            );
        }
    }

    #[test]
    fn test_equal_language_shares_break_ties_by_name() {
        let entries = language_entries(&bytes(&[("Zig", 5), ("Ada", 5)]));
        assert_eq!(entries[0].name, "Ada");
        assert_eq!(entries[1].name, "Zig");
    }

    #[test]
    fn test_zero_bytes_yield_no_languages() {
        assert!(language_entries(&bytes(&[])).is_empty());
        assert!(language_entries(&bytes(&[("Rust", 0)])).is_empty());
        assert_eq!(lines_of_code(0), 0);
    }

    #[test]
    fn test_lines_of_code_rounds_to_nearest() {
        assert_eq!(lines_of_code(74), 1);
        assert_eq!(lines_of_code(75), 2);
    }

    #[test]
    fn test_contribution_percentages_never_exceed_100() {
        let cases: [&[u64]; 5] = [&[3, 3, 2], &[1, 1, 1], &[5, 5], &[1, 1, 1, 1, 1, 1], &[7]];
        for commits in cases {
            let total: u64 = commits.iter().sum();
            let shares = contribution_percentages(commits, total);
            let sum: u32 = shares.iter().sum();
            assert!(sum <= 100, "{commits:?} -> {shares:?}");
        }
        assert_eq!(contribution_percentages(&[3, 3, 2], 8).iter().sum::<u32>(), 100);
        assert_eq!(contribution_percentages(&[50, 30], 200), vec![25, 15]);
    }

    #[test]
    fn test_contribution_percentages_zero_total() {
        assert_eq!(contribution_percentages(&[0, 0, 0], 0), vec![0, 0, 0]);
    }

    #[test]
    fn test_total_commits_counts_full_list_and_top_is_limited() {
        let all: Vec<GitHubContributor> = (0..10u64)
            .map(|i| contributor(&format!("user{i}"), i + 1))
            .collect();
        assert_eq!(total_commits(&all), 55);

        let top = top_contributors(&all, 6);
        let logins: Vec<&str> = top.iter().map(|c| c.login.as_str()).collect();
        assert_eq!(logins, vec!["user9", "user8", "user7", "user6", "user5", "user4"]);
    }

    #[test]
    fn test_contributor_entry_uses_profile_or_falls_back() {
        let estimator = FixedEstimator;
        let profile = UserProfile {
            login: "ada".to_string(),
            name: Some("Ada Lovelace".to_string()),
            followers: 12,
            company: Some("Analytical Engines".to_string()),
            ..UserProfile::default()
        };

        let entry = contributor_entry(&contributor("ada", 4), Some(&profile), 40, &estimator);
        assert_eq!(entry.display_name, "Ada Lovelace");
        assert_eq!(entry.profile.followers, 12);
        assert_eq!(entry.profile.company, "Analytical Engines");
        assert_eq!(entry.html_url, "https://github.com/ada");
        assert_eq!(entry.additions, 400);
        assert_eq!(entry.deletions, 140);

        let entry = contributor_entry(&contributor("bob", 1), None, 10, &estimator);
        assert_eq!(entry.display_name, "bob");
        assert_eq!(entry.profile, ContributorProfile::default());
    }

    #[test]
    fn test_commit_entry_first_line_and_identicon_fallback() {
        let raw = serde_json::json!({
            "sha": "abc",
            "html_url": "https://github.com/o/r/commit/abc",
            "commit": {
                "message": "Fix parser\n\nDetails here",
                "author": {"name": "Jane", "email": " Jane@Example.com ", "date": "2024-05-01T10:00:00Z"}
            },
            "author": null
        });
        let commit: GitHubCommit = serde_json::from_value(raw).expect("commit decodes");
        let entry = commit_entry(&commit);

        assert_eq!(entry.message, "Fix parser");
        assert_eq!(entry.author, "Jane");
        assert_eq!(entry.avatar_url, identicon_url("jane@example.com"));
        assert!(entry.avatar_url.starts_with("https://www.gravatar.com/avatar/"));
        assert!(entry.avatar_url.ends_with("?d=identicon"));
        assert!(entry.timestamp.is_some());
    }

    #[test]
    fn test_commit_entry_prefers_linked_account() {
        let raw = serde_json::json!({
            "sha": "def",
            "html_url": "https://github.com/o/r/commit/def",
            "commit": {"message": "One line", "author": null},
            "author": {"login": "octocat", "avatar_url": "https://avatars.test/octocat"}
        });
        let commit: GitHubCommit = serde_json::from_value(raw).expect("commit decodes");
        let entry = commit_entry(&commit);
        assert_eq!(entry.author, "octocat");
        assert_eq!(entry.avatar_url, "https://avatars.test/octocat");
        assert!(entry.timestamp.is_none());
    }

    #[test]
    fn test_identicon_hash_is_sha256_hex() {
        let url = identicon_url("");
        assert_eq!(
            url,
            "https://www.gravatar.com/avatar/e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855?d=identicon"
        );
    }

    #[test]
    fn test_measured_activity_takes_last_weeks() {
        let weekly: Vec<WeeklyCommitActivity> = (0..10)
            .map(|i| WeeklyCommitActivity {
                week: 1_704_067_200 + i * 7 * 86_400,
                total: i as u64,
                days: vec![],
            })
            .collect();

        let series = activity_series(Some(&weekly), 7, &FixedEstimator);
        assert_eq!(series.source, ActivitySource::Measured);
        assert_eq!(series.points.len(), 7);
        assert_eq!(series.points[0].commits, 3);
        assert_eq!(series.points[6].commits, 9);
        assert_eq!(series.points[6].label, "2024-03-04");
    }

    #[test]
    fn test_missing_activity_is_synthetic_week() {
        for weekly in [None, Some(&[][..])] {
            let series = activity_series(weekly, 7, &FixedEstimator);
            assert!(series.is_synthetic());
            let labels: Vec<&str> = series.points.iter().map(|p| p.label.as_str()).collect();
            assert_eq!(labels, SYNTHETIC_DAY_LABELS.to_vec());
            assert!(series.points.iter().all(|p| (1..=10).contains(&p.commits)));
        }
    }

    #[test]
    fn test_activity_score_is_zero_after_50_days() {
        let health = health_metrics(&inputs(50), now(), &FixedEstimator);
        assert_eq!(health.activity, 0);

        let health = health_metrics(&inputs(400), now(), &FixedEstimator);
        assert_eq!(health.activity, 0);
    }

    #[test]
    fn test_health_formulas() {
        let health = health_metrics(&inputs(5), now(), &FixedEstimator);
        assert_eq!(health.activity, 90);
        // 4 * 5 + 250 / 100
        assert_eq!(health.community, 23);
        // 100 - 20 + 3
        assert_eq!(health.maintenance, 83);
        // 2.5 + 45
        assert_eq!(health.growth, 48);
        assert_eq!(health.documentation, 87);
        assert_eq!(health.code_quality, 75);
    }

    #[test]
    fn test_health_scores_are_clamped() {
        let inputs = HealthInputs {
            updated_at: now() + TimeDelta::days(3),
            contributors: 500,
            stars: 1_000_000,
            open_issues: 5_000,
            pull_requests: 0,
            size_kb: 0,
        };
        let health = health_metrics(&inputs, now(), &FixedEstimator);
        assert_eq!(health.activity, 100);
        assert_eq!(health.community, 100);
        assert_eq!(health.maintenance, 0);
        assert_eq!(health.growth, 100);
        assert_eq!(health.documentation, 37);
    }
}
