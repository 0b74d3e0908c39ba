//! End-to-end tests for `AnalyticsSession` against an in-memory GitHub.
//!
//! The fake API below answers by route instead of by a fixed script, so the
//! same fake serves a full fetch and any number of poll ticks. Its state can
//! be changed between ticks to simulate upstream changes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use repopulse::http::{HttpError, HttpRequest, HttpResponse, HttpTransport};
use repopulse::{
    ActivitySource, AnalyticsError, AnalyticsSession, ErrorKind, FixedEstimator, GitHubClient,
    SessionOptions, SessionState,
};
use serde_json::{Value, json};

const HOST: &str = "https://github.fake";

/// Upper bound for any single test step; exceeding it means a hang.
const STEP_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct FakeRepo {
    stars: u64,
    contributors: usize,
    weekly_available: bool,
    rate_limited: bool,
}

#[derive(Default)]
struct FakeGitHub {
    repo: Mutex<Option<FakeRepo>>,
    contributor_pages: AtomicUsize,
    requests: AtomicUsize,
}

impl FakeGitHub {
    fn with_repo(repo: FakeRepo) -> Arc<Self> {
        Arc::new(Self {
            repo: Mutex::new(Some(repo)),
            ..Self::default()
        })
    }

    fn update(&self, f: impl FnOnce(&mut FakeRepo)) {
        if let Some(repo) = self.repo.lock().expect("fake lock").as_mut() {
            f(repo);
        }
    }

    fn route(&self, path: &str, repo: &FakeRepo) -> Option<Value> {
        let base = "/repos/acme/widget";
        if path == base {
            return Some(json!({
                "full_name": "acme/widget",
                "html_url": "https://github.com/acme/widget",
                "description": "Widgets, at scale",
                "language": "Rust",
                "stargazers_count": repo.stars,
                "forks_count": 7,
                "open_issues_count": 3,
                "size": 2048,
                "updated_at": chrono::Utc::now().to_rfc3339()
            }));
        }
        if path == format!("{base}/commits?per_page=100") {
            return Some(json!([{
                "sha": "c0ffee",
                "html_url": "https://github.com/acme/widget/commit/c0ffee",
                "commit": {"message": "Ship it\n\nfor real", "author": {"name": "Dev", "email": "dev@acme.test", "date": "2024-05-30T12:00:00Z"}},
                "author": null
            }]));
        }
        if path == format!("{base}/languages") {
            return Some(json!({"Rust": 9000, "Shell": 1000}));
        }
        if path == format!("{base}/stats/commit_activity") {
            return Some(if repo.weekly_available {
                Value::Array(
                    (0..10)
                        .map(|i| json!({"week": 1_704_067_200 + i * 604_800, "total": i, "days": [0, 0, 0, 0, 0, 0, i]}))
                        .collect(),
                )
            } else {
                json!({})
            });
        }
        if let Some(page) = path
            .strip_prefix(&format!("{base}/contributors?per_page=100&page="))
            .and_then(|p| p.parse::<usize>().ok())
        {
            self.contributor_pages.fetch_add(1, Ordering::SeqCst);
            let start = (page - 1) * 100;
            let end = (start + 100).min(repo.contributors);
            return Some(Value::Array(
                (start..end)
                    .map(|i| json!({"login": format!("dev{i}"), "contributions": i + 1}))
                    .collect(),
            ));
        }
        if path == "/search/issues?q=repo:acme/widget+is:pr&per_page=1" {
            return Some(json!({"total_count": 55}));
        }
        if let Some(login) = path.strip_prefix("/users/") {
            return Some(json!({"login": login, "name": format!("Dev {login}"), "followers": 1}));
        }
        None
    }
}

#[async_trait]
impl HttpTransport for FakeGitHub {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let path = request
            .url
            .strip_prefix(HOST)
            .ok_or_else(|| HttpError::Transport(format!("unexpected host: {}", request.url)))?
            .to_string();

        let repo = self.repo.lock().expect("fake lock").clone();
        let response = match repo {
            Some(repo) if repo.rate_limited => HttpResponse {
                status: 403,
                headers: vec![
                    ("x-ratelimit-limit".to_string(), "60".to_string()),
                    ("x-ratelimit-remaining".to_string(), "0".to_string()),
                    ("x-ratelimit-reset".to_string(), "1893456000".to_string()),
                ],
                body: br#"{"message":"API rate limit exceeded"}"#.to_vec(),
            },
            Some(repo) => match self.route(&path, &repo) {
                Some(body) => HttpResponse {
                    status: 200,
                    headers: Vec::new(),
                    body: body.to_string().into_bytes(),
                },
                None => not_found(),
            },
            None => not_found(),
        };
        Ok(response)
    }
}

fn not_found() -> HttpResponse {
    HttpResponse {
        status: 404,
        headers: Vec::new(),
        body: br#"{"message":"Not Found"}"#.to_vec(),
    }
}

fn widget(contributors: usize) -> FakeRepo {
    FakeRepo {
        stars: 1500,
        contributors,
        weekly_available: true,
        rate_limited: false,
    }
}

fn session(fake: &Arc<FakeGitHub>) -> AnalyticsSession {
    let transport: Arc<dyn HttpTransport> = Arc::clone(fake) as Arc<dyn HttpTransport>;
    let client = GitHubClient::new_with_transport(HOST, Some("test-token".to_string()), transport);
    let options = SessionOptions {
        poll_interval: POLL_INTERVAL,
        ..SessionOptions::default()
    };
    AnalyticsSession::with_estimator(client, options, Arc::new(FixedEstimator))
}

#[tokio::test]
async fn test_full_analysis_over_paginated_contributors() {
    let fake = FakeGitHub::with_repo(widget(230));
    let session = session(&fake);

    let snapshot = tokio::time::timeout(STEP_TIMEOUT, session.analyze("acme/widget"))
        .await
        .expect("analysis should not hang")
        .expect("analysis should succeed");

    assert_eq!(fake.contributor_pages.load(Ordering::SeqCst), 3);
    assert_eq!(snapshot.stats.contributors, 230);
    // 1 + 2 + ... + 230
    assert_eq!(snapshot.stats.total_commits, 26_565);
    assert_eq!(snapshot.stats.pull_requests, 55);
    assert_eq!(snapshot.stats.lines_of_code, 200);

    let logins: Vec<&str> = snapshot.contributors.iter().map(|c| c.login.as_str()).collect();
    assert_eq!(logins, vec!["dev229", "dev228", "dev227", "dev226", "dev225", "dev224"]);
    assert_eq!(snapshot.contributors[0].display_name, "Dev dev229");
    assert!(snapshot.contributors.iter().map(|c| c.percentage).sum::<u32>() <= 100);

    let languages: Vec<(&str, f64)> = snapshot
        .languages
        .iter()
        .map(|l| (l.name.as_str(), l.percentage))
        .collect();
    assert_eq!(languages, vec![("Rust", 90.0), ("Shell", 10.0)]);

    assert_eq!(snapshot.commits.len(), 1);
    assert_eq!(snapshot.commits[0].message, "Ship it");
    assert!(snapshot.commits[0].avatar_url.contains("?d=identicon"));

    assert_eq!(snapshot.activity.source, ActivitySource::Measured);
    assert_eq!(snapshot.activity.points.len(), 7);
    assert_eq!(snapshot.health.activity, 100);

    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.notifications().active().is_empty());
}

#[tokio::test]
async fn test_unknown_repository_is_not_found() {
    let fake = FakeGitHub::with_repo(widget(3));
    let session = session(&fake);

    let err = session
        .analyze("acme/gadget")
        .await
        .expect_err("unknown repository should fail");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("acme/gadget"));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.snapshot().is_none());
    assert!(session.last_error().is_some());
    assert!(!session.notifications().active().is_empty());
}

#[tokio::test]
async fn test_malformed_identifier_never_reaches_the_network() {
    let fake = FakeGitHub::with_repo(widget(3));
    let session = session(&fake);

    for input in ["widget", "acme/", "/widget", "a/b/c"] {
        let err = session.analyze(input).await.expect_err(input);
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    assert_eq!(fake.requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rate_limit_reports_reset_time() {
    let fake = FakeGitHub::with_repo(FakeRepo {
        rate_limited: true,
        ..widget(3)
    });
    let session = session(&fake);

    let err = session.analyze("acme/widget").await.expect_err("rate limited");
    match &err {
        AnalyticsError::RateLimited { reset_at } => {
            assert_eq!(reset_at.map(|r| r.timestamp()), Some(1_893_456_000));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("Resets at"));
    assert!(repopulse::github::is_rate_limit_error(&err));
}

#[tokio::test(start_paused = true)]
async fn test_polling_refreshes_and_keeps_measured_activity() {
    let fake = FakeGitHub::with_repo(widget(12));
    let session = session(&fake);
    session.configure_polling(true);
    let mut updates = session.subscribe();

    let initial = session.analyze("acme/widget").await.expect("analysis succeeds");
    assert_eq!(session.state(), SessionState::Polling);
    let _ = updates.borrow_and_update();

    // Upstream gains stars while its weekly statistics go stale.
    fake.update(|repo| {
        repo.stars = 2500;
        repo.weekly_available = false;
    });

    tokio::time::timeout(STEP_TIMEOUT * 20, updates.changed())
        .await
        .expect("a poll tick should publish an update")
        .expect("session alive");

    let refreshed = updates
        .borrow_and_update()
        .snapshot
        .clone()
        .expect("snapshot after tick");
    assert_eq!(refreshed.stats.stars, 2500);
    assert_eq!(refreshed.activity, initial.activity);
    assert_eq!(refreshed.activity.source, ActivitySource::Measured);
    assert_eq!(session.state(), SessionState::Polling);

    session.configure_polling(false);
    assert_eq!(session.state(), SessionState::Ready);
    assert!(!session.is_polling());
}

#[tokio::test]
async fn test_switching_repository_replaces_snapshot() {
    let fake = FakeGitHub::with_repo(widget(2));
    let session = session(&fake);
    session.configure_polling(true);

    session.analyze("acme/widget").await.expect("first analysis");
    assert!(session.is_polling());

    session.analyze("acme/gadget").await.expect_err("missing repository");
    assert!(!session.is_polling());
    assert!(session.repository().is_none());

    session.analyze("acme/widget").await.expect("back to a known repository");
    assert!(session.is_polling());

    session.reset();
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.is_polling());
}
