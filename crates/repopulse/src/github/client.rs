//! GitHub REST client used by the analytics pipeline.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration as StdDuration;

use serde::de::DeserializeOwned;

use super::error::{AnalyticsError, Result, short_error_message};
use super::rate_limit::{ApiRateLimiter, GITHUB_DEFAULT_RPS, RateLimitInfo, parse_reset_header};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpHeaders, HttpRequest, HttpResponse, HttpTransport, status_text};
use crate::notify::NotificationCenter;

/// Default GitHub API host.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Media type requested on every call.
pub const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Connection options for [`GitHubClient::new`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// API base URL (e.g., "https://api.github.com" or a GHES `/api/v3` root).
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: StdDuration,
    /// Proactive pacing; `None` disables it.
    pub requests_per_second: Option<u32>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: GITHUB_API_URL.to_string(),
            timeout: StdDuration::from_secs(30),
            requests_per_second: Some(GITHUB_DEFAULT_RPS),
        }
    }
}

/// GitHub API client.
///
/// Every failure is classified into an [`AnalyticsError`], pushed once to the
/// client's [`NotificationCenter`], and returned to the caller. A
/// [`silenced`](Self::silenced) copy skips the notification so that callers
/// fanning out several requests can report one failure for all of them.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    token: Option<String>,
    rate_limiter: Option<ApiRateLimiter>,
    notifications: NotificationCenter,
    notify: bool,
    last_rate_limit: Arc<Mutex<Option<RateLimitInfo>>>,
}

impl GitHubClient {
    /// Create a client backed by reqwest.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = GitHubClient::new(Some("ghp_..."), &ClientOptions::default())?;
    /// let repo = client.get_json("/repos/rust-lang/rust").await?;
    /// ```
    pub fn new(token: Option<&str>, options: &ClientOptions) -> Result<Self> {
        let transport = ReqwestTransport::with_timeout(options.timeout)?;
        let client = Self::new_with_transport(
            &options.base_url,
            token.map(str::to_string),
            Arc::new(transport),
        );
        Ok(client.with_rate_limiter(options.requests_per_second.map(ApiRateLimiter::new)))
    }

    pub fn new_with_transport(
        base_url: &str,
        token: Option<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            rate_limiter: None,
            notifications: NotificationCenter::new(),
            notify: true,
            last_rate_limit: Arc::new(Mutex::new(None)),
        }
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: Option<ApiRateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// A copy of this client that authenticates with `token`.
    ///
    /// The transport, pacing and notification sink are shared.
    #[must_use]
    pub fn with_token(&self, token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
            ..self.clone()
        }
    }

    /// A copy of this client whose failures are returned but not notified.
    #[must_use]
    pub fn silenced(&self) -> Self {
        Self {
            notify: false,
            ..self.clone()
        }
    }

    /// Push `err` to the notification sink, regardless of silencing.
    pub fn notify_failure(&self, err: &AnalyticsError) {
        self.notifications.error(err.to_string());
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// Rate limit as reported by the most recent response that carried it.
    pub fn rate_limit(&self) -> Option<RateLimitInfo> {
        self.last_rate_limit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// GET `path` and return the decoded JSON body verbatim.
    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        self.get(path).await
    }

    /// GET `path` and deserialize the body into `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(path).await?;
        serde_json::from_slice(&response.body).map_err(|e| self.report(AnalyticsError::Json(e)))
    }

    fn request_headers(&self) -> HttpHeaders {
        let mut headers = vec![
            ("Accept".to_string(), GITHUB_ACCEPT.to_string()),
            ("User-Agent".to_string(), "repopulse".to_string()),
        ];
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("token {}", token)));
        }
        headers
    }

    async fn send(&self, path: &str) -> Result<HttpResponse> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.wait().await;
        }

        let request = HttpRequest {
            url: format!("{}{}", self.base_url, path),
            headers: self.request_headers(),
        };

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| self.report(AnalyticsError::Http(e)))?;

        tracing::debug!(path, status = response.status, "GitHub API response");

        if let Some(info) = RateLimitInfo::from_headers(&response.headers) {
            *self
                .last_rate_limit
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(info);
        }

        if response.is_success() {
            Ok(response)
        } else {
            Err(self.report(classify_failure(path, &response)))
        }
    }

    /// The single error-reporting funnel: notify, then hand the error back.
    fn report(&self, err: AnalyticsError) -> AnalyticsError {
        tracing::debug!(error = %short_error_message(&err), "GitHub API request failed");
        if self.notify {
            self.notify_failure(&err);
        }
        err
    }
}

/// Map a non-success response to an error.
pub fn classify_failure(path: &str, response: &HttpResponse) -> AnalyticsError {
    match response.status {
        404 => AnalyticsError::NotFound {
            path: path.to_string(),
        },
        403 => AnalyticsError::RateLimited {
            reset_at: parse_reset_header(&response.headers),
        },
        status => AnalyticsError::Api {
            status,
            status_text: status_text(status).to_string(),
        },
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token.is_some())
            .field("rate_limiter", &self.rate_limiter)
            .finish()
    }
}
