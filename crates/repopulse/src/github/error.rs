//! Error taxonomy for the analytics pipeline.

use chrono::{DateTime, Local, Utc};
use thiserror::Error;

use crate::http::HttpError;

/// Errors that can occur while building an analytics snapshot.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The repository identifier is not of the form `owner/name`.
    #[error("Invalid repository '{input}': expected the form owner/name")]
    Validation { input: String },

    /// The API answered 404.
    #[error(
        "Not found: {path}. Check that the repository owner/name is correct and that it is accessible"
    )]
    NotFound { path: String },

    /// The API answered 403 because the rate limit is exhausted.
    #[error("{}", rate_limit_message(.reset_at))]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    /// Any other non-success status.
    #[error("GitHub API error: {status} {status_text}")]
    Api { status: u16, status_text: String },

    /// Transport failure before a status was received.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// The body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required branch of a concurrent fetch failed, so no snapshot can be
    /// assembled.
    #[error("Incomplete data: fetching {endpoint} failed: {source}")]
    PartialData {
        endpoint: &'static str,
        source: Box<AnalyticsError>,
    },
}

/// Coarse classification of [`AnalyticsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    RateLimited,
    Api,
    PartialData,
}

impl AnalyticsError {
    /// Create a validation error for a malformed identifier.
    #[inline]
    pub fn validation(input: impl Into<String>) -> Self {
        Self::Validation {
            input: input.into(),
        }
    }

    /// Wrap a failure of a required concurrent branch.
    ///
    /// Status-classified errors are returned unchanged so callers still see
    /// the real cause; transport and decode failures become `PartialData`.
    pub fn required(endpoint: &'static str, err: AnalyticsError) -> Self {
        match err {
            e @ (Self::Http(_) | Self::Json(_)) => Self::PartialData {
                endpoint,
                source: Box::new(e),
            },
            other => other,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Api { .. } | Self::Http(_) | Self::Json(_) => ErrorKind::Api,
            Self::PartialData { .. } => ErrorKind::PartialData,
        }
    }
}

fn rate_limit_message(reset_at: &Option<DateTime<Utc>>) -> String {
    match reset_at {
        Some(reset) => format!(
            "GitHub API rate limit exceeded. Resets at {}",
            reset.with_timezone(&Local).format("%H:%M:%S")
        ),
        None => "GitHub API rate limit exceeded. Try again later or configure a token".to_string(),
    }
}

/// Check if an error indicates rate limiting.
pub fn is_rate_limit_error(err: &AnalyticsError) -> bool {
    match err {
        AnalyticsError::RateLimited { .. } => true,
        AnalyticsError::Api { status: 429, .. } => true,
        AnalyticsError::PartialData { source, .. } => is_rate_limit_error(source),
        _ => false,
    }
}

/// Get a short error message suitable for display.
pub fn short_error_message(err: &AnalyticsError) -> String {
    match err {
        AnalyticsError::Validation { input } => format!("Invalid repository: {}", input),
        AnalyticsError::NotFound { path } => format!("Not found: {}", path),
        AnalyticsError::RateLimited { .. } => "Rate limited".to_string(),
        AnalyticsError::Api { status, status_text } => format!("HTTP {}: {}", status, status_text),
        AnalyticsError::Http(_) => "Network error".to_string(),
        AnalyticsError::Json(_) => "JSON parse error".to_string(),
        AnalyticsError::PartialData { endpoint, .. } => format!("Incomplete data: {}", endpoint),
    }
}

/// Result type for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
