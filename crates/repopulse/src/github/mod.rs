//! GitHub API access for the analytics pipeline.
//!
//! # Module Structure
//!
//! - [`error`] - Error taxonomy shared by the whole pipeline
//! - [`types`] - Wire types for the endpoints we read
//! - [`client`] - Authenticated GET, failure classification, notifications
//! - [`pagination`] - Page-number pagination until a short page
//! - [`rate_limit`] - Rate limit headers and proactive pacing
//!
//! ```ignore
//! use repopulse::github::{ClientOptions, GitHubClient, PaginatedFetchConfig};
//!
//! let client = GitHubClient::new(Some(&token), &ClientOptions::default())?;
//! let config = PaginatedFetchConfig::contributors("rust-lang", "rust", 100);
//! let contributors: Vec<GitHubContributor> = client.fetch_all(&config).await?;
//! ```

mod client;
pub mod error;
mod pagination;
mod rate_limit;
pub mod types;

pub use client::{ClientOptions, GITHUB_ACCEPT, GITHUB_API_URL, GitHubClient, classify_failure};
pub use error::{AnalyticsError, ErrorKind, is_rate_limit_error, short_error_message};
pub use pagination::{DEFAULT_PAGE_SIZE, PaginatedFetchConfig};
pub use rate_limit::{ApiRateLimiter, GITHUB_DEFAULT_RPS, RateLimitInfo, parse_reset_header};
