//! Repopulse - GitHub repository analytics.
//!
//! This library builds a single consistent snapshot of a repository
//! (languages, contributors, recent commits, weekly activity, health scores)
//! from several GitHub REST endpoints, and keeps that snapshot fresh by
//! polling.
//!
//! # Example
//!
//! ```ignore
//! use repopulse::{AnalyticsSession, ClientOptions, GitHubClient, SessionOptions};
//!
//! let client = GitHubClient::new(token.as_deref(), &ClientOptions::default())?;
//! let session = AnalyticsSession::new(client, SessionOptions::default());
//!
//! let snapshot = session.analyze("facebook/react").await?;
//! println!("{} commits", snapshot.stats.total_commits);
//!
//! // Refresh every 30 seconds; observers get a view after every change.
//! session.configure_polling(true);
//! let mut updates = session.subscribe();
//! ```

pub mod analytics;
pub mod github;
pub mod http;
pub mod notify;
pub mod poller;
pub mod session;
pub mod store;

pub use analytics::{
    ActivitySeries, ActivitySource, Aggregator, AnalyticsSnapshot, FixedEstimator,
    MetricsEstimator, RandomEstimator, RepositoryId,
};
pub use github::{AnalyticsError, ClientOptions, ErrorKind, GitHubClient};
pub use notify::{Notification, NotificationCenter, NotificationLevel};
pub use poller::Poller;
pub use session::{AnalyticsSession, SessionOptions};
pub use store::{SessionState, SessionView};
