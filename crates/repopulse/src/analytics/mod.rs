//! Snapshot building: fetch, derive, model.
//!
//! - [`model`] - The snapshot and its parts
//! - [`aggregator`] - Concurrent fetch of every endpoint for one repository
//! - [`derive`] - Pure derivations (percentages, estimates, health scores)
//! - [`estimator`] - Pluggable source of placeholder values
//! - [`languages`] - Language display colors

pub mod aggregator;
pub mod derive;
pub mod estimator;
pub mod languages;
pub mod model;

pub use aggregator::{Aggregator, PipelineOptions};
pub use derive::{RawRepositoryData, derive_snapshot};
pub use estimator::{FixedEstimator, MetricsEstimator, RandomEstimator};
pub use languages::{DEFAULT_LANGUAGE_COLOR, language_color};
pub use model::{
    ActivityPoint, ActivitySeries, ActivitySource, AnalyticsSnapshot, CommitEntry,
    ContributorEntry, ContributorProfile, HealthMetrics, LanguageEntry, RepositoryId,
    RepositoryMetadata, StatsSummary,
};
