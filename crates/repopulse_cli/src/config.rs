//! Configuration file support for repopulse.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `REPOPULSE_`, e.g., `REPOPULSE_GITHUB_TOKEN`)
//! 3. Config file (./repopulse.toml or ~/.config/repopulse/config.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [github]
//! token = "ghp_..."  # or use REPOPULSE_GITHUB_TOKEN env var
//! url = "https://api.github.com"
//!
//! [polling]
//! enabled = true
//! interval = 30
//!
//! [network]
//! timeout = 30
//! rps = 10  # 0 disables proactive pacing
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use repopulse::github::{GITHUB_API_URL, GITHUB_DEFAULT_RPS};
use repopulse::poller::DEFAULT_POLL_INTERVAL;
use repopulse::{ClientOptions, SessionOptions};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub polling: PollingConfig,
    pub network: NetworkConfig,
}

/// GitHub configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// API token. Can also be set via REPOPULSE_GITHUB_TOKEN or GITHUB_TOKEN.
    pub token: Option<String>,
    /// API base URL, for GitHub Enterprise Server.
    pub url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            url: GITHUB_API_URL.to_string(),
        }
    }
}

/// Auto-refresh settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Whether `watch` keeps refreshing after the first fetch.
    pub enabled: bool,
    /// Seconds between refreshes.
    pub interval: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_POLL_INTERVAL.as_secs(),
        }
    }
}

/// HTTP settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Per-request timeout in seconds.
    pub timeout: u64,
    /// Proactive request pacing; 0 disables it.
    pub rps: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            rps: GITHUB_DEFAULT_RPS,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/repopulse/config.toml)
    /// 3. Local config file (./repopulse.toml)
    /// 4. Environment variables with REPOPULSE_ prefix
    /// 5. Legacy GITHUB_TOKEN when no token was configured
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = Self::default_config_path()
            && path.exists()
        {
            tracing::debug!("Loading config from {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let local_config = PathBuf::from("repopulse.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./repopulse.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., REPOPULSE_POLLING_INTERVAL -> polling.interval
        builder = builder.add_source(
            Environment::with_prefix("REPOPULSE")
                .separator("_")
                .try_parsing(true),
        );

        let mut config = match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        };

        if config.github.token.is_none() {
            config.github.token = std::env::var("GITHUB_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty());
        }
        config
    }

    /// Token to use, preferring an explicit CLI value.
    pub fn github_token(&self, cli_token: Option<String>) -> Option<String> {
        cli_token.or_else(|| self.github.token.clone())
    }

    /// Client options derived from the `[github]` and `[network]` sections.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            base_url: self.github.url.clone(),
            timeout: Duration::from_secs(self.network.timeout.max(1)),
            requests_per_second: (self.network.rps > 0).then_some(self.network.rps),
        }
    }

    /// Session options, with an optional CLI override of the poll interval.
    pub fn session_options(&self, interval_override: Option<u64>) -> SessionOptions {
        let secs = interval_override.unwrap_or(self.polling.interval).max(1);
        SessionOptions {
            poll_interval: Duration::from_secs(secs),
            ..SessionOptions::default()
        }
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "repopulse").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
