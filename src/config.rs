//! Configuration module for uptrail.
//!
//! Loads configuration from environment variables with sensible defaults.
//! The resulting [`ServerConfig`] is built once at startup and handed to each
//! component; nothing reads the environment after that.

use crate::scheduler::RetentionPolicy;

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("GITHUB_REPO is not set (expected owner/name)")]
    MissingRepo,
    #[error("invalid repository {0:?} (expected owner/name)")]
    InvalidRepo(String),
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Which halves of the process to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Scheduler and read API in one process.
    All,
    /// Only the probe scheduler.
    Monitor,
    /// Only the dashboard read API.
    Serve,
}

impl RunMode {
    pub fn runs_monitor(self) -> bool {
        matches!(self, RunMode::All | RunMode::Monitor)
    }

    pub fn runs_server(self) -> bool {
        matches!(self, RunMode::All | RunMode::Serve)
    }
}

impl std::str::FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(RunMode::All),
            "monitor" => Ok(RunMode::Monitor),
            "serve" => Ok(RunMode::Serve),
            _ => Err(ConfigError::InvalidValue {
                name: "UPTRAIL_MODE",
                value: s.to_string(),
            }),
        }
    }
}

/// Location of a JSON document in the remote content store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the contents API (default: "https://api.github.com")
    pub api_url: String,
    /// Repository in `owner/name` form
    pub repo: String,
    /// Path of the document inside the repository
    pub path: String,
    /// Branch the document lives on
    pub branch: String,
    /// Access token, sent as `Authorization: token ...` when present
    pub token: Option<String>,
    /// User-Agent header for API requests
    pub user_agent: String,
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the read API (default: 3000)
    pub http_port: u16,
    /// Primary document the scheduler writes to
    pub store: StoreConfig,
    /// Read-only repository the read API falls back to
    pub fallback_repo: Option<String>,
    /// JSON file holding `[{name, url}]`; re-read every cycle
    pub targets_file: Option<PathBuf>,
    /// Name of the single target used when no targets file is configured
    pub target_name: String,
    /// URL of the single target used when no targets file is configured
    pub target_url: String,
    pub probe_timeout: Duration,
    pub interval: Duration,
    /// Maximum number of probes in flight within one cycle
    pub probe_concurrency: usize,
    pub retention: RetentionPolicy,
    /// Directory with the dashboard's static assets
    pub static_dir: PathBuf,
    pub mode: RunMode,
}

pub fn default_user_agent() -> String {
    format!("uptrail/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            repo: String::new(),
            path: "monitoring-data.json".to_string(),
            branch: "main".to_string(),
            token: None,
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 3000,
            store: StoreConfig::default(),
            fallback_repo: None,
            targets_file: None,
            target_name: "default".to_string(),
            target_url: "https://example.com/".to_string(),
            probe_timeout: Duration::from_secs(30),
            interval: Duration::from_secs(60),
            probe_concurrency: 4,
            retention: RetentionPolicy::default(),
            static_dir: PathBuf::from("public"),
            mode: RunMode::All,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `UPTRAIL_HTTP_PORT` or `PORT`: HTTP port (default: 3000)
    /// - `GITHUB_TOKEN`, `GITHUB_REPO`: contents API credentials and repository
    /// - `UPTRAIL_DATA_FILE`, `UPTRAIL_BRANCH`, `UPTRAIL_API_URL`: document location
    /// - `UPTRAIL_FALLBACK_REPO`: read-only fallback repository for the read API
    /// - `UPTRAIL_TARGETS_FILE`, `UPTRAIL_TARGET_NAME`, `UPTRAIL_TARGET_URL`: targets
    /// - `UPTRAIL_PROBE_TIMEOUT_SECS`, `UPTRAIL_INTERVAL_SECS`, `UPTRAIL_PROBE_CONCURRENCY`
    /// - `UPTRAIL_RETENTION`: `count:<n>` or `window:<secs>` (default: count:10080)
    /// - `UPTRAIL_USER_AGENT`, `UPTRAIL_STATIC_DIR`, `UPTRAIL_MODE`
    ///
    /// Unparseable numeric values are ignored in favor of the default.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = lookup("UPTRAIL_HTTP_PORT")
            .or_else(|| lookup("PORT"))
            .and_then(|s| s.parse().ok())
        {
            cfg.http_port = port;
        }

        cfg.store.token = lookup("GITHUB_TOKEN").filter(|t| !t.is_empty());
        if let Some(repo) = lookup("GITHUB_REPO") {
            cfg.store.repo = repo;
        }
        if let Some(path) = lookup("UPTRAIL_DATA_FILE") {
            cfg.store.path = path;
        }
        if let Some(branch) = lookup("UPTRAIL_BRANCH") {
            cfg.store.branch = branch;
        }
        if let Some(api_url) = lookup("UPTRAIL_API_URL") {
            cfg.store.api_url = api_url.trim_end_matches('/').to_string();
        }
        if let Some(agent) = lookup("UPTRAIL_USER_AGENT") {
            cfg.store.user_agent = agent;
        }

        cfg.fallback_repo = lookup("UPTRAIL_FALLBACK_REPO").filter(|r| !r.is_empty());
        cfg.targets_file = lookup("UPTRAIL_TARGETS_FILE").map(PathBuf::from);

        if let Some(name) = lookup("UPTRAIL_TARGET_NAME") {
            cfg.target_name = name;
        }
        if let Some(url) = lookup("UPTRAIL_TARGET_URL") {
            cfg.target_url = url;
        }

        if let Some(timeout) = lookup("UPTRAIL_PROBE_TIMEOUT_SECS").and_then(|s| parse_secs(&s)) {
            cfg.probe_timeout = timeout;
        }
        if let Some(interval) = lookup("UPTRAIL_INTERVAL_SECS").and_then(|s| parse_secs(&s)) {
            cfg.interval = interval;
        }
        if let Some(n) = lookup("UPTRAIL_PROBE_CONCURRENCY").and_then(|s| s.parse::<usize>().ok()) {
            cfg.probe_concurrency = n.max(1);
        }

        if let Some(policy) = lookup("UPTRAIL_RETENTION") {
            cfg.retention = policy.parse().map_err(|_| ConfigError::InvalidValue {
                name: "UPTRAIL_RETENTION",
                value: policy.clone(),
            })?;
        }

        if let Some(dir) = lookup("UPTRAIL_STATIC_DIR") {
            cfg.static_dir = PathBuf::from(dir);
        }
        if let Some(mode) = lookup("UPTRAIL_MODE") {
            cfg.mode = mode.parse()?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the settings that have no usable default.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_repo(&self.store.repo)?;
        if let Some(fallback) = &self.fallback_repo {
            validate_repo(fallback)?;
        }
        Ok(())
    }

    /// Store settings for the read-only fallback document, if one is configured.
    pub fn fallback_store(&self) -> Option<StoreConfig> {
        self.fallback_repo.as_ref().map(|repo| StoreConfig {
            repo: repo.clone(),
            ..self.store.clone()
        })
    }
}

/// Parse fractional seconds into a non-zero duration.
///
/// Values that round to zero or cannot be represented (`inf`, `NaN`,
/// negatives, overflow) yield `None`.
fn parse_secs(value: &str) -> Option<Duration> {
    let secs = value.trim().parse::<f64>().ok()?;
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
}

fn validate_repo(repo: &str) -> Result<(), ConfigError> {
    if repo.is_empty() {
        return Err(ConfigError::MissingRepo);
    }
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => Ok(()),
        _ => Err(ConfigError::InvalidRepo(repo.to_string())),
    }
}
