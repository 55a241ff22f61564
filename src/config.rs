//! Configuration for the tracker.
//!
//! Every numeric default here is a starting point, not a contract; all of
//! them can be overridden in code or in the JSON config file.

use crate::clock::Millis;
use crate::core::queue::QueuePolicy;
use crate::transport::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Collector endpoint that receives event batches
    pub endpoint: String,

    /// Application name stamped on every event as `appName`
    pub app_name: Option<String>,

    /// Track a pageview on install and on every navigation
    pub auto_page_view: bool,

    /// Track clicks anywhere in the document
    pub auto_click: bool,

    /// Which other collectors to run
    pub sources: SourceConfig,

    /// Events per payload; reaching it triggers a flush
    pub batch_size: usize,

    /// Maximum age of the oldest buffered event before a flush
    #[serde(with = "duration_ms")]
    pub flush_interval: Duration,

    /// Delivery attempts per batch before it is dropped
    pub max_retries: u32,

    /// Delay before the first retry
    #[serde(with = "duration_ms")]
    pub retry_base_delay: Duration,

    /// Growth factor between retries
    pub retry_multiplier: f64,

    /// Upper bound for a single retry delay
    #[serde(with = "duration_ms")]
    pub max_retry_delay: Duration,

    /// Buffered events beyond this are dropped, lowest priority first
    pub max_queue_size: usize,

    /// How soon a high-priority event forces a flush
    #[serde(with = "duration_ms")]
    pub high_priority_delay: Duration,

    /// Inactivity after which a new session starts
    #[serde(with = "duration_ms")]
    pub session_timeout: Duration,

    /// At most one scroll event per window
    #[serde(with = "duration_ms")]
    pub scroll_throttle: Duration,

    /// Quiet period after typing before an input event
    #[serde(with = "duration_ms")]
    pub input_debounce: Duration,

    /// How long to wait for first-contentful-paint before reporting timings
    #[serde(with = "duration_ms")]
    pub performance_settle: Duration,

    /// Per-request timeout for the HTTP transport
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,

    /// Extra headers sent with every payload
    pub headers: BTreeMap<String, String>,

    /// Report panics of the embedding process as error events
    pub capture_panics: bool,

    /// Default exposure threshold (intersection ratio, inclusive)
    pub exposure_threshold: f64,

    /// Default time an element must stay visible to count as exposed
    #[serde(with = "duration_ms")]
    pub exposure_min_duration: Duration,

    /// Location of the initial page
    pub initial_url: String,

    /// Referrer of the initial page
    pub referrer: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            app_name: None,
            auto_page_view: true,
            auto_click: true,
            sources: SourceConfig::default(),
            batch_size: 10,
            flush_interval: Duration::from_secs(5),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            retry_multiplier: 2.0,
            max_retry_delay: Duration::from_secs(30),
            max_queue_size: 1_000,
            high_priority_delay: Duration::ZERO,
            session_timeout: Duration::from_secs(30 * 60),
            scroll_throttle: Duration::from_millis(200),
            input_debounce: Duration::from_millis(500),
            performance_settle: Duration::from_secs(3),
            request_timeout: Duration::from_secs(10),
            headers: BTreeMap::new(),
            capture_panics: true,
            exposure_threshold: 0.5,
            exposure_min_duration: Duration::from_secs(1),
            initial_url: String::new(),
            referrer: String::new(),
        }
    }
}

impl TrackerConfig {
    /// Default configuration pointed at `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Check that tracking is possible with these options.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        validate_endpoint(endpoint)?;

        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_queue_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_queue_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.retry_multiplier.is_finite() && self.retry_multiplier >= 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "retry_multiplier",
                reason: format!("must be a finite number >= 1, got {}", self.retry_multiplier),
            });
        }
        if !(self.exposure_threshold > 0.0 && self.exposure_threshold <= 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "exposure_threshold",
                reason: format!("must be in (0, 1], got {}", self.exposure_threshold),
            });
        }
        if self.session_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "session_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn queue_policy(&self) -> QueuePolicy {
        QueuePolicy {
            batch_size: self.batch_size,
            flush_interval_ms: as_millis(self.flush_interval),
            max_queue_size: self.max_queue_size,
            high_priority_delay_ms: as_millis(self.high_priority_delay),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            base_delay: self.retry_base_delay,
            multiplier: self.retry_multiplier,
            max_delay: self.max_retry_delay,
        }
    }

    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: TrackerConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Load from the default location, falling back to defaults when absent.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }

    /// Default config file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-tracker")
            .join("config.json")
    }
}

#[cfg(feature = "http")]
fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    let url = reqwest::Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

#[cfg(not(feature = "http"))]
fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    // Without the HTTP transport any non-empty target is accepted.
    let _ = endpoint;
    Ok(())
}

pub(crate) fn as_millis(duration: Duration) -> Millis {
    Millis::try_from(duration.as_millis()).unwrap_or(Millis::MAX)
}

/// Which collectors besides clicks run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub scroll: bool,
    pub input: bool,
    pub navigation: bool,
    pub performance: bool,
    pub errors: bool,
    pub exposure: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::all()
    }
}

impl SourceConfig {
    pub fn all() -> Self {
        Self {
            scroll: true,
            input: true,
            navigation: true,
            performance: true,
            errors: true,
            exposure: true,
        }
    }

    pub fn none() -> Self {
        Self {
            scroll: false,
            input: false,
            navigation: false,
            performance: false,
            errors: false,
            exposure: false,
        }
    }

    /// Parse source configuration from a comma-separated string.
    pub fn from_csv(s: &str) -> Self {
        let sources: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();
        let has = |name: &str| sources.iter().any(|s| s == name || s == "all");

        Self {
            scroll: has("scroll"),
            input: has("input"),
            navigation: has("navigation"),
            performance: has("performance"),
            errors: has("errors") || has("error"),
            exposure: has("exposure"),
        }
    }

    /// Check if at least one source is enabled.
    pub fn any_enabled(&self) -> bool {
        self.scroll
            || self.input
            || self.navigation
            || self.performance
            || self.errors
            || self.exposure
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("endpoint is required")]
    MissingEndpoint,
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("failed to build transport: {0}")]
    Transport(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Serde support for Duration as integer milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
