use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Vocab-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,
    pub output: OutputConfig,
}

/// Remote autocomplete endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Endpoint URL without the query string
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Name of the query-string parameter carrying the prefix
    #[serde(rename = "query-param", default = "default_query_param")]
    pub query_param: String,

    /// Per-query result cap (K); a result of exactly this size is truncated
    #[serde(rename = "max-results", default = "default_max_results")]
    pub max_results: usize,

    /// Timeout for a single request (milliseconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// User agent sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Prefix-space traversal configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Characters prefixes are built from
    #[serde(default = "default_alphabet")]
    pub alphabet: String,

    /// Length of the seed prefixes generated at startup (all lengths up to this)
    #[serde(rename = "seed-depth", default = "default_seed_depth")]
    pub seed_depth: usize,

    /// Longest prefix that will ever be queried
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: usize,

    /// Number of concurrent query workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum number of simultaneous in-flight requests
    #[serde(rename = "max-in-flight", default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Attempts allowed for ordinary failures before a prefix is given up
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Rate-limited attempts tolerated for one prefix before it is given up
    #[serde(rename = "max-throttle-retries", default = "default_max_throttle_retries")]
    pub max_throttle_retries: u32,

    /// Completed queries between progress log lines
    #[serde(rename = "progress-interval", default = "default_progress_interval")]
    pub progress_interval: u64,
}

/// Adaptive pacing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Floor of the pacing target (milliseconds)
    #[serde(rename = "min-delay", default = "default_min_delay")]
    pub min_delay: u64,

    /// Ceiling of the pacing target and of every backoff (milliseconds)
    #[serde(rename = "max-delay", default = "default_max_delay")]
    pub max_delay: u64,

    /// Base delay before retrying an ordinary failure (milliseconds)
    #[serde(rename = "retry-delay", default = "default_retry_delay")]
    pub retry_delay: u64,

    /// Window in which throttle events keep the governor cautious (milliseconds)
    #[serde(default = "default_cooldown")]
    pub cooldown: u64,

    /// Relative random jitter applied to every pacing decision
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// Multiplier applied to the target on success once the cooldown has passed
    #[serde(rename = "recovery-factor", default = "default_recovery_factor")]
    pub recovery_factor: f64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the JSON checkpoint file
    #[serde(rename = "checkpoint-path")]
    pub checkpoint_path: String,

    /// Path to the final sorted entry list
    #[serde(rename = "artifact-path")]
    pub artifact_path: String,

    /// Time between periodic checkpoints (milliseconds)
    #[serde(rename = "checkpoint-interval", default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }
}

impl CrawlerConfig {
    /// Alphabet as a list of characters, in configuration order
    pub fn alphabet_chars(&self) -> Vec<char> {
        self.alphabet.chars().collect()
    }
}

impl RateLimitConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown)
    }
}

impl OutputConfig {
    pub fn checkpoint_interval(&self) -> Duration {
        Duration::from_millis(self.checkpoint_interval)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            alphabet: default_alphabet(),
            seed_depth: default_seed_depth(),
            max_depth: default_max_depth(),
            workers: default_workers(),
            max_in_flight: default_max_in_flight(),
            max_retries: default_max_retries(),
            max_throttle_retries: default_max_throttle_retries(),
            progress_interval: default_progress_interval(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_delay: default_min_delay(),
            max_delay: default_max_delay(),
            retry_delay: default_retry_delay(),
            cooldown: default_cooldown(),
            jitter: default_jitter(),
            recovery_factor: default_recovery_factor(),
        }
    }
}

fn default_query_param() -> String {
    "query".to_string()
}

fn default_max_results() -> usize {
    10
}

fn default_request_timeout() -> u64 {
    10_000
}

fn default_user_agent() -> String {
    format!("vocab-sweep/{}", env!("CARGO_PKG_VERSION"))
}

fn default_alphabet() -> String {
    "abcdefghijklmnopqrstuvwxyz".to_string()
}

fn default_seed_depth() -> usize {
    2
}

fn default_max_depth() -> usize {
    3
}

fn default_workers() -> usize {
    3
}

fn default_max_in_flight() -> usize {
    3
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_throttle_retries() -> u32 {
    8
}

fn default_progress_interval() -> u64 {
    25
}

fn default_min_delay() -> u64 {
    750
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_retry_delay() -> u64 {
    1_000
}

fn default_cooldown() -> u64 {
    60_000
}

fn default_jitter() -> f64 {
    0.2
}

fn default_recovery_factor() -> f64 {
    0.9
}

fn default_checkpoint_interval() -> u64 {
    30_000
}
