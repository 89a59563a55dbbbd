use crate::config::types::{Config, CrawlerConfig, OutputConfig, RateLimitConfig, ServiceConfig};
use crate::{ConfigError, ConfigResult};
use std::collections::HashSet;
use url::Url;

/// Upper bound for every configured delay, timeout and interval (one day)
pub const MAX_DURATION_MS: u64 = 24 * 60 * 60 * 1000;

/// Rejects a millisecond setting above `MAX_DURATION_MS`
fn check_duration_ceiling(name: &str, value: u64) -> ConfigResult<()> {
    if value > MAX_DURATION_MS {
        return Err(ConfigError::Validation(format!(
            "{} must be <= {}ms (one day), got {}ms",
            name, MAX_DURATION_MS, value
        )));
    }
    Ok(())
}

/// Validates the entire configuration
///
/// Every check here runs before any network activity, so a bad
/// configuration never costs a request.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_service_config(&config.service)?;
    validate_crawler_config(&config.crawler)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the remote endpoint configuration
fn validate_service_config(config: &ServiceConfig) -> ConfigResult<()> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.query_param.is_empty() {
        return Err(ConfigError::Validation(
            "query_param cannot be empty".to_string(),
        ));
    }

    if config.max_results < 1 {
        return Err(ConfigError::Validation(format!(
            "max_results must be >= 1, got {}",
            config.max_results
        )));
    }

    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(
            "request_timeout must be >= 1ms".to_string(),
        ));
    }
    check_duration_ceiling("request_timeout", config.request_timeout)?;

    Ok(())
}

/// Validates traversal and worker configuration
fn validate_crawler_config(config: &CrawlerConfig) -> ConfigResult<()> {
    validate_alphabet(&config.alphabet)?;

    if config.seed_depth < 1 {
        return Err(ConfigError::Validation(format!(
            "seed_depth must be >= 1, got {}",
            config.seed_depth
        )));
    }

    if config.max_depth < config.seed_depth {
        return Err(ConfigError::Validation(format!(
            "max_depth ({}) must be >= seed_depth ({})",
            config.max_depth, config.seed_depth
        )));
    }

    if config.workers < 1 || config.workers > 100 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 100, got {}",
            config.workers
        )));
    }

    if config.max_in_flight < 1 {
        return Err(ConfigError::Validation(format!(
            "max_in_flight must be >= 1, got {}",
            config.max_in_flight
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.progress_interval < 1 {
        return Err(ConfigError::Validation(
            "progress_interval must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates an alphabet: non-empty, no repeated characters, no control characters
fn validate_alphabet(alphabet: &str) -> ConfigResult<()> {
    if alphabet.is_empty() {
        return Err(ConfigError::InvalidAlphabet(
            "alphabet cannot be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for c in alphabet.chars() {
        if c.is_control() {
            return Err(ConfigError::InvalidAlphabet(format!(
                "alphabet contains control character {:?}",
                c
            )));
        }
        if !seen.insert(c) {
            return Err(ConfigError::InvalidAlphabet(format!(
                "alphabet contains '{}' more than once",
                c
            )));
        }
    }

    Ok(())
}

/// Validates pacing configuration
fn validate_rate_limit_config(config: &RateLimitConfig) -> ConfigResult<()> {
    if config.min_delay < 1 {
        return Err(ConfigError::Validation(
            "min_delay must be >= 1ms".to_string(),
        ));
    }

    if config.max_delay < 1 {
        return Err(ConfigError::Validation(
            "max_delay must be >= 1ms".to_string(),
        ));
    }

    check_duration_ceiling("min_delay", config.min_delay)?;
    check_duration_ceiling("max_delay", config.max_delay)?;
    check_duration_ceiling("retry_delay", config.retry_delay)?;
    check_duration_ceiling("cooldown", config.cooldown)?;

    if config.min_delay > config.max_delay {
        return Err(ConfigError::Validation(format!(
            "min_delay ({}ms) must not exceed max_delay ({}ms)",
            config.min_delay, config.max_delay
        )));
    }

    if !(0.0..1.0).contains(&config.jitter) {
        return Err(ConfigError::Validation(format!(
            "jitter must be in [0, 1), got {}",
            config.jitter
        )));
    }

    if !(config.recovery_factor > 0.0 && config.recovery_factor <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "recovery_factor must be in (0, 1], got {}",
            config.recovery_factor
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> ConfigResult<()> {
    if config.checkpoint_path.is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint_path cannot be empty".to_string(),
        ));
    }

    if config.artifact_path.is_empty() {
        return Err(ConfigError::Validation(
            "artifact_path cannot be empty".to_string(),
        ));
    }

    if config.checkpoint_path == config.artifact_path {
        return Err(ConfigError::Validation(
            "checkpoint_path and artifact_path must differ".to_string(),
        ));
    }

    if config.checkpoint_interval < 1 {
        return Err(ConfigError::Validation(
            "checkpoint_interval must be >= 1ms".to_string(),
        ));
    }
    check_duration_ceiling("checkpoint_interval", config.checkpoint_interval)?;

    Ok(())
}
