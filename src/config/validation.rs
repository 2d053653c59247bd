use crate::config::types::{
    ClassifierConfig, Config, CrawlerConfig, ImageConfig, OutputConfig, UserAgentConfig,
};
use crate::ConfigError;
use regex::Regex;
use url::Url;

const MAX_CONCURRENCY: u32 = 32;
const MAX_RETRY_DELAY_MS: u64 = 60_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_classifier_config(&config.classifier)?;
    validate_image_config(&config.images)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.listing_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid listing-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "listing-url must use http or https, got '{}'",
            config.listing_url
        )));
    }

    validate_concurrency("crawler.max-concurrency", config.max_concurrency)?;

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "crawler.max-pages must be >= 1".to_string(),
        ));
    }

    if config.page_retries() < 1 {
        return Err(ConfigError::Validation(
            "crawler.max-page-retries must be >= 1".to_string(),
        ));
    }

    validate_delay("crawler.retry-base-delay-ms", config.retry_base_delay_ms)?;

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "crawler.request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the browser identity
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if !config.referer.is_empty() {
        Url::parse(&config.referer)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid referer: {}", e)))?;
    }

    Ok(())
}

/// Validates classifier rules, compiling every pattern once
fn validate_classifier_config(config: &ClassifierConfig) -> Result<(), ConfigError> {
    for pattern in &config.patterns {
        Regex::new(pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))?;
    }

    if config.bundle_markers.iter().any(|m| m.is_empty()) {
        return Err(ConfigError::Validation(
            "classifier.bundle-markers cannot contain empty strings".to_string(),
        ));
    }

    if config.pattern_score < 0 || config.bundle_penalty < 0 {
        return Err(ConfigError::Validation(
            "classifier scores must be non-negative".to_string(),
        ));
    }

    Ok(())
}

/// Validates image acquisition settings
fn validate_image_config(config: &ImageConfig) -> Result<(), ConfigError> {
    validate_concurrency("images.max-concurrency", config.max_concurrency)?;

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(
            "images.max-retries must be >= 1".to_string(),
        ));
    }

    validate_delay("images.retry-base-delay-ms", config.retry_base_delay_ms)?;

    if !(config.resize_factor > 0.0 && config.resize_factor <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "images.resize-factor must be in (0, 1], got {}",
            config.resize_factor
        )));
    }

    if config.jpeg_quality < 1 || config.jpeg_quality > 100 {
        return Err(ConfigError::Validation(format!(
            "images.jpeg-quality must be between 1 and 100, got {}",
            config.jpeg_quality
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.is_empty() {
        return Err(ConfigError::Validation(
            "output.data-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_concurrency(key: &str, value: u32) -> Result<(), ConfigError> {
    if value < 1 || value > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "{} must be between 1 and {}, got {}",
            key, MAX_CONCURRENCY, value
        )));
    }
    Ok(())
}

fn validate_delay(key: &str, value: u64) -> Result<(), ConfigError> {
    if value > MAX_RETRY_DELAY_MS {
        return Err(ConfigError::Validation(format!(
            "{} must be <= {}ms, got {}ms",
            key, MAX_RETRY_DELAY_MS, value
        )));
    }
    Ok(())
}
