use crate::config::types::{Config, DedupConfig, ExtractConfig, FetchConfig, SearchConfig};
use crate::ConfigError;
use chrono::NaiveDate;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    validate_search_config(&config.search)?;
    validate_extract_config(&config.extract)?;
    validate_dedup_config(&config.dedup)?;

    if config.output.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.crawl.max_pages_per_domain < 1 {
        return Err(ConfigError::Validation(
            "max_pages_per_domain must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Parses a `YYYY-MM-DD` date bound from the config
pub fn parse_config_date(value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| ConfigError::InvalidDate(format!("'{}': {}", value, e)))
}

/// Validates fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_total < 1 || config.max_concurrent_total > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_total must be between 1 and 100, got {}",
            config.max_concurrent_total
        )));
    }

    if config.max_concurrent_per_domain < 1 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_per_domain must be >= 1, got {}",
            config.max_concurrent_per_domain
        )));
    }

    if config.max_concurrent_per_domain > config.max_concurrent_total {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_per_domain ({}) cannot exceed max_concurrent_total ({})",
            config.max_concurrent_per_domain, config.max_concurrent_total
        )));
    }

    if config.timeout_secs == 0 || config.robots_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeouts must be at least 1 second".to_string(),
        ));
    }

    if !(config.base_rate > 0.0) {
        return Err(ConfigError::Validation(format!(
            "base_rate must be positive, got {}",
            config.base_rate
        )));
    }

    if !(config.max_delay >= 0.0) {
        return Err(ConfigError::Validation(format!(
            "max_delay must be >= 0, got {}",
            config.max_delay
        )));
    }

    if config.robots_user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "robots_user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates search configuration
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if config.max_results < 1 {
        return Err(ConfigError::Validation(
            "max_results must be >= 1".to_string(),
        ));
    }

    if config.delay_min_secs < 0.0 || config.delay_max_secs < config.delay_min_secs {
        return Err(ConfigError::Validation(format!(
            "search delay range is invalid: {}..{}",
            config.delay_min_secs, config.delay_max_secs
        )));
    }

    url::Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::Validation(format!("Invalid search endpoint: {}", e)))?;

    Ok(())
}

/// Validates extraction configuration, including the date window
fn validate_extract_config(config: &ExtractConfig) -> Result<(), ConfigError> {
    if config.workers < 1 {
        return Err(ConfigError::Validation(
            "extract workers must be >= 1".to_string(),
        ));
    }

    let from = config.date_from.as_deref().map(parse_config_date).transpose()?;
    let to = config.date_to.as_deref().map(parse_config_date).transpose()?;

    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(ConfigError::Validation(format!(
                "date_from ({}) is after date_to ({})",
                from, to
            )));
        }
    }

    Ok(())
}

/// Validates dedup configuration
fn validate_dedup_config(config: &DedupConfig) -> Result<(), ConfigError> {
    if !(config.threshold > 0.0 && config.threshold <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "dedup threshold must be in (0, 1], got {}",
            config.threshold
        )));
    }

    if config.shingle_size < 1 {
        return Err(ConfigError::Validation(
            "shingle_size must be >= 1".to_string(),
        ));
    }

    if config.bands < 1 || config.num_perm < config.bands || config.num_perm % config.bands != 0 {
        return Err(ConfigError::Validation(format!(
            "num_perm ({}) must be a positive multiple of bands ({})",
            config.num_perm, config.bands
        )));
    }

    Ok(())
}
