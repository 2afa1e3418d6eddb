use super::{types::Config, ConfigError};
use crate::backoff::BackoffPolicy;

/// Inclusive page size range accepted by the favorites API.
const PAGE_SIZE_RANGE: (u32, u32) = (1, 200);
/// Inclusive download timeout range, in seconds.
const DOWNLOAD_TIMEOUT_RANGE: (u64, u64) = (30, 120);
/// Inclusive catalog request timeout range, in seconds.
const CATALOG_TIMEOUT_RANGE: (u64, u64) = (1, 10);
/// Inclusive catalog retry range.
const CATALOG_RETRY_RANGE: (u32, u32) = (1, 5);

/// Validate configuration
/// Currently validates:
/// - Catalog page size, timeout and retry ranges
/// - Download timeout range
/// - Non-zero pool sizes and retry counts
/// - Every backoff policy describes a non-decreasing schedule
/// - Initial timeouts do not exceed their escalation cap
/// - Every naming pattern compiles
///
/// An empty favorites id is checked when acquisition starts, since
/// `musicdl compress` never needs one.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let catalog = &config.catalog;
    check_range("catalog.page_size", catalog.page_size, PAGE_SIZE_RANGE)?;
    check_range("catalog.timeout_secs", catalog.timeout_secs, CATALOG_TIMEOUT_RANGE)?;
    check_range("catalog.max_retries", catalog.max_retries, CATALOG_RETRY_RANGE)?;
    check_policy("catalog.backoff", &catalog.backoff)?;

    let downloader = &config.downloader;
    check_range(
        "downloader.timeout_secs",
        downloader.timeout_secs,
        DOWNLOAD_TIMEOUT_RANGE,
    )?;
    check_nonzero("downloader.max_retries", downloader.max_retries)?;
    check_policy("downloader.backoff", &downloader.backoff)?;
    check_cap(
        "downloader.timeout_secs",
        downloader.timeout_secs as f64,
        &downloader.backoff,
    )?;

    let converter = &config.converter;
    check_nonzero("converter.max_retries", converter.max_retries)?;
    check_nonzero("converter.channels", u32::from(converter.channels))?;
    check_nonzero("converter.timeout_secs", converter.timeout_secs)?;
    check_policy("converter.backoff", &converter.backoff)?;

    check_nonzero("acquisition.max_workers", config.acquisition.max_workers)?;

    let compression = &config.compression;
    check_nonzero("compression.workers", compression.workers)?;
    check_nonzero("compression.max_retries", compression.max_retries)?;
    check_nonzero("compression.poll_interval_ms", compression.poll_interval_ms)?;
    check_policy("compression.backoff", &compression.backoff)?;
    let timeouts = &compression.timeouts;
    for (name, secs) in [
        ("compression.timeouts.load_secs", timeouts.load_secs),
        ("compression.timeouts.compress_secs", timeouts.compress_secs),
        ("compression.timeouts.completion_secs", timeouts.completion_secs),
    ] {
        check_nonzero(name, secs)?;
        check_cap(name, secs as f64, &compression.backoff)?;
    }

    crate::naming::compile_patterns(&config.naming.patterns)
        .map_err(|e| ConfigError::ValidationError(format!("naming.patterns: {e}")))?;

    if config.paths.app_dir.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "paths.app_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn check_range<T>(name: &str, value: T, (min, max): (T, T)) -> Result<(), ConfigError>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if value < min || value > max {
        return Err(ConfigError::ValidationError(format!(
            "{name} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}

fn check_nonzero<T>(name: &str, value: T) -> Result<(), ConfigError>
where
    T: PartialEq + Default + Copy,
{
    if value == T::default() {
        return Err(ConfigError::ValidationError(format!("{name} cannot be 0")));
    }
    Ok(())
}

fn check_policy(name: &str, policy: &BackoffPolicy) -> Result<(), ConfigError> {
    policy
        .validate()
        .map_err(|e| ConfigError::ValidationError(format!("{name}: {e}")))
}

fn check_cap(name: &str, initial_secs: f64, policy: &BackoffPolicy) -> Result<(), ConfigError> {
    if initial_secs > policy.max_timeout_secs {
        return Err(ConfigError::ValidationError(format!(
            "{name} ({initial_secs}) exceeds the backoff timeout cap ({})",
            policy.max_timeout_secs
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_page_size_out_of_range() {
        let mut config = Config::default();
        config.catalog.page_size = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));

        config.catalog.page_size = 201;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_download_timeout_range() {
        let mut config = Config::default();
        config.downloader.timeout_secs = 29;
        assert!(validate_config(&config).is_err());

        config.downloader.timeout_secs = 120;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_workers_fails() {
        let mut config = Config::default();
        config.compression.workers = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("compression.workers"));
    }

    #[test]
    fn test_validate_timeout_above_cap_fails() {
        let mut config = Config::default();
        config.compression.timeouts.completion_secs = 301;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("completion_secs"));
    }

    #[test]
    fn test_validate_shrinking_backoff_fails() {
        let mut config = Config::default();
        config.downloader.backoff.growth_factor = 0.5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_bad_naming_pattern_fails() {
        let mut config = Config::default();
        config.naming.patterns.push("[unclosed".to_string());
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("naming.patterns"));
    }
}
