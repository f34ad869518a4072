use crate::config::types::{
    Config, CrawlConfig, DatabaseConfig, LifecycleConfig, SchemaConfig, UserAgentConfig,
};
use crate::schema::bounds::is_email;
use crate::ConfigError;
use url::Url;

const MAX_EMAIL_LEN: usize = 128;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_schema_config(&config.schema)?;
    validate_lifecycle_config(&config.lifecycle)?;
    validate_database_config(&config.database)?;
    Ok(())
}

/// Validates crawl configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 256 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 256, got {}",
            config.workers
        )));
    }

    if config.batch_size < 1 || config.batch_size > 10_000 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be between 1 and 10000, got {}",
            config.batch_size
        )));
    }

    if config.max_host_conns < 1 || config.max_host_conns > 64 {
        return Err(ConfigError::Validation(format!(
            "max_host_conns must be between 1 and 64, got {}",
            config.max_host_conns
        )));
    }

    if config.request_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "request_timeout must be >= 100ms, got {}ms",
            config.request_timeout_ms
        )));
    }

    if config.attempts < 1 || config.attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "attempts must be between 1 and 10, got {}",
            config.attempts
        )));
    }

    if config.max_bytes < 1024 {
        return Err(ConfigError::Validation(format!(
            "max_bytes must be >= 1024, got {}",
            config.max_bytes
        )));
    }

    if config.interval_secs < 1 {
        return Err(ConfigError::Validation(
            "interval must be at least 1 second".to_string(),
        ));
    }

    // A lease shorter than one fetch would hand in-flight manifests to other runs
    let fetch_budget_ms = config
        .request_timeout_ms
        .saturating_mul(u64::from(config.attempts))
        .saturating_add(
            config
                .retry_backoff_ms
                .saturating_mul(u64::from(config.attempts.saturating_sub(1))),
        );
    if config.claim_lease_secs.saturating_mul(1000) <= fetch_budget_ms {
        return Err(ConfigError::Validation(format!(
            "claim_lease must exceed the fetch budget of {}ms, got {}s",
            fetch_budget_ms, config.claim_lease_secs
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    // Validate contact URL
    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates schema configuration
fn validate_schema_config(config: &SchemaConfig) -> Result<(), ConfigError> {
    if !config.well_known_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "well_known_path must start with '/', got '{}'",
            config.well_known_path
        )));
    }

    for (name, path) in [
        ("licenses_path", &config.licenses_path),
        ("languages_path", &config.languages_path),
        ("currencies_path", &config.currencies_path),
    ] {
        if path.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

/// Validates lifecycle thresholds
fn validate_lifecycle_config(config: &LifecycleConfig) -> Result<(), ConfigError> {
    if config.expire_after_errors < 1 {
        return Err(ConfigError::Validation(
            "expire_after_errors must be >= 1".to_string(),
        ));
    }

    if config.disable_after_errors <= config.expire_after_errors {
        return Err(ConfigError::Validation(format!(
            "disable_after_errors ({}) must be greater than expire_after_errors ({})",
            config.disable_after_errors, config.expire_after_errors
        )));
    }

    Ok(())
}

/// Validates database configuration
fn validate_database_config(config: &DatabaseConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "database path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Checks the contact address with the same rule as manifest emails
fn validate_email(email: &str) -> Result<(), ConfigError> {
    is_email("contact_email", email, MAX_EMAIL_LEN)
        .map_err(|e| ConfigError::Validation(e.to_string()))
}
