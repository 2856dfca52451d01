use crate::config::types::{
    Config, CrawlerConfig, ImageConfig, OutputConfig, RendererConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_renderer_config(&config.renderer)?;
    validate_image_config(&config.images)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.threads < 1 || config.threads > 64 {
        return Err(ConfigError::Validation(format!(
            "threads must be between 1 and 64, got {}",
            config.threads
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    // Sub-second so a stop request is observed promptly
    if config.claim_timeout_ms < 10 || config.claim_timeout_ms > 999 {
        return Err(ConfigError::Validation(format!(
            "claim_timeout_ms must be between 10 and 999, got {}",
            config.claim_timeout_ms
        )));
    }

    for ext in &config.excluded_extensions {
        if ext.trim_start_matches('.').is_empty() || ext.contains('/') {
            return Err(ConfigError::Validation(format!(
                "invalid excluded extension '{}'",
                ext
            )));
        }
    }

    if let Some(prefix) = &config.scope_prefix {
        let url = Url::parse(prefix)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid scope_prefix: {}", e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "scope_prefix '{}' must use http or https",
                prefix
            )));
        }
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters, hyphens and underscores, got '{}'",
            config.crawler_name
        )));
    }

    Ok(())
}

/// Validates renderer configuration
fn validate_renderer_config(config: &RendererConfig) -> Result<(), ConfigError> {
    if config.poll_interval_ms < 10 {
        return Err(ConfigError::Validation(format!(
            "poll_interval_ms must be >= 10, got {}",
            config.poll_interval_ms
        )));
    }

    if config.page_load_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "page_load_timeout_secs must be >= 1".to_string(),
        ));
    }

    if let Some(remote) = &config.remote_debugging_url {
        if !remote.is_empty() {
            Url::parse(remote).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid remote_debugging_url: {}", e))
            })?;
        }
    }

    Ok(())
}

/// Validates image configuration
fn validate_image_config(config: &ImageConfig) -> Result<(), ConfigError> {
    if config.max_size_kb < 1 {
        return Err(ConfigError::Validation(
            "max_size_kb must be >= 1".to_string(),
        ));
    }

    if config.start_quality < 1 || config.start_quality > 100 {
        return Err(ConfigError::Validation(format!(
            "start_quality must be between 1 and 100, got {}",
            config.start_quality
        )));
    }

    if config.min_quality < 1 || config.min_quality > config.start_quality {
        return Err(ConfigError::Validation(format!(
            "min_quality must be between 1 and start_quality ({}), got {}",
            config.start_quality, config.min_quality
        )));
    }

    if config.quality_step < 1 {
        return Err(ConfigError::Validation(
            "quality_step must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.root.is_empty() {
        return Err(ConfigError::Validation("root cannot be empty".to_string()));
    }

    if config.html_compress_threshold_kb < 1 {
        return Err(ConfigError::Validation(
            "html_compress_threshold_kb must be >= 1".to_string(),
        ));
    }

    Ok(())
}
