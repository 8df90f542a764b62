//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, quality within codec range)
//! - Check addresses parse before anything binds
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::RelayConfig;

/// Upper bound accepted for `origin.max_redirects`.
const MAX_REDIRECT_LIMIT: usize = 20;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("origin.timeout_secs must be greater than zero")]
    ZeroTimeout,

    #[error("origin.max_redirects {0} exceeds limit of {MAX_REDIRECT_LIMIT}")]
    TooManyRedirects(usize),

    #[error("origin.max_source_bytes must be greater than zero")]
    ZeroSourceLimit,

    #[error("transcode.max_pixels must be greater than zero")]
    ZeroPixelLimit,

    #[error("transcode.default_quality {0} is outside 1..=100")]
    QualityOutOfRange(u8),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.origin.timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if config.origin.max_redirects > MAX_REDIRECT_LIMIT {
        errors.push(ValidationError::TooManyRedirects(config.origin.max_redirects));
    }
    if config.origin.max_source_bytes == 0 {
        errors.push(ValidationError::ZeroSourceLimit);
    }
    if config.transcode.max_pixels == 0 {
        errors.push(ValidationError::ZeroPixelLimit);
    }
    if !(1..=100).contains(&config.transcode.default_quality) {
        errors.push(ValidationError::QualityOutOfRange(config.transcode.default_quality));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
