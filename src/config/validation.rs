//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: IngressConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::IngressConfig;
use crate::http::request::MIN_HEAD_BYTES;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.listen must not be empty")]
    EmptyListenAddress,
    #[error("{field} must be greater than zero")]
    ZeroLimit { field: &'static str },
    #[error("http.max_head_bytes must be at least {minimum}")]
    HeadLimitTooSmall { minimum: usize },
    #[error("http.server_name must not be empty")]
    EmptyServerName,
    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &IngressConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.listen.trim().is_empty() {
        errors.push(ValidationError::EmptyListenAddress);
    }

    let limits = [
        ("listener.max_connections", config.listener.max_connections),
        ("http.max_headers", config.http.max_headers),
    ];
    for (field, value) in limits {
        if value == 0 {
            errors.push(ValidationError::ZeroLimit { field });
        }
    }

    if config.http.max_head_bytes < MIN_HEAD_BYTES {
        errors.push(ValidationError::HeadLimitTooSmall {
            minimum: MIN_HEAD_BYTES,
        });
    }

    if config.http.server_name.trim().is_empty() {
        errors.push(ValidationError::EmptyServerName);
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
