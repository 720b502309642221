//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts, compression quality, thresholds)
//! - Check base path / public URL consistency
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::IpAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{HttpConfig, ServerConfig};

const MAX_SHUTDOWN_TIMEOUT_MS: u64 = 120_000;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a full configuration, collecting every error.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = validate_http_config(&config.http);

    for dir in &config.static_dirs {
        if !dir.path.starts_with('/') || dir.path == "/" {
            errors.push(ValidationError::new(
                "static_dirs.path",
                format!("'{}' must be a non-root absolute path", dir.path),
            ));
        }
    }

    if config.auth.api_key.as_deref() == Some("") {
        errors.push(ValidationError::new("auth.api_key", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the HTTP section on its own.
pub fn validate_http_config(config: &HttpConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(base_path) = &config.base_path {
        if !base_path.starts_with('/') {
            errors.push(ValidationError::new("http.base_path", "must start with a slash"));
        }
        if base_path.ends_with('/') {
            errors.push(ValidationError::new("http.base_path", "must not end with a slash"));
        }
    } else if config.rewrite_base_path {
        errors.push(ValidationError::new(
            "http.rewrite_base_path",
            "cannot be enabled without http.base_path",
        ));
    }

    if let Some(public_base_url) = &config.public_base_url {
        match Url::parse(public_base_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
                let expected = config.base_path.as_deref().unwrap_or("");
                let path = url.path().trim_end_matches('/');
                if path != expected {
                    errors.push(ValidationError::new(
                        "http.public_base_url",
                        format!("path '{path}' must match base path '{expected}'"),
                    ));
                }
            }
            Ok(url) => errors.push(ValidationError::new(
                "http.public_base_url",
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new("http.public_base_url", e.to_string())),
        }
    }

    if config.port == 0 && !is_loopback(&config.host) {
        errors.push(ValidationError::new(
            "http.port",
            "ephemeral port is only allowed on a loopback host",
        ));
    }

    if config.compression.brotli.quality > 11 {
        errors.push(ValidationError::new("http.compression.brotli.quality", "must be within 0..=11"));
    }

    let elu = config.elu_monitor.logging.threshold.elu;
    if !(0.0..=1.0).contains(&elu) {
        errors.push(ValidationError::new(
            "http.elu_monitor.logging.threshold.elu",
            "must be within 0.0..=1.0",
        ));
    }

    if config.shutdown_timeout_ms > MAX_SHUTDOWN_TIMEOUT_MS {
        errors.push(ValidationError::new(
            "http.shutdown_timeout_ms",
            format!("must not exceed {MAX_SHUTDOWN_TIMEOUT_MS}"),
        ));
    }

    if config.socket_timeout_ms == 0 {
        errors.push(ValidationError::new("http.socket_timeout_ms", "must be greater than zero"));
    }

    errors
}

fn is_loopback(host: &str) -> bool {
    host == "localhost"
        || host
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_base_path_error() {
        let config = HttpConfig {
            base_path: Some("base/".into()),
            ..HttpConfig::default()
        };
        let errors = validate_http_config(&config);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.field == "http.base_path"));
    }

    #[test]
    fn rewrite_requires_base_path() {
        let config = HttpConfig {
            rewrite_base_path: true,
            ..HttpConfig::default()
        };
        let errors = validate_http_config(&config);
        assert_eq!(errors[0].field, "http.rewrite_base_path");
    }

    #[test]
    fn public_url_must_match_base_path() {
        let mut config = HttpConfig {
            base_path: Some("/base".into()),
            public_base_url: Some("https://example.com/other".into()),
            ..HttpConfig::default()
        };
        assert_eq!(validate_http_config(&config).len(), 1);

        config.public_base_url = Some("https://example.com/base".into());
        assert!(validate_http_config(&config).is_empty());
    }

    #[test]
    fn ephemeral_port_only_on_loopback() {
        let mut config = HttpConfig {
            host: "127.0.0.1".into(),
            port: 0,
            ..HttpConfig::default()
        };
        assert!(validate_http_config(&config).is_empty());

        config.host = "0.0.0.0".into();
        assert_eq!(validate_http_config(&config)[0].field, "http.port");
    }

    #[test]
    fn ranges_are_checked() {
        let mut config = HttpConfig::default();
        config.compression.brotli.quality = 12;
        config.elu_monitor.logging.threshold.elu = 1.5;
        config.shutdown_timeout_ms = 500_000;
        assert_eq!(validate_http_config(&config).len(), 3);
    }
}
