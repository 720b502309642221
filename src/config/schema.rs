//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server shell.
//! All types derive Serde traits for deserialization from config files.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the `http-shell` binary.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP server settings consumed by the shell.
    pub http: HttpConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Static directories served without authentication.
    pub static_dirs: Vec<StaticDirConfig>,

    /// Bearer-token authentication strategy.
    pub auth: AuthConfig,
}

/// Configuration surface of the HTTP server shell.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Server name reported by `server_info`.
    pub name: String,

    /// Host to bind.
    pub host: String,

    /// Port to bind (0 picks an ephemeral port).
    pub port: u16,

    /// URL prefix the application is served under (e.g. "/base").
    pub base_path: Option<String>,

    /// Strip `base_path` from incoming requests before routing.
    pub rewrite_base_path: bool,

    /// Public URL of the server, used to build absolute links.
    pub public_base_url: Option<String>,

    /// Default maximum request payload in bytes.
    pub max_payload_bytes: usize,

    /// Default idle socket timeout for routes, in milliseconds.
    pub socket_timeout_ms: u64,

    /// HTTP/1 keep-alive timeout in milliseconds (0 disables keep-alive).
    pub keep_alive_timeout_ms: u64,

    /// Time allowed for in-flight requests to drain on stop, in milliseconds.
    pub shutdown_timeout_ms: u64,

    pub compression: CompressionConfig,
    pub request_id: RequestIdConfig,
    pub elu_monitor: EluMonitorConfig,
    pub csp: CspConfig,
    pub xsrf: XsrfConfig,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            name: "http-shell".to_string(),
            host: "localhost".to_string(),
            port: 5601,
            base_path: None,
            rewrite_base_path: false,
            public_base_url: None,
            max_payload_bytes: 1024 * 1024,
            socket_timeout_ms: 120_000,
            keep_alive_timeout_ms: 120_000,
            shutdown_timeout_ms: 30_000,
            compression: CompressionConfig::default(),
            request_id: RequestIdConfig::default(),
            elu_monitor: EluMonitorConfig::default(),
            csp: CspConfig::default(),
            xsrf: XsrfConfig::default(),
            tls: None,
        }
    }
}

impl HttpConfig {
    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Base path applied to incoming requests, if rewriting is enabled.
    pub fn rewritten_base_path(&self) -> Option<&str> {
        match (&self.base_path, self.rewrite_base_path) {
            (Some(base_path), true) => Some(base_path.as_str()),
            _ => None,
        }
    }
}

/// Response compression configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Enable response compression.
    pub enabled: bool,

    /// When set, compression is only allowed for requests whose referrer
    /// hostname is in this list.
    pub referrer_whitelist: Option<Vec<String>>,

    pub brotli: BrotliConfig,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            referrer_whitelist: None,
            brotli: BrotliConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrotliConfig {
    pub enabled: bool,
    /// Compression quality (0-11).
    pub quality: u32,
}

impl Default for BrotliConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            quality: 3,
        }
    }
}

/// Controls how the loggable request id is derived.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RequestIdConfig {
    /// Trust `x-opaque-id` from any client.
    pub allow_from_any_ip: bool,

    /// Clients whose `x-opaque-id` header is trusted.
    pub ip_allowlist: Vec<IpAddr>,
}

/// Per-request event-loop utilization monitoring.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EluMonitorConfig {
    pub enabled: bool,
    pub logging: EluLoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EluLoggingConfig {
    pub enabled: bool,
    pub threshold: EluThreshold,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EluThreshold {
    /// Minimum utilization ratio (0.0 - 1.0) before warning.
    pub elu: f64,

    /// Minimum active time in milliseconds before warning.
    pub ela_ms: u64,
}

impl Default for EluThreshold {
    fn default() -> Self {
        Self {
            elu: 0.15,
            ela_ms: 250,
        }
    }
}

/// Content-Security-Policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CspConfig {
    pub directives: Vec<String>,
}

impl Default for CspConfig {
    fn default() -> Self {
        Self {
            directives: vec![
                "script-src 'self'".to_string(),
                "worker-src blob: 'self'".to_string(),
                "style-src 'unsafe-inline' 'self'".to_string(),
            ],
        }
    }
}

/// Cross-site request forgery protection.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct XsrfConfig {
    pub disable_protection: bool,

    /// Route paths exempt from the XSRF header check.
    pub allowlist: Vec<String>,
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: PathBuf,

    /// Path to private key file (PEM).
    pub key_path: PathBuf,
}

/// A directory served under a URL path.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticDirConfig {
    pub path: String,
    pub dir: PathBuf,
}

/// Authentication strategy used by the binary.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// When set, requests must carry `Authorization: Bearer <api_key>`.
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config: ServerConfig = toml::from_str("[http]\nport = 8080\n").unwrap();
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.http.host, "localhost");
        assert!(config.http.compression.enabled);
        assert_eq!(config.http.shutdown_timeout(), Duration::from_secs(30));
        assert!(config.static_dirs.is_empty());
    }

    #[test]
    fn nested_sections_parse() {
        let config: ServerConfig = toml::from_str(
            r#"
            [http]
            base_path = "/base"
            rewrite_base_path = true

            [http.compression]
            referrer_whitelist = ["a.example"]

            [http.request_id]
            ip_allowlist = ["127.0.0.1"]

            [observability]
            log_format = "json"

            [[static_dirs]]
            path = "/assets"
            dir = "./public"
            "#,
        )
        .unwrap();

        assert_eq!(config.http.rewritten_base_path(), Some("/base"));
        assert_eq!(
            config.http.compression.referrer_whitelist,
            Some(vec!["a.example".to_string()])
        );
        assert_eq!(config.http.request_id.ip_allowlist.len(), 1);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.static_dirs[0].path, "/assets");
    }

    #[test]
    fn base_path_without_rewrite_is_not_rewritten() {
        let config = HttpConfig {
            base_path: Some("/base".into()),
            ..HttpConfig::default()
        };
        assert_eq!(config.rewritten_base_path(), None);
    }
}
