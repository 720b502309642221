//! TCP listener binding.
//!
//! # Responsibilities
//! - Derive listener options from the HTTP config
//! - Resolve and bind the configured host/port
//! - Hand a non-blocking std listener to the serving engine

use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;

use crate::config::HttpConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Host/port did not resolve to an address.
    #[error("Failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        source: std::io::Error,
    },
    /// Failed to bind to address.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        source: std::io::Error,
    },
}

/// Listener settings derived from [`HttpConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerOptions {
    pub host: String,
    pub port: u16,
    /// How long a connection may wait for the next request's headers;
    /// `None` disables keep-alive.
    pub keep_alive: Option<Duration>,
    pub tls: bool,
}

impl ListenerOptions {
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            keep_alive: (config.keep_alive_timeout_ms > 0)
                .then(|| Duration::from_millis(config.keep_alive_timeout_ms)),
            tls: config.tls.is_some(),
        }
    }

    pub fn protocol(&self) -> &'static str {
        if self.tls {
            "https"
        } else {
            "http"
        }
    }
}

/// Bind a non-blocking listener for the given options.
pub fn bind(options: &ListenerOptions) -> Result<TcpListener, ListenerError> {
    let address = (options.host.as_str(), options.port)
        .to_socket_addrs()
        .and_then(|mut addrs| {
            addrs.next().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
            })
        })
        .map_err(|source| ListenerError::Resolve {
            host: options.host.clone(),
            port: options.port,
            source,
        })?;

    let listener = TcpListener::bind(address).map_err(|source| ListenerError::Bind { address, source })?;
    listener
        .set_nonblocking(true)
        .map_err(|source| ListenerError::Bind { address, source })?;

    tracing::debug!(
        address = %listener.local_addr().unwrap_or(address),
        keep_alive_ms = options.keep_alive.map(|idle| idle.as_millis() as u64),
        "Listener bound"
    );

    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_config() {
        let mut config = HttpConfig {
            keep_alive_timeout_ms: 0,
            ..HttpConfig::default()
        };
        let options = ListenerOptions::from_config(&config);
        assert_eq!(options.keep_alive, None);
        assert_eq!(options.protocol(), "http");

        config.keep_alive_timeout_ms = 1500;
        assert_eq!(
            ListenerOptions::from_config(&config).keep_alive,
            Some(Duration::from_millis(1500))
        );

        config.tls = Some(crate::config::TlsConfig {
            cert_path: "cert.pem".into(),
            key_path: "key.pem".into(),
        });
        assert_eq!(ListenerOptions::from_config(&config).protocol(), "https");
    }

    #[test]
    fn binds_ephemeral_port() {
        let options = ListenerOptions {
            host: "127.0.0.1".into(),
            port: 0,
            keep_alive: None,
            tls: false,
        };
        let listener = bind(&options).unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[test]
    fn double_bind_fails() {
        let first = bind(&ListenerOptions {
            host: "127.0.0.1".into(),
            port: 0,
            keep_alive: None,
            tls: false,
        })
        .unwrap();
        let port = first.local_addr().unwrap().port();

        let err = bind(&ListenerOptions {
            host: "127.0.0.1".into(),
            port,
            keep_alive: None,
            tls: false,
        })
        .unwrap_err();
        assert!(matches!(err, ListenerError::Bind { .. }));
    }
}
