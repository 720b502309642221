//! Errors returned by the server shell's public operations.
//!
//! Misuse of the lifecycle (wrong order, double registration) is reported
//! synchronously through these variants and never panics. Per-request
//! failures never surface here; they become 500 responses.

use thiserror::Error;

use crate::auth::SessionError;
use crate::net::ListenerError;

#[derive(Debug, Error)]
pub enum HttpServerError {
    #[error("Http server is not set up yet")]
    NotSetup,

    #[error("Http server is already set up")]
    AlreadySetup,

    #[error("Http server is already listening")]
    AlreadyListening,

    #[error("Cannot register {0} while the http server is listening")]
    RegisterWhileListening(&'static str),

    #[error("Auth interceptor was already registered")]
    AuthAlreadyRegistered,

    #[error("A cookieSessionStorageFactory was already created")]
    SessionStorageAlreadyCreated,

    #[error("Invalid route {method} {path}: {reason}")]
    InvalidRoute {
        method: String,
        path: String,
        reason: String,
    },

    #[error("Invalid static directory {path}: {reason}")]
    InvalidStaticDir { path: String, reason: String },

    #[error(transparent)]
    InvalidSessionOptions(#[from] SessionError),

    #[error(transparent)]
    Bind(#[from] ListenerError),

    #[error("Failed to load TLS configuration: {0}")]
    Tls(#[source] std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = HttpServerError> = std::result::Result<T, E>;
