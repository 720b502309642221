//! Lifecycle hooks.
//!
//! # Data Flow
//! ```text
//! Request
//!     → on_pre_routing.rs  (before route lookup; may rewrite the URL or respond)
//!     → on_pre_auth.rs     (after routing, before authentication)
//!     → auth.rs            (single registered strategy, per-route mode)
//!     → on_post_auth.rs    (after authentication)
//!     → route handler
//!     → on_pre_response.rs (may add headers or re-render the body)
//! ```
//!
//! # Design Decisions
//! - Each hook kind has its own outcome type; no shared "toolkit" object
//! - A hook that returns `Err` or panics fails only its own request with a 500
//! - Hooks run in registration order; the first one to respond wins

pub mod auth;
pub mod on_post_auth;
pub mod on_pre_auth;
pub mod on_pre_response;
pub mod on_pre_routing;

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::response::Response;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;

use crate::http::request::RequestId;
use crate::http::response::internal_error;

pub use auth::{AuthOutcome, AuthResult, AuthenticationHandler};
pub use on_post_auth::{OnPostAuthHandler, PostAuthOutcome};
pub use on_pre_auth::{OnPreAuthHandler, PreAuthOutcome};
pub use on_pre_response::{OnPreResponseHandler, PreResponseInfo, PreResponseOutcome};
pub use on_pre_routing::{OnPreRoutingHandler, PreRoutingOutcome};

/// Failure reported by a hook.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HookError {
    pub fn msg(message: impl Into<String>) -> Self {
        HookError::Message(message.into())
    }

    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        HookError::Other(Box::new(error))
    }
}

pub type HookFuture<T> = BoxFuture<'static, Result<T, HookError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    PreRouting,
    PreAuth,
    Auth,
    PostAuth,
    PreResponse,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookKind::PreRouting => "onPreRouting",
            HookKind::PreAuth => "onPreAuth",
            HookKind::Auth => "auth",
            HookKind::PostAuth => "onPostAuth",
            HookKind::PreResponse => "onPreResponse",
        })
    }
}

/// Invoke a hook, turning errors and panics into a 500 response.
pub(crate) async fn guarded<T>(
    kind: HookKind,
    request_id: &RequestId,
    invoke: impl FnOnce() -> HookFuture<T>,
) -> Result<T, Response> {
    let future = match std::panic::catch_unwind(AssertUnwindSafe(invoke)) {
        Ok(future) => future,
        Err(_) => {
            tracing::error!(request_id = %request_id, hook = %kind, "Lifecycle hook panicked");
            return Err(internal_error());
        }
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(error)) => {
            tracing::error!(
                request_id = %request_id,
                hook = %kind,
                error = %error,
                "Lifecycle hook failed"
            );
            Err(internal_error())
        }
        Err(_) => {
            tracing::error!(request_id = %request_id, hook = %kind, "Lifecycle hook panicked");
            Err(internal_error())
        }
    }
}

/// Registered hooks, cloned on write and swapped into the pipeline.
#[derive(Clone, Default)]
pub(crate) struct HookRegistry {
    pub pre_routing: Vec<Arc<dyn OnPreRoutingHandler>>,
    pub pre_auth: Vec<Arc<dyn OnPreAuthHandler>>,
    pub auth: Option<Arc<dyn AuthenticationHandler>>,
    pub post_auth: Vec<Arc<dyn OnPostAuthHandler>>,
    pub pre_response: Vec<Arc<dyn OnPreResponseHandler>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn request_id() -> RequestId {
        let request = axum::http::Request::new(());
        crate::http::request::RequestState::assign(&request, &Default::default()).request_id
    }

    #[tokio::test]
    async fn error_becomes_internal_error() {
        let result = guarded::<()>(HookKind::PreAuth, &request_id(), || {
            Box::pin(async { Err(HookError::msg("boom")) })
        })
        .await;
        assert_eq!(result.unwrap_err().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    async fn exploding() -> Result<(), HookError> {
        panic!("hook exploded")
    }

    #[tokio::test]
    async fn panic_becomes_internal_error() {
        let result = guarded(HookKind::PostAuth, &request_id(), || Box::pin(exploding())).await;
        assert_eq!(result.unwrap_err().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let result = guarded::<()>(HookKind::PostAuth, &request_id(), || panic!("eager"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn success_passes_outcome_through() {
        let result = guarded(HookKind::PreRouting, &request_id(), || Box::pin(async { Ok(7) }))
            .await;
        assert_eq!(result.ok(), Some(7));
    }
}
