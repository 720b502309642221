//! The authentication strategy and its per-route application.
//!
//! # Responsibilities
//! - Invoke the single registered strategy according to the route's [`AuthMode`]
//! - Record auth state and auth headers in the request side-tables
//! - Merge auth request headers into the live request
//!
//! # Design Decisions
//! - `Try` treats "not handled" and a 401 rejection as "continue unauthenticated"
//! - Redirects are honoured in every mode

use std::future::Future;

use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use super::{guarded, HookError, HookFuture, HookKind};
use crate::auth::{AuthHeadersStorage, AuthStateStorage};
use crate::http::request::{HttpRequest, RequestUuid};
use crate::http::response::HookResponse;
use crate::routing::AuthMode;

/// Data returned by a successful authentication.
#[derive(Debug, Clone, Default)]
pub struct AuthResult {
    pub state: serde_json::Value,
    /// Headers added to the incoming request.
    pub request_headers: HeaderMap,
    /// Headers added to the outgoing response.
    pub response_headers: HeaderMap,
}

impl AuthResult {
    pub fn new(state: serde_json::Value) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    pub fn with_request_headers(mut self, headers: HeaderMap) -> Self {
        self.request_headers = headers;
        self
    }

    pub fn with_response_headers(mut self, headers: HeaderMap) -> Self {
        self.response_headers = headers;
        self
    }
}

#[derive(Debug)]
pub enum AuthOutcome {
    Authenticated(AuthResult),
    /// The strategy does not apply to this request.
    NotHandled,
    Redirected { location: String, headers: HeaderMap },
    Respond(HookResponse),
}

pub trait AuthenticationHandler: Send + Sync + 'static {
    fn authenticate(&self, request: HttpRequest) -> HookFuture<AuthOutcome>;
}

impl<F, Fut> AuthenticationHandler for F
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<AuthOutcome, HookError>> + Send + 'static,
{
    fn authenticate(&self, request: HttpRequest) -> HookFuture<AuthOutcome> {
        Box::pin(self(request))
    }
}

/// Side-tables written by a successful authentication.
#[derive(Debug, Clone, Default)]
pub(crate) struct AuthStores {
    pub state: AuthStateStorage,
    pub request_headers: AuthHeadersStorage,
    pub response_headers: AuthHeadersStorage,
}

impl AuthStores {
    pub(crate) fn remove(&self, id: RequestUuid) {
        self.state.remove(id);
        self.request_headers.remove(id);
        self.response_headers.remove(id);
    }
}

/// Apply `handler` to the request according to `mode`.
pub(crate) async fn run(
    handler: &dyn AuthenticationHandler,
    mode: AuthMode,
    parts: &mut Parts,
    stores: &AuthStores,
) -> Result<(), Response> {
    if mode == AuthMode::Bypass {
        return Ok(());
    }

    let facade = HttpRequest::from_parts(parts);
    let request_id = facade.id().clone();
    let request_uuid = facade.uuid();

    match guarded(HookKind::Auth, &request_id, || handler.authenticate(facade)).await? {
        AuthOutcome::Authenticated(result) => {
            stores.state.set(request_uuid, result.state);
            if !result.response_headers.is_empty() {
                stores.response_headers.set(request_uuid, result.response_headers);
            }
            if !result.request_headers.is_empty() {
                stores.request_headers.set(request_uuid, result.request_headers.clone());
                parts.headers.extend(result.request_headers);
            }
            Ok(())
        }
        AuthOutcome::NotHandled => match mode {
            AuthMode::Try => Ok(()),
            _ => {
                tracing::debug!(request_id = %request_id, "Authentication not handled, rejecting");
                Err(HookResponse::unauthorized("Unauthorized").into_response())
            }
        },
        AuthOutcome::Redirected { location, headers } => {
            Err(HookResponse::redirected(&location).headers(headers).into_response())
        }
        AuthOutcome::Respond(response) => {
            if mode == AuthMode::Try && response.status() == StatusCode::UNAUTHORIZED {
                return Ok(());
            }
            Err(response.into_response())
        }
    }
}
