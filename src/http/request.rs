//! Request identity and the request facade handed to hooks and handlers.
//!
//! # Responsibilities
//! - Derive the loggable request id (trusted `x-opaque-id` or UUID v4)
//! - Assign a per-request uuid used as the key of every side-table
//! - Expose a cheap, owned view of the request to lifecycle hooks

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ConnectInfo;
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap, Method, Request, Uri};
use uuid::Uuid;

use crate::config::RequestIdConfig;
use crate::routing::RouteContext;

/// Header carrying a caller-supplied request id.
pub const X_OPAQUE_ID: &str = "x-opaque-id";

/// Loggable request id. May be supplied by trusted clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-assigned request identity; never taken from the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestUuid(Uuid);

impl RequestUuid {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// State assigned to every request before any hook runs.
#[derive(Debug, Clone)]
pub struct RequestState {
    pub request_id: RequestId,
    pub request_uuid: RequestUuid,
    pub remote_addr: Option<SocketAddr>,
    pub received_at: Instant,
}

impl RequestState {
    pub fn assign<B>(request: &Request<B>, config: &RequestIdConfig) -> Self {
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Self {
            request_id: derive_request_id(request.headers(), remote_addr, config),
            request_uuid: RequestUuid::new(),
            remote_addr,
            received_at: Instant::now(),
        }
    }
}

/// Use `x-opaque-id` when the client is trusted, otherwise a fresh UUID.
pub fn derive_request_id(
    headers: &HeaderMap,
    remote_addr: Option<SocketAddr>,
    config: &RequestIdConfig,
) -> RequestId {
    let trusted = config.allow_from_any_ip
        || remote_addr
            .map(|addr| config.ip_allowlist.contains(&addr.ip()))
            .unwrap_or(false);

    let supplied = trusted
        .then(|| headers.get(X_OPAQUE_ID))
        .flatten()
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty());

    match supplied {
        Some(id) => RequestId(id.to_string()),
        None => RequestId(Uuid::new_v4().to_string()),
    }
}

/// Owned view of a request as seen by lifecycle hooks and route handlers.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    state: RequestState,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    route: Option<Arc<RouteContext>>,
}

impl HttpRequest {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self::from_components(
            request.method(),
            request.uri(),
            request.headers(),
            request.extensions(),
        )
    }

    pub fn from_parts(parts: &Parts) -> Self {
        Self::from_components(&parts.method, &parts.uri, &parts.headers, &parts.extensions)
    }

    pub(crate) fn from_components(
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        extensions: &Extensions,
    ) -> Self {
        let state = extensions.get::<RequestState>().cloned().unwrap_or_else(|| RequestState {
            request_id: RequestId(Uuid::new_v4().to_string()),
            request_uuid: RequestUuid::new(),
            remote_addr: None,
            received_at: Instant::now(),
        });
        Self {
            state,
            method: method.clone(),
            uri: uri.clone(),
            headers: headers.clone(),
            route: extensions.get::<Arc<RouteContext>>().cloned(),
        }
    }

    pub(crate) fn with_route(mut self, route: Option<Arc<RouteContext>>) -> Self {
        if route.is_some() {
            self.route = route;
        }
        self
    }

    pub fn id(&self) -> &RequestId {
        &self.state.request_id
    }

    pub fn uuid(&self) -> RequestUuid {
        self.state.request_uuid
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.state.remote_addr
    }

    /// Matched route, available from pre-auth onwards.
    pub fn route(&self) -> Option<&RouteContext> {
        self.route.as_deref()
    }

    /// Value of the `Referer` header, if any.
    pub fn referrer(&self) -> Option<&str> {
        self.headers
            .get(axum::http::header::REFERER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
    }
}
