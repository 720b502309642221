//! Route descriptors and their per-route options.
//!
//! # Design Decisions
//! - Descriptors are engine-agnostic; `configure.rs` resolves them into
//!   [`ResolvedRoute`](super::configure::ResolvedRoute) before the table is built
//! - Handlers receive the request facade plus the (possibly pre-read) body

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::routing::MethodFilter;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::http::request::HttpRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl RouteMethod {
    /// Methods that never carry a payload to validate and skip XSRF by default.
    pub fn is_safe(self) -> bool {
        matches!(self, RouteMethod::Get | RouteMethod::Head | RouteMethod::Options)
    }

    pub fn as_method(self) -> Method {
        match self {
            RouteMethod::Get => Method::GET,
            RouteMethod::Head => Method::HEAD,
            RouteMethod::Post => Method::POST,
            RouteMethod::Put => Method::PUT,
            RouteMethod::Patch => Method::PATCH,
            RouteMethod::Delete => Method::DELETE,
            RouteMethod::Options => Method::OPTIONS,
        }
    }

    pub(crate) fn method_filter(self) -> MethodFilter {
        match self {
            RouteMethod::Get => MethodFilter::GET,
            RouteMethod::Head => MethodFilter::HEAD,
            RouteMethod::Post => MethodFilter::POST,
            RouteMethod::Put => MethodFilter::PUT,
            RouteMethod::Patch => MethodFilter::PATCH,
            RouteMethod::Delete => MethodFilter::DELETE,
            RouteMethod::Options => MethodFilter::OPTIONS,
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_method(), f)
    }
}

/// Authentication requirement declared by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthRequirement {
    #[default]
    Required,
    Optional,
    None,
}

/// How the auth strategy is applied to a matched route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Unauthenticated requests are rejected.
    Required,
    /// Authentication is attempted; failure continues unauthenticated.
    Try,
    /// The auth strategy is not consulted.
    Bypass,
}

impl AuthMode {
    pub fn resolve(requirement: AuthRequirement, strategy_registered: bool) -> Self {
        if !strategy_registered {
            return AuthMode::Bypass;
        }
        match requirement {
            AuthRequirement::Required => AuthMode::Required,
            AuthRequirement::Optional => AuthMode::Try,
            AuthRequirement::None => AuthMode::Bypass,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteAccess {
    Public,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyOutput {
    /// Body is read fully before the handler runs.
    Data,
    /// Body is handed to the handler as a size-limited stream.
    Stream,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyOptions {
    /// Accepted content types (`type/subtype` or `type/*`).
    pub accepts: Option<Vec<String>>,
    pub max_bytes: Option<usize>,
    pub output: Option<BodyOutput>,
    /// Reject JSON bodies that do not parse.
    pub parse: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteTimeout {
    /// Time allowed to receive the payload.
    pub payload: Option<Duration>,
    /// Time the handler may take before the request fails with 408.
    pub idle_socket: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteOptions {
    pub auth_required: AuthRequirement,
    pub xsrf_required: Option<bool>,
    pub access: Option<RouteAccess>,
    pub tags: Vec<String>,
    pub body: BodyOptions,
    pub timeout: RouteTimeout,
}

/// Route handler.
pub trait RouteHandler: Send + Sync + 'static {
    fn call(&self, request: HttpRequest, body: Body) -> BoxFuture<'static, Response>;
}

impl<F, Fut, R> RouteHandler for F
where
    F: Fn(HttpRequest, Body) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, request: HttpRequest, body: Body) -> BoxFuture<'static, Response> {
        let future = self(request, body);
        Box::pin(async move { future.await.into_response() })
    }
}

#[derive(Clone)]
pub struct RouteDescriptor {
    pub path: String,
    pub method: RouteMethod,
    pub handler: Arc<dyn RouteHandler>,
    pub options: RouteOptions,
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Route metadata visible to hooks once a route has matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteContext {
    pub path: String,
    pub method: RouteMethod,
    pub access: RouteAccess,
    pub xsrf_required: bool,
    pub tags: Vec<String>,
    pub auth_mode: AuthMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_methods() {
        assert!(RouteMethod::Get.is_safe());
        assert!(RouteMethod::Head.is_safe());
        assert!(RouteMethod::Options.is_safe());
        assert!(!RouteMethod::Post.is_safe());
        assert!(!RouteMethod::Delete.is_safe());
    }

    #[test]
    fn auth_mode_resolution() {
        assert_eq!(AuthMode::resolve(AuthRequirement::Required, true), AuthMode::Required);
        assert_eq!(AuthMode::resolve(AuthRequirement::Optional, true), AuthMode::Try);
        assert_eq!(AuthMode::resolve(AuthRequirement::None, true), AuthMode::Bypass);
        assert_eq!(AuthMode::resolve(AuthRequirement::Required, false), AuthMode::Bypass);
    }
}
