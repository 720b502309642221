//! Translation of route descriptors into resolved engine routes.
//!
//! # Responsibilities
//! - Decide payload validation and XSRF requirements from the method
//! - Resolve access level, payload settings, socket timeout and auth mode
//! - Translate the path syntax for the engine

use std::sync::Arc;
use std::time::Duration;

use super::route::{
    AuthMode, BodyOutput, RouteAccess, RouteContext, RouteDescriptor, RouteHandler, RouteMethod,
};
use crate::config::HttpConfig;

/// Payload settings, present only when a route sets any of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadSettings {
    pub accepts: Option<Vec<String>>,
    pub max_bytes: Option<usize>,
    pub output: Option<BodyOutput>,
    pub parse: Option<bool>,
    pub timeout: Option<Duration>,
}

#[derive(Clone)]
pub struct ResolvedRoute {
    /// Path as registered.
    pub path: String,
    /// Path in the engine's syntax.
    pub engine_path: String,
    pub method: RouteMethod,
    pub handler: Arc<dyn RouteHandler>,
    pub validate_payload: bool,
    pub xsrf_required: bool,
    /// XSRF requirement after the server-wide switch and allow-list.
    pub enforce_xsrf: bool,
    pub access: RouteAccess,
    pub tags: Vec<String>,
    pub payload: Option<PayloadSettings>,
    pub body_limit: usize,
    pub socket_timeout: Duration,
    pub auth_mode: AuthMode,
}

impl ResolvedRoute {
    pub fn context(&self) -> RouteContext {
        RouteContext {
            path: self.path.clone(),
            method: self.method,
            access: self.access,
            xsrf_required: self.xsrf_required,
            tags: self.tags.clone(),
            auth_mode: self.auth_mode,
        }
    }
}

impl std::fmt::Debug for ResolvedRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedRoute")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("validate_payload", &self.validate_payload)
            .field("xsrf_required", &self.xsrf_required)
            .field("access", &self.access)
            .field("payload", &self.payload)
            .field("socket_timeout", &self.socket_timeout)
            .field("auth_mode", &self.auth_mode)
            .finish_non_exhaustive()
    }
}

pub fn configure_route(
    descriptor: RouteDescriptor,
    config: &HttpConfig,
    auth_registered: bool,
) -> ResolvedRoute {
    let RouteDescriptor {
        path,
        method,
        handler,
        options,
    } = descriptor;

    let safe = method.is_safe();
    let xsrf_required = options.xsrf_required.unwrap_or(!safe);
    let enforce_xsrf = xsrf_required
        && !config.xsrf.disable_protection
        && !config.xsrf.allowlist.iter().any(|allowed| allowed == &path);
    let access = options.access.unwrap_or(RouteAccess::Internal);

    let body = options.body;
    let payload_timeout = options.timeout.payload;
    let payload = (body.accepts.is_some()
        || body.max_bytes.is_some()
        || body.output.is_some()
        || body.parse.is_some()
        || payload_timeout.is_some())
    .then(|| PayloadSettings {
        accepts: body.accepts,
        max_bytes: body.max_bytes,
        output: body.output,
        parse: body.parse,
        timeout: payload_timeout,
    });
    let body_limit = payload
        .as_ref()
        .and_then(|payload| payload.max_bytes)
        .unwrap_or(config.max_payload_bytes);

    let auth_mode = AuthMode::resolve(options.auth_required, auth_registered);

    tracing::debug!(
        method = %method,
        path = %path,
        access = ?access,
        auth_mode = ?auth_mode,
        "Route configured"
    );

    ResolvedRoute {
        engine_path: engine_path(&path),
        path,
        method,
        handler,
        validate_payload: !safe,
        xsrf_required,
        enforce_xsrf,
        access,
        tags: options.tags,
        payload,
        body_limit,
        socket_timeout: options.timeout.idle_socket.unwrap_or_else(|| config.socket_timeout()),
        auth_mode,
    }
}

/// `{name*}` catch-all segments become `{*name}`.
pub fn engine_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            match segment
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix("*}"))
            {
                Some(name) => format!("{{*{}}}", name),
                None => segment.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
