//! Cross-site request forgery check.
//!
//! Routes that require XSRF protection must be called with the
//! [`XSRF_HEADER`] header; browsers cannot add custom headers to
//! cross-origin form posts.

use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use crate::http::response::HookResponse;
use crate::routing::ResolvedRoute;

pub const XSRF_HEADER: &str = "x-xsrf";

/// Built-in post-auth check for routes enforcing XSRF protection.
pub(crate) fn check(route: &ResolvedRoute, headers: &HeaderMap) -> Result<(), Response> {
    if !route.enforce_xsrf || headers.contains_key(XSRF_HEADER) {
        return Ok(());
    }
    Err(HookResponse::bad_request(format!("Request must contain a {} header.", XSRF_HEADER))
        .into_response())
}
