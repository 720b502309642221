//! Payload constraints applied before a route handler runs.
//!
//! # Responsibilities
//! - Reject disallowed content types (415)
//! - Enforce the body size limit (413)
//! - Bound the time spent receiving the body (408)
//! - Reject malformed JSON when parsing is requested (400)

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use http_body_util::{LengthLimitError, Limited};
use serde::de::IgnoredAny;

use super::configure::ResolvedRoute;
use super::route::BodyOutput;
use crate::http::response::HookResponse;

const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Validate and prepare the request body for `route`'s handler.
pub(crate) async fn prepare(
    route: &ResolvedRoute,
    headers: &HeaderMap,
    body: Body,
) -> Result<Body, Response> {
    if !route.validate_payload {
        return Ok(body);
    }

    let content_type = media_type(headers);
    let settings = route.payload.as_ref();

    if let Some(accepts) = settings.and_then(|payload| payload.accepts.as_ref()) {
        if !accepts.iter().any(|accepted| media_type_matches(accepted, &content_type)) {
            return Err(HookResponse::error(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Unsupported Media Type",
            )
            .into_response());
        }
    }

    let limit = route.body_limit;
    if let Some(length) = content_length(headers) {
        if length > limit as u64 {
            return Err(too_large(limit));
        }
    }

    if settings.and_then(|payload| payload.output) == Some(BodyOutput::Stream) {
        return Ok(Body::new(Limited::new(body, limit)));
    }

    let read = axum::body::to_bytes(body, limit);
    let bytes = match settings.and_then(|payload| payload.timeout) {
        Some(timeout) => match tokio::time::timeout(timeout, read).await {
            Ok(read) => read,
            Err(_) => {
                return Err(HookResponse::error(StatusCode::REQUEST_TIMEOUT, "Request Timeout")
                    .into_response())
            }
        },
        None => read.await,
    };
    let bytes: Bytes = match bytes {
        Ok(bytes) => bytes,
        Err(error) if is_length_limit(&error) => return Err(too_large(limit)),
        Err(error) => {
            tracing::debug!(error = %error, "Failed to read request payload");
            return Err(HookResponse::bad_request("Failed to read request payload").into_response());
        }
    };

    let parse = settings.and_then(|payload| payload.parse) == Some(true);
    if parse && is_json(&content_type) && !bytes.is_empty() {
        if let Err(error) = serde_json::from_slice::<IgnoredAny>(&bytes) {
            tracing::debug!(error = %error, "Rejecting malformed JSON payload");
            return Err(HookResponse::bad_request("Invalid request payload JSON format").into_response());
        }
    }

    Ok(Body::from(bytes))
}

fn too_large(limit: usize) -> Response {
    HookResponse::error(
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("Payload content length greater than maximum allowed: {}", limit),
    )
    .into_response()
}

fn media_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

/// `accepted` is `type/subtype` or `type/*`.
fn media_type_matches(accepted: &str, media_type: &str) -> bool {
    let accepted = accepted.trim().to_ascii_lowercase();
    match accepted.strip_suffix("/*") {
        Some(kind) => media_type
            .split_once('/')
            .is_some_and(|(media_kind, _)| media_kind == kind),
        None => accepted == media_type,
    }
}

fn is_json(media_type: &str) -> bool {
    media_type == "application/json" || media_type.ends_with("+json")
}

fn is_length_limit(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = Some(error);
    while let Some(current) = source {
        if current.is::<LengthLimitError>() {
            return true;
        }
        source = current.source();
    }
    false
}
