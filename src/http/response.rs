//! Responses produced by lifecycle hooks and by the shell itself.
//!
//! # Design Decisions
//! - Hook responses carry status, headers and a buffered body
//! - Error bodies use the `{ statusCode, error, message }` shape
//! - Responses synthesized by the shell use `{ message }`

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

/// Body of the 500 returned when a hook or handler fails.
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal server error occurred.";

/// Response returned by a hook to short-circuit the pipeline.
#[derive(Debug, Clone)]
pub struct HookResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl HookResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Self {
        let body = serde_json::to_vec(body).unwrap_or_default();
        Self::new(status)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json; charset=utf-8"),
            )
            .body(body)
    }

    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            )
            .body(body.into())
    }

    /// Error in the `{ statusCode, error, message }` shape.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self::json(
            status,
            &json!({
                "statusCode": status.as_u16(),
                "error": status.canonical_reason().unwrap_or("Error"),
                "message": message.into(),
            }),
        )
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::error(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::error(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::error(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::error(StatusCode::NOT_FOUND, message)
    }

    pub fn custom_error(status: StatusCode, message: impl Into<String>) -> Self {
        Self::error(status, message)
    }

    /// 302 to `location`. An unrepresentable location yields a bare 302.
    pub fn redirected(location: &str) -> Self {
        let response = Self::new(StatusCode::FOUND);
        match HeaderValue::from_str(location) {
            Ok(value) => response.header(header::LOCATION, value),
            Err(_) => {
                tracing::warn!(location = %location, "Dropping invalid redirect location");
                response
            }
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HookResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        response.headers_mut().extend(self.headers);
        response
    }
}

/// `{ "message": ... }` response synthesized by the shell.
pub(crate) fn message_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

pub(crate) fn internal_error() -> Response {
    message_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn error_shape() {
        let response = HookResponse::forbidden("nope").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json; charset=utf-8"
        );
        assert_eq!(
            body_json(response).await,
            json!({"statusCode": 403, "error": "Forbidden", "message": "nope"})
        );
    }

    #[tokio::test]
    async fn redirect_sets_location() {
        let response = HookResponse::redirected("/login?next=%2F").into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/login?next=%2F");
    }

    #[tokio::test]
    async fn internal_error_body() {
        let response = internal_error();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"message": INTERNAL_ERROR_MESSAGE})
        );
    }
}
