//! Hooks that run once a response exists, before it is sent.

use std::future::Future;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;

use super::{guarded, HookError, HookFuture, HookKind};
use crate::auth::AuthHeadersStorage;
use crate::http::request::HttpRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreResponseInfo {
    pub status_code: StatusCode,
}

#[derive(Debug)]
pub enum PreResponseOutcome {
    /// Continue, merging `headers` onto the response.
    Next { headers: Option<HeaderMap> },
    /// Replace the body of a non-redirect response; the status is kept.
    Render {
        body: Bytes,
        headers: Option<HeaderMap>,
    },
}

impl PreResponseOutcome {
    pub fn next() -> Self {
        PreResponseOutcome::Next { headers: None }
    }

    pub fn with_headers(headers: HeaderMap) -> Self {
        PreResponseOutcome::Next {
            headers: Some(headers),
        }
    }
}

pub trait OnPreResponseHandler: Send + Sync + 'static {
    fn on_pre_response(
        &self,
        request: HttpRequest,
        info: PreResponseInfo,
    ) -> HookFuture<PreResponseOutcome>;
}

impl<F, Fut> OnPreResponseHandler for F
where
    F: Fn(HttpRequest, PreResponseInfo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PreResponseOutcome, HookError>> + Send + 'static,
{
    fn on_pre_response(
        &self,
        request: HttpRequest,
        info: PreResponseInfo,
    ) -> HookFuture<PreResponseOutcome> {
        Box::pin(self(request, info))
    }
}

/// Copies the auth strategy's response headers onto every response.
pub(crate) struct AuthResponseHeaders {
    pub storage: AuthHeadersStorage,
}

impl OnPreResponseHandler for AuthResponseHeaders {
    fn on_pre_response(
        &self,
        request: HttpRequest,
        _info: PreResponseInfo,
    ) -> HookFuture<PreResponseOutcome> {
        let headers = self.storage.get(request.uuid());
        Box::pin(async move { Ok(PreResponseOutcome::Next { headers }) })
    }
}

pub(crate) async fn run(
    hooks: &[Arc<dyn OnPreResponseHandler>],
    request: &HttpRequest,
    mut response: Response,
) -> Response {
    for hook in hooks {
        let info = PreResponseInfo {
            status_code: response.status(),
        };
        let facade = request.clone();
        let outcome = match guarded(HookKind::PreResponse, request.id(), || {
            hook.on_pre_response(facade, info)
        })
        .await
        {
            Ok(outcome) => outcome,
            Err(failure) => return failure,
        };

        match outcome {
            PreResponseOutcome::Next { headers } => {
                if let Some(headers) = headers {
                    merge_headers(request, &mut response, headers);
                }
            }
            PreResponseOutcome::Render { body, headers } => {
                if response.status().is_redirection() {
                    tracing::warn!(
                        request_id = %request.id(),
                        status = response.status().as_u16(),
                        "onPreResponse hook cannot render the body of a redirect"
                    );
                    continue;
                }
                let (mut parts, _) = response.into_parts();
                parts.headers.remove(header::CONTENT_LENGTH);
                response = Response::from_parts(parts, Body::from(body));
                if let Some(headers) = headers {
                    merge_headers(request, &mut response, headers);
                }
            }
        }
    }
    response
}

fn merge_headers(request: &HttpRequest, response: &mut Response, headers: HeaderMap) {
    let overridden: Vec<&str> = headers
        .keys()
        .filter(|name| response.headers().contains_key(*name))
        .map(|name| name.as_str())
        .collect();
    if !overridden.is_empty() {
        tracing::debug!(
            request_id = %request.id(),
            headers = ?overridden,
            "onPreResponse hook overrides response headers"
        );
    }
    response.headers_mut().extend(headers);
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;

    fn request() -> HttpRequest {
        HttpRequest::from_request(&axum::http::Request::new(Body::empty()))
    }

    async fn add_header(
        _req: HttpRequest,
        info: PreResponseInfo,
    ) -> Result<PreResponseOutcome, HookError> {
        let mut headers = HeaderMap::new();
        headers.insert("x-status", info.status_code.as_str().parse().unwrap());
        Ok(PreResponseOutcome::with_headers(headers))
    }

    async fn render(
        _req: HttpRequest,
        _info: PreResponseInfo,
    ) -> Result<PreResponseOutcome, HookError> {
        Ok(PreResponseOutcome::Render {
            body: Bytes::from_static(b"rendered"),
            headers: None,
        })
    }

    #[tokio::test]
    async fn headers_are_merged() {
        let hooks = vec![Arc::new(add_header) as Arc<dyn OnPreResponseHandler>];
        let response = run(&hooks, &request(), StatusCode::CREATED.into_response()).await;
        assert_eq!(response.headers()["x-status"], "201");
    }

    #[tokio::test]
    async fn render_keeps_status() {
        let hooks = vec![Arc::new(render) as Arc<dyn OnPreResponseHandler>];
        let response = run(
            &hooks,
            &request(),
            (StatusCode::NOT_FOUND, "original").into_response(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"rendered");
    }

    #[tokio::test]
    async fn redirects_are_not_rendered() {
        let hooks = vec![Arc::new(render) as Arc<dyn OnPreResponseHandler>];
        let redirect = crate::http::response::HookResponse::redirected("/x").into_response();
        let response = run(&hooks, &request(), redirect).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }
}
