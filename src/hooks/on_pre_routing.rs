//! Hooks that run before the route lookup.

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Request, Uri};
use axum::response::{IntoResponse, Response};

use super::{guarded, HookError, HookFuture, HookKind};
use crate::http::request::HttpRequest;
use crate::http::response::{internal_error, HookResponse};

#[derive(Debug)]
pub enum PreRoutingOutcome {
    Next,
    /// Continue after adjusting the request headers.
    NextWith {
        set_headers: HeaderMap,
        remove_headers: Vec<HeaderName>,
    },
    /// Continue with a different path (and query) for routing.
    RewriteUrl(String),
    Respond(HookResponse),
}

pub trait OnPreRoutingHandler: Send + Sync + 'static {
    fn on_pre_routing(&self, request: HttpRequest) -> HookFuture<PreRoutingOutcome>;
}

impl<F, Fut> OnPreRoutingHandler for F
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PreRoutingOutcome, HookError>> + Send + 'static,
{
    fn on_pre_routing(&self, request: HttpRequest) -> HookFuture<PreRoutingOutcome> {
        Box::pin(self(request))
    }
}

/// Run `hooks` in order against the live request.
pub(crate) async fn run(
    hooks: &[Arc<dyn OnPreRoutingHandler>],
    request: &mut Request<Body>,
) -> Result<(), Response> {
    for hook in hooks {
        let facade = HttpRequest::from_request(&*request);
        let request_id = facade.id().clone();
        let outcome = guarded(HookKind::PreRouting, &request_id, || hook.on_pre_routing(facade)).await?;

        match outcome {
            PreRoutingOutcome::Next => {}
            PreRoutingOutcome::NextWith {
                set_headers,
                remove_headers,
            } => {
                let headers = request.headers_mut();
                for name in &remove_headers {
                    headers.remove(name);
                }
                headers.extend(set_headers);
            }
            PreRoutingOutcome::RewriteUrl(url) => match url.parse::<Uri>() {
                Ok(uri) => *request.uri_mut() = uri,
                Err(error) => {
                    tracing::error!(
                        request_id = %request_id,
                        url = %url,
                        error = %error,
                        "onPreRouting hook rewrote to an invalid url"
                    );
                    return Err(internal_error());
                }
            },
            PreRoutingOutcome::Respond(response) => return Err(response.into_response()),
        }
    }
    Ok(())
}
