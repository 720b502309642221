//! Hooks that run after authentication, before the route handler.

use std::future::Future;
use std::sync::Arc;

use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};

use super::{guarded, HookError, HookFuture, HookKind};
use crate::http::request::HttpRequest;
use crate::http::response::HookResponse;

#[derive(Debug)]
pub enum PostAuthOutcome {
    Next,
    Respond(HookResponse),
}

pub trait OnPostAuthHandler: Send + Sync + 'static {
    fn on_post_auth(&self, request: HttpRequest) -> HookFuture<PostAuthOutcome>;
}

impl<F, Fut> OnPostAuthHandler for F
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PostAuthOutcome, HookError>> + Send + 'static,
{
    fn on_post_auth(&self, request: HttpRequest) -> HookFuture<PostAuthOutcome> {
        Box::pin(self(request))
    }
}

pub(crate) async fn run(hooks: &[Arc<dyn OnPostAuthHandler>], parts: &Parts) -> Result<(), Response> {
    for hook in hooks {
        let facade = HttpRequest::from_parts(parts);
        let request_id = facade.id().clone();
        match guarded(HookKind::PostAuth, &request_id, || hook.on_post_auth(facade)).await? {
            PostAuthOutcome::Next => {}
            PostAuthOutcome::Respond(response) => return Err(response.into_response()),
        }
    }
    Ok(())
}
