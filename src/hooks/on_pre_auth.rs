//! Hooks that run after routing and before authentication.

use std::future::Future;
use std::sync::Arc;

use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};

use super::{guarded, HookError, HookFuture, HookKind};
use crate::http::request::HttpRequest;
use crate::http::response::HookResponse;

#[derive(Debug)]
pub enum PreAuthOutcome {
    Next,
    Respond(HookResponse),
}

pub trait OnPreAuthHandler: Send + Sync + 'static {
    fn on_pre_auth(&self, request: HttpRequest) -> HookFuture<PreAuthOutcome>;
}

impl<F, Fut> OnPreAuthHandler for F
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PreAuthOutcome, HookError>> + Send + 'static,
{
    fn on_pre_auth(&self, request: HttpRequest) -> HookFuture<PreAuthOutcome> {
        Box::pin(self(request))
    }
}

pub(crate) async fn run(hooks: &[Arc<dyn OnPreAuthHandler>], parts: &Parts) -> Result<(), Response> {
    for hook in hooks {
        let facade = HttpRequest::from_parts(parts);
        let request_id = facade.id().clone();
        match guarded(HookKind::PreAuth, &request_id, || hook.on_pre_auth(facade)).await? {
            PreAuthOutcome::Next => {}
            PreAuthOutcome::Respond(response) => return Err(response.into_response()),
        }
    }
    Ok(())
}
