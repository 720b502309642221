//! Shutdown coordination for the server shell.

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use tokio::sync::watch;

use crate::hooks::{HookFuture, OnPreRoutingHandler, PreRoutingOutcome};
use crate::http::request::HttpRequest;
use crate::http::response::HookResponse;
use crate::lifecycle::StateCell;

/// Body of the 503 returned once `stop` has begun.
pub const SHUTTING_DOWN_MESSAGE: &str =
    "Server is shutting down and not accepting new incoming requests";

/// Time-varying source of the shutdown timeout.
///
/// The value is sampled exactly once, when `stop` begins; later updates only
/// affect subsequent stops.
#[derive(Debug, Clone)]
pub struct ShutdownTimeout {
    rx: watch::Receiver<Duration>,
}

impl ShutdownTimeout {
    /// Create a source together with the sender used to update it.
    pub fn channel(initial: Duration) -> (watch::Sender<Duration>, Self) {
        let (tx, rx) = watch::channel(initial);
        (tx, Self { rx })
    }

    /// A source that never changes.
    pub fn fixed(timeout: Duration) -> Self {
        Self::channel(timeout).1
    }

    /// Read the current value.
    pub fn sample(&self) -> Duration {
        *self.rx.borrow()
    }
}

/// Extra time granted after the drain deadline before the serve task is detached.
pub(crate) const DETACH_GRACE: Duration = Duration::from_millis(250);

/// First pre-routing hook: rejects new requests once `stop` has begun.
pub(crate) struct ShutdownGuard {
    state: StateCell,
}

impl ShutdownGuard {
    pub(crate) fn new(state: StateCell) -> Self {
        Self { state }
    }
}

impl OnPreRoutingHandler for ShutdownGuard {
    fn on_pre_routing(&self, request: HttpRequest) -> HookFuture<PreRoutingOutcome> {
        let outcome = if self.state.get().is_stopping_or_stopped() {
            tracing::debug!(request_id = %request.id(), path = %request.path(), "Rejecting request during shutdown");
            PreRoutingOutcome::Respond(HookResponse::json(
                StatusCode::SERVICE_UNAVAILABLE,
                &json!({ "message": SHUTTING_DOWN_MESSAGE }),
            ))
        } else {
            PreRoutingOutcome::Next
        };
        Box::pin(async move { Ok(outcome) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ServerState;

    #[test]
    fn fixed_source_keeps_value_after_sender_drop() {
        let source = ShutdownTimeout::fixed(Duration::from_secs(3));
        assert_eq!(source.sample(), Duration::from_secs(3));
    }

    #[test]
    fn sample_sees_latest_update() {
        let (tx, source) = ShutdownTimeout::channel(Duration::from_secs(30));
        tx.send(Duration::from_millis(10)).unwrap();
        assert_eq!(source.sample(), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn guard_rejects_once_stopping() {
        let state = StateCell::new();
        let guard = ShutdownGuard::new(state.clone());
        let request = || HttpRequest::from_request(&axum::http::Request::new(()));

        state.set(ServerState::Listening);
        assert!(matches!(
            guard.on_pre_routing(request()).await.unwrap(),
            PreRoutingOutcome::Next
        ));

        state.set(ServerState::Stopping);
        match guard.on_pre_routing(request()).await.unwrap() {
            PreRoutingOutcome::Respond(response) => {
                assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE)
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
