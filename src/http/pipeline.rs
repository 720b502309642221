//! The per-request pipeline wrapped around the live route table.
//!
//! # Data Flow
//! ```text
//! request_state_stage   assign request id/uuid, track in-flight, measure ELU, log response
//!   → pre_routing_stage   shutdown guard → base-path rewrite → conditional compression → user hooks
//!   → CompressionLayer
//!   → pre_response_stage  pre-response hooks, queued session cookies
//!   → RouteDispatch       live table (ArcSwap), per route:
//!                         pre-auth → auth → post-auth → XSRF → payload → handler
//! ```
//!
//! # Design Decisions
//! - The table is swapped atomically, so routes registered after listening
//!   are served without restarting the listener
//! - Route handlers hold a `Weak` pipeline; the pipeline owns the table
//! - Every side-table entry is removed by a request-scope guard

use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use axum::Router;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tower::{Service, ServiceBuilder, ServiceExt};

use crate::auth::session::SessionCookieJar;
use crate::config::HttpConfig;
use crate::hooks::auth::AuthStores;
use crate::hooks::{auth, on_post_auth, on_pre_auth, on_pre_response, on_pre_routing, HookRegistry};
use crate::http::base_path::BasePath;
use crate::http::compression::{compression_layer, ReferrerAllowList};
use crate::http::error::HttpServerError;
use crate::http::request::{HttpRequest, RequestState, RequestUuid};
use crate::http::response::{internal_error, message_response, HookResponse};
use crate::lifecycle::shutdown::SHUTTING_DOWN_MESSAGE;
use crate::lifecycle::StateCell;
use crate::net::InFlightTracker;
use crate::observability::elu::{measure_active, EluMonitor, EluSample};
use crate::observability::metrics;
use crate::routing::table::{self, StaticDir};
use crate::routing::{payload, ResolvedRoute, RouteContext};
use crate::security::xsrf;

pub(crate) struct Pipeline {
    pub config: Arc<HttpConfig>,
    pub state: StateCell,
    pub hooks: ArcSwap<HookRegistry>,
    pub routes: ArcSwap<Router>,
    pub auth: AuthStores,
    pub session_cookies: SessionCookieJar,
    pub base_path: BasePath,
    pub compression_referrers: ReferrerAllowList,
    pub in_flight: InFlightTracker,
    elu: EluMonitor,
}

impl Pipeline {
    pub(crate) fn new(config: HttpConfig, state: StateCell) -> Self {
        Self {
            base_path: BasePath::new(config.base_path.as_deref(), config.public_base_url.as_deref()),
            elu: EluMonitor::new(config.elu_monitor.clone()),
            compression_referrers: ReferrerAllowList::new(config.compression.referrer_whitelist.clone()),
            config: Arc::new(config),
            state,
            hooks: ArcSwap::from_pointee(HookRegistry::default()),
            routes: ArcSwap::from_pointee(table::empty()),
            auth: AuthStores::default(),
            session_cookies: SessionCookieJar::default(),
            in_flight: InFlightTracker::new(),
        }
    }

    /// Copy-on-write update of the hook registry.
    pub(crate) fn update_hooks(&self, update: impl Fn(&mut HookRegistry)) {
        self.hooks.rcu(|current| {
            let mut next = HookRegistry::clone(current);
            update(&mut next);
            next
        });
    }

    /// Build a table from `routes` and make it live.
    pub(crate) fn install_routes(
        self: &Arc<Self>,
        routes: &[Arc<ResolvedRoute>],
        static_dirs: &[StaticDir],
    ) -> Result<(), HttpServerError> {
        let static_routes: Vec<_> = static_dirs
            .iter()
            .map(|static_dir| Arc::new(static_dir.route(&self.config)))
            .collect();
        let table = table::build(routes, &static_routes, endpoint(Arc::downgrade(self)))?;
        self.routes.store(Arc::new(table));
        tracing::debug!(routes = routes.len(), static_dirs = static_dirs.len(), "Route table installed");
        Ok(())
    }

    /// The full request pipeline as an engine router.
    pub(crate) fn service(self: &Arc<Self>) -> Router {
        let stack = ServiceBuilder::new()
            .layer(from_fn_with_state(Arc::clone(self), request_state_stage))
            .layer(from_fn_with_state(Arc::clone(self), pre_routing_stage))
            .layer(compression_layer(&self.config.compression))
            .layer(from_fn_with_state(Arc::clone(self), pre_response_stage))
            .service(RouteDispatch {
                pipeline: Arc::clone(self),
            });
        Router::new().fallback_service(stack)
    }

    /// Pre-response hooks plus queued session cookies.
    async fn finish(&self, request: &HttpRequest, response: Response) -> Response {
        let hooks = self.hooks.load_full();
        let mut response = on_pre_response::run(&hooks.pre_response, request, response).await;
        for cookie in self.session_cookies.take(request.uuid()) {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
        response
    }

    async fn execute(self: Arc<Self>, route: Arc<ResolvedRoute>, request: Request) -> Response {
        let context = Arc::new(route.context());
        let mut response = self.run_route(&route, Arc::clone(&context), request).await;
        response.extensions_mut().insert(context);
        response
    }

    async fn run_route(
        &self,
        route: &ResolvedRoute,
        context: Arc<RouteContext>,
        request: Request,
    ) -> Response {
        let (mut parts, body) = request.into_parts();
        parts.extensions.insert(context);
        let hooks = self.hooks.load_full();

        if let Err(response) = on_pre_auth::run(&hooks.pre_auth, &parts).await {
            return response;
        }
        if let Some(strategy) = hooks.auth.as_deref() {
            if let Err(response) = auth::run(strategy, route.auth_mode, &mut parts, &self.auth).await {
                return response;
            }
        }
        if let Err(response) = on_post_auth::run(&hooks.post_auth, &parts).await {
            return response;
        }
        if let Err(response) = xsrf::check(route, &parts.headers) {
            return response;
        }

        let facade = HttpRequest::from_parts(&parts);
        let request_id = facade.id().clone();
        let handle = async {
            let body = match payload::prepare(route, &parts.headers, body).await {
                Ok(body) => body,
                Err(response) => return response,
            };
            let invoke = AssertUnwindSafe(async { route.handler.call(facade, body).await });
            match invoke.catch_unwind().await {
                Ok(response) => response,
                Err(_) => {
                    tracing::error!(
                        request_id = %request_id,
                        method = %route.method,
                        path = %route.path,
                        "Route handler panicked"
                    );
                    internal_error()
                }
            }
        };

        match tokio::time::timeout(route.socket_timeout, handle).await {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!(
                    request_id = %request_id,
                    method = %route.method,
                    path = %route.path,
                    timeout_ms = route.socket_timeout.as_millis() as u64,
                    "Request timed out"
                );
                HookResponse::error(StatusCode::REQUEST_TIMEOUT, "Request Timeout").into_response()
            }
        }
    }

    fn forget(&self, id: RequestUuid) {
        self.auth.remove(id);
        self.base_path.forget(id);
        self.session_cookies.remove(id);
    }
}

/// Engine handler factory for resolved routes.
fn endpoint(pipeline: Weak<Pipeline>) -> impl Fn(Arc<ResolvedRoute>) -> MethodRouter {
    move |route| {
        let pipeline = pipeline.clone();
        let filter = route.method.method_filter();
        axum::routing::on(filter, move |request: Request| {
            let pipeline = pipeline.upgrade();
            let route = Arc::clone(&route);
            async move {
                match pipeline {
                    Some(pipeline) => pipeline.execute(route, request).await,
                    None => message_response(StatusCode::SERVICE_UNAVAILABLE, SHUTTING_DOWN_MESSAGE),
                }
            }
        })
    }
}

/// Clears every side-table entry of one request when dropped.
struct RequestScope {
    pipeline: Arc<Pipeline>,
    id: RequestUuid,
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.pipeline.forget(self.id);
    }
}

async fn request_state_stage(
    State(pipeline): State<Arc<Pipeline>>,
    mut request: Request,
    next: Next,
) -> Response {
    let state = RequestState::assign(&request, &pipeline.config.request_id);
    let request_id = state.request_id.clone();
    let request_uuid = state.request_uuid;
    let started_at = state.received_at;
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    request.extensions_mut().insert(state);

    let _in_flight = pipeline.in_flight.track();
    let _scope = RequestScope {
        pipeline: Arc::clone(&pipeline),
        id: request_uuid,
    };

    let (response, active) = measure_active(next.run(request)).await;
    let elapsed = started_at.elapsed();
    pipeline.elu.observe(&path, EluSample { active, elapsed });

    let status = response.status().as_u16();
    let bytes = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");
    tracing::debug!(
        request_id = %request_id,
        request_uuid = %request_uuid,
        "{} {} {} {}ms - {}",
        method,
        path,
        status,
        elapsed.as_millis(),
        bytes
    );
    metrics::record_request(method.as_str(), status, started_at);
    response
}

async fn pre_routing_stage(
    State(pipeline): State<Arc<Pipeline>>,
    mut request: Request,
    next: Next,
) -> Response {
    let hooks = pipeline.hooks.load_full();
    if let Err(response) = on_pre_routing::run(&hooks.pre_routing, &mut request).await {
        let facade = HttpRequest::from_request(&request);
        return pipeline.finish(&facade, response).await;
    }
    next.run(request).await
}

async fn pre_response_stage(
    State(pipeline): State<Arc<Pipeline>>,
    request: Request,
    next: Next,
) -> Response {
    let facade = HttpRequest::from_request(&request);
    let response = next.run(request).await;
    let route = response.extensions().get::<Arc<RouteContext>>().cloned();
    pipeline.finish(&facade.with_route(route), response).await
}

/// Dispatches into whichever route table is live when the request arrives.
#[derive(Clone)]
struct RouteDispatch {
    pipeline: Arc<Pipeline>,
}

impl Service<Request<Body>> for RouteDispatch {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let table = self.pipeline.routes.load_full();
        Box::pin(async move { Router::clone(&table).oneshot(request).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{HookError, PreRoutingOutcome};
    use crate::routing::{configure_route, HttpRouter};
    use http_body_util::BodyExt;

    fn pipeline(config: HttpConfig) -> Arc<Pipeline> {
        Arc::new(Pipeline::new(config, StateCell::new()))
    }

    fn install(pipeline: &Arc<Pipeline>, router: HttpRouter) {
        let routes: Vec<_> = router
            .routes()
            .iter()
            .map(|descriptor| Arc::new(configure_route(descriptor.clone(), &pipeline.config, false)))
            .collect();
        pipeline.install_routes(&routes, &[]).unwrap();
    }

    async fn get(service: Router, uri: &str) -> (StatusCode, String) {
        let response = service
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn table_swap_is_visible_to_existing_service() {
        let pipeline = pipeline(HttpConfig::default());
        let service = pipeline.service();
        assert_eq!(get(service.clone(), "/late").await.0, StatusCode::NOT_FOUND);

        install(
            &pipeline,
            HttpRouter::new("").get("/late", |_req: HttpRequest, _body: Body| async { "late" }),
        );
        assert_eq!(get(service, "/late").await, (StatusCode::OK, "late".into()));
    }

    #[tokio::test]
    async fn side_tables_are_cleared_after_request() {
        let pipeline = pipeline(HttpConfig::default());
        pipeline.auth.state.mark_registered();
        let weak = Arc::downgrade(&pipeline);
        install(
            &pipeline,
            HttpRouter::new("").get("/x", move |req: HttpRequest, _body: Body| {
                let pipeline = weak.upgrade();
                async move {
                    if let Some(pipeline) = pipeline {
                        pipeline.auth.state.set(req.uuid(), serde_json::json!({}));
                        pipeline.base_path.set(&req, "/s/a");
                    }
                    "ok"
                }
            }),
        );
        assert_eq!(get(pipeline.service(), "/x").await.0, StatusCode::OK);
        assert!(pipeline.auth.state.is_empty());
        assert_eq!(pipeline.in_flight.active_count(), 0);
    }

    #[tokio::test]
    async fn panicking_handler_is_isolated() {
        let pipeline = pipeline(HttpConfig::default());
        install(
            &pipeline,
            HttpRouter::new("")
                .get("/boom", |_req: HttpRequest, _body: Body| async {
                    if true {
                        panic!("handler exploded");
                    }
                    "unreachable"
                })
                .get("/fine", |_req: HttpRequest, _body: Body| async { "fine" }),
        );
        let service = pipeline.service();
        let (status, body) = get(service.clone(), "/boom").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("An internal server error occurred."));
        assert_eq!(get(service, "/fine").await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn pre_routing_failure_only_fails_that_request() {
        let pipeline = pipeline(HttpConfig::default());
        install(
            &pipeline,
            HttpRouter::new("").get("/x", |_req: HttpRequest, _body: Body| async { "ok" }),
        );
        pipeline.update_hooks(|hooks| {
            hooks.pre_routing.push(Arc::new(|req: HttpRequest| async move {
                if req.headers().contains_key("x-explode") {
                    return Err(HookError::msg("exploded"));
                }
                Ok(PreRoutingOutcome::Next)
            }));
        });

        let service = pipeline.service();
        let failing = service
            .clone()
            .oneshot(
                Request::get("/x")
                    .header("x-explode", "1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(failing.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(get(service, "/x").await.0, StatusCode::OK);
    }
}
