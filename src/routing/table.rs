//! Route table construction.
//!
//! # Responsibilities
//! - Turn resolved routes and static directories into one engine router
//! - Reject duplicate and conflicting routes with an error instead of a panic
//!
//! # Design Decisions
//! - Tables are immutable; a new table is built and swapped in whenever
//!   routes are added after listening
//! - Static directories are resolved routes with auth bypassed, so they run
//!   through the same per-route hooks as handlers

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use axum::Router;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use super::configure::{configure_route, ResolvedRoute};
use super::route::{AuthRequirement, RouteAccess, RouteDescriptor, RouteMethod, RouteOptions};
use crate::config::HttpConfig;
use crate::http::error::HttpServerError;
use crate::http::request::HttpRequest;
use crate::http::response::HookResponse;

/// A directory served without authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticDir {
    pub path: String,
    pub dir: PathBuf,
}

impl StaticDir {
    /// A public GET route serving the directory, mounted at `path`.
    pub(crate) fn route(&self, config: &HttpConfig) -> ResolvedRoute {
        let files = ServiceBuilder::new()
            .layer(SetResponseHeaderLayer::overriding(
                header::CACHE_CONTROL,
                HeaderValue::from_static("must-revalidate, public"),
            ))
            .service(ServeDir::new(&self.dir).precompressed_gzip().precompressed_br());

        let handler = move |request: HttpRequest, _body: Body| {
            let files = files.clone();
            async move {
                let mut file_request = Request::new(Body::empty());
                *file_request.method_mut() = request.method().clone();
                *file_request.uri_mut() = request.uri().clone();
                *file_request.headers_mut() = request.headers().clone();
                match files.oneshot(file_request).await {
                    Ok(response) => response.into_response(),
                    Err(never) => match never {},
                }
            }
        };

        configure_route(
            RouteDescriptor {
                path: self.path.clone(),
                method: RouteMethod::Get,
                handler: Arc::new(handler),
                options: RouteOptions {
                    auth_required: AuthRequirement::None,
                    access: Some(RouteAccess::Public),
                    ..RouteOptions::default()
                },
            },
            config,
            false,
        )
    }
}

/// Build a table from `routes` and the static directory routes mounted under
/// their path; `endpoint` produces the engine handler of one route.
pub(crate) fn build<E>(
    routes: &[Arc<ResolvedRoute>],
    static_routes: &[Arc<ResolvedRoute>],
    endpoint: E,
) -> Result<Router, HttpServerError>
where
    E: Fn(Arc<ResolvedRoute>) -> MethodRouter,
{
    let mut seen = HashSet::new();
    let mut table = Router::new();

    for route in routes {
        if !seen.insert((route.method, route.engine_path.clone())) {
            return Err(invalid_route(route, "route is already registered".into()));
        }
        let method_router = endpoint(Arc::clone(route));
        let engine_path = route.engine_path.as_str();
        table = std::panic::catch_unwind(AssertUnwindSafe(move || {
            table.route(engine_path, method_router)
        }))
        .map_err(|panic| invalid_route(route, panic_message(panic)))?;
    }

    for static_route in static_routes {
        let service = endpoint(Arc::clone(static_route));
        let path = static_route.path.as_str();
        table = std::panic::catch_unwind(AssertUnwindSafe(move || table.nest_service(path, service)))
            .map_err(|panic| HttpServerError::InvalidStaticDir {
                path: static_route.path.clone(),
                reason: panic_message(panic),
            })?;
    }

    Ok(table.fallback(not_found))
}

/// Table used before any route is installed.
pub(crate) fn empty() -> Router {
    Router::new().fallback(not_found)
}

async fn not_found() -> Response {
    HookResponse::not_found("Not Found").into_response()
}

fn invalid_route(route: &ResolvedRoute, reason: String) -> HttpServerError {
    HttpServerError::InvalidRoute {
        method: route.method.to_string(),
        path: route.path.clone(),
        reason,
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "rejected by the router".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::route::AuthMode;
    use axum::http::StatusCode;

    async fn ok(_req: HttpRequest, _body: Body) -> &'static str {
        "ok"
    }

    fn resolved(method: RouteMethod, path: &str) -> Arc<ResolvedRoute> {
        Arc::new(configure_route(
            RouteDescriptor {
                path: path.into(),
                method,
                handler: Arc::new(ok),
                options: RouteOptions::default(),
            },
            &HttpConfig::default(),
            false,
        ))
    }

    fn endpoint(route: Arc<ResolvedRoute>) -> MethodRouter {
        let body = format!("{} {}", route.method, route.path);
        axum::routing::on(route.method.method_filter(), move || async move { body })
    }

    async fn call(table: Router, method: &str, uri: &str) -> (StatusCode, String) {
        use http_body_util::BodyExt;
        let response = table
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn methods_on_one_path_are_merged() {
        let routes = [
            resolved(RouteMethod::Get, "/things/{id}"),
            resolved(RouteMethod::Delete, "/things/{id}"),
            resolved(RouteMethod::Get, "/files/{path*}"),
        ];
        let table = build(&routes, &[], endpoint).unwrap();

        assert_eq!(call(table.clone(), "GET", "/things/1").await.1, "GET /things/{id}");
        assert_eq!(call(table.clone(), "DELETE", "/things/1").await.1, "DELETE /things/{id}");
        assert_eq!(call(table.clone(), "GET", "/files/a/b.txt").await.1, "GET /files/{path*}");
        assert_eq!(call(table, "GET", "/nope").await.0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn duplicates_are_rejected() {
        let routes = [
            resolved(RouteMethod::Post, "/things"),
            resolved(RouteMethod::Post, "/things"),
        ];
        let err = build(&routes, &[], endpoint).unwrap_err();
        assert!(matches!(err, HttpServerError::InvalidRoute { .. }));
    }

    #[test]
    fn conflicting_paths_are_rejected() {
        let routes = [
            resolved(RouteMethod::Get, "/things/{id}"),
            resolved(RouteMethod::Get, "/things/{name}"),
        ];
        let err = build(&routes, &[], endpoint).unwrap_err();
        assert!(matches!(err, HttpServerError::InvalidRoute { .. }));
    }

    #[tokio::test]
    async fn static_dirs_are_served_with_cache_control() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();
        let static_dirs = [StaticDir {
            path: "/assets".into(),
            dir: dir.path().to_path_buf(),
        }];
        let static_route = Arc::new(static_dirs[0].route(&HttpConfig::default()));
        assert_eq!(static_route.auth_mode, AuthMode::Bypass);
        assert_eq!(static_route.access, RouteAccess::Public);

        let serve = |route: Arc<ResolvedRoute>| {
            axum::routing::on(route.method.method_filter(), move |request: Request<Body>| {
                let (parts, body) = request.into_parts();
                route.handler.call(HttpRequest::from_parts(&parts), body)
            })
        };
        let table = build(&[], &[static_route], serve).unwrap();

        let response = table
            .clone()
            .oneshot(Request::get("/assets/app.js").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "must-revalidate, public");

        assert_eq!(call(table, "GET", "/assets/missing.js").await.0, StatusCode::NOT_FOUND);
    }
}
