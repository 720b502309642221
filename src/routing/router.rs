//! Router collaborator: a path prefix plus an ordered list of routes.
//!
//! # Design Decisions
//! - Identity is a process-unique [`RouterId`]; registering the same router
//!   twice is a no-op
//! - The prefix is joined at build time, so descriptors carry full paths

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::route::{RouteDescriptor, RouteHandler, RouteMethod, RouteOptions};

static NEXT_ROUTER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouterId(u64);

impl RouterId {
    fn next() -> Self {
        Self(NEXT_ROUTER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for RouterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "router-{}", self.0)
    }
}

#[derive(Debug)]
pub struct HttpRouter {
    id: RouterId,
    prefix: String,
    routes: Vec<RouteDescriptor>,
}

impl HttpRouter {
    /// Router whose routes live under `prefix` (`""` for none).
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            id: RouterId::next(),
            prefix: prefix.trim_end_matches('/').to_string(),
            routes: Vec::new(),
        }
    }

    pub fn id(&self) -> RouterId {
        self.id
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }

    pub fn route_with<H: RouteHandler>(
        mut self,
        method: RouteMethod,
        path: &str,
        options: RouteOptions,
        handler: H,
    ) -> Self {
        self.routes.push(RouteDescriptor {
            path: join_path(&self.prefix, path),
            method,
            handler: Arc::new(handler),
            options,
        });
        self
    }

    pub fn route<H: RouteHandler>(self, method: RouteMethod, path: &str, handler: H) -> Self {
        self.route_with(method, path, RouteOptions::default(), handler)
    }

    pub fn get<H: RouteHandler>(self, path: &str, handler: H) -> Self {
        self.route(RouteMethod::Get, path, handler)
    }

    pub fn post<H: RouteHandler>(self, path: &str, handler: H) -> Self {
        self.route(RouteMethod::Post, path, handler)
    }

    pub fn put<H: RouteHandler>(self, path: &str, handler: H) -> Self {
        self.route(RouteMethod::Put, path, handler)
    }

    pub fn patch<H: RouteHandler>(self, path: &str, handler: H) -> Self {
        self.route(RouteMethod::Patch, path, handler)
    }

    pub fn delete<H: RouteHandler>(self, path: &str, handler: H) -> Self {
        self.route(RouteMethod::Delete, path, handler)
    }

    pub fn options<H: RouteHandler>(self, path: &str, handler: H) -> Self {
        self.route(RouteMethod::Options, path, handler)
    }
}

fn join_path(prefix: &str, path: &str) -> String {
    let path = if path.starts_with('/') || path.is_empty() {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    match (prefix.is_empty(), path.as_str()) {
        (true, "") => "/".to_string(),
        (true, _) => path,
        (false, "" | "/") => prefix.to_string(),
        (false, _) => format!("{}{}", prefix, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use crate::http::request::HttpRequest;

    async fn ok(_req: HttpRequest, _body: Body) -> &'static str {
        "ok"
    }

    #[test]
    fn prefix_is_joined() {
        let router = HttpRouter::new("/api/things/")
            .get("/", ok)
            .post("/{id}", ok)
            .delete("nested", ok);
        let paths: Vec<_> = router.routes().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, ["/api/things", "/api/things/{id}", "/api/things/nested"]);
        assert_eq!(router.routes()[1].method, RouteMethod::Post);
    }

    #[test]
    fn root_router_keeps_paths() {
        let router = HttpRouter::new("").get("/", ok).get("/status", ok);
        assert_eq!(router.routes()[0].path, "/");
        assert_eq!(router.routes()[1].path, "/status");
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(HttpRouter::new("").id(), HttpRouter::new("").id());
    }
}
