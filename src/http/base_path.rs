//! Base-path service and the base-path rewrite hook.
//!
//! # Responsibilities
//! - Prepend/remove the server base path on application paths
//! - Hold per-request base-path overrides, cleared when the request completes
//! - Strip the base path from incoming requests when rewriting is enabled

use std::sync::Arc;

use dashmap::DashMap;

use crate::hooks::{HookFuture, OnPreRoutingHandler, PreRoutingOutcome};
use crate::http::request::{HttpRequest, RequestUuid};
use crate::http::response::HookResponse;

#[derive(Debug, Clone, Default)]
pub struct BasePath {
    server_base_path: String,
    public_base_url: Option<String>,
    overrides: Arc<DashMap<RequestUuid, String>>,
}

impl BasePath {
    pub fn new(server_base_path: Option<&str>, public_base_url: Option<&str>) -> Self {
        Self {
            server_base_path: server_base_path.unwrap_or_default().to_string(),
            public_base_url: public_base_url.map(str::to_string),
            overrides: Arc::default(),
        }
    }

    /// Configured base path, empty when none.
    pub fn server_base_path(&self) -> &str {
        &self.server_base_path
    }

    pub fn public_base_url(&self) -> Option<&str> {
        self.public_base_url.as_deref()
    }

    /// Base path for `request`: its override, else the server base path.
    pub fn get(&self, request: &HttpRequest) -> String {
        self.overrides
            .get(&request.uuid())
            .map(|path| path.value().clone())
            .unwrap_or_else(|| self.server_base_path.clone())
    }

    pub fn set(&self, request: &HttpRequest, base_path: impl Into<String>) {
        self.overrides.insert(request.uuid(), base_path.into());
    }

    pub(crate) fn forget(&self, id: RequestUuid) {
        self.overrides.remove(&id);
    }

    /// Prefix a server-relative path with the base path. Absolute URLs and
    /// protocol-relative paths are returned unchanged.
    pub fn prepend(&self, path: &str) -> String {
        if self.server_base_path.is_empty() || !path.starts_with('/') || path.starts_with("//") {
            return path.to_string();
        }
        format!("{}{}", self.server_base_path, path)
    }

    /// Strip the base path from `path`. Paths outside the base path are
    /// returned unchanged.
    pub fn remove(&self, path: &str) -> String {
        let (path_only, query) = match path.split_once('?') {
            Some((path_only, query)) => (path_only, Some(query)),
            None => (path, None),
        };
        match strip_base_path(&self.server_base_path, path_only) {
            Some(stripped) => match query {
                Some(query) => format!("{}?{}", stripped, query),
                None => stripped.to_string(),
            },
            None => path.to_string(),
        }
    }
}

/// `Some(rest)` when `path` is `base` or lives under it.
fn strip_base_path<'a>(base: &str, path: &'a str) -> Option<&'a str> {
    if base.is_empty() {
        return None;
    }
    let rest = path.strip_prefix(base)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Pre-routing hook stripping the base path; requests outside it get a 404.
pub(crate) struct BasePathRewrite {
    base_path: String,
}

impl BasePathRewrite {
    pub(crate) fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl OnPreRoutingHandler for BasePathRewrite {
    fn on_pre_routing(&self, request: HttpRequest) -> HookFuture<PreRoutingOutcome> {
        let outcome = match strip_base_path(&self.base_path, request.path()) {
            Some(stripped) => {
                let rewritten = match request.uri().query() {
                    Some(query) => format!("{}?{}", stripped, query),
                    None => stripped.to_string(),
                };
                PreRoutingOutcome::RewriteUrl(rewritten)
            }
            None => PreRoutingOutcome::Respond(HookResponse::not_found("Not Found")),
        };
        Box::pin(async move { Ok(outcome) })
    }
}
