//! The registration bundle returned by [`HttpServer::setup`](super::HttpServer::setup).
//!
//! # Responsibilities
//! - Register routers, static directories and lifecycle hooks
//! - Register the single auth strategy and the cookie session factory
//! - Expose the base path, CSP, auth state and server info services
//!
//! # Design Decisions
//! - Registration is rejected while listening, except for routers added
//!   through `register_router_after_listening`
//! - Registering after stop has begun only warns; nothing will serve it

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::session::SessionStorageFactory;
use crate::auth::{AuthHeadersStorage, HttpAuth, SessionCookieOptions};
use crate::config::CspConfig;
use crate::hooks::on_pre_response::AuthResponseHeaders;
use crate::hooks::{
    AuthenticationHandler, OnPostAuthHandler, OnPreAuthHandler, OnPreResponseHandler,
    OnPreRoutingHandler,
};
use crate::http::base_path::BasePath;
use crate::http::compression::ReferrerAllowList;
use crate::http::error::{HttpServerError, Result};
use crate::http::pipeline::Pipeline;
use crate::http::server::ServerInner;
use crate::lifecycle::ServerState;
use crate::net::ListenerOptions;
use crate::routing::table::StaticDir;
use crate::routing::HttpRouter;

/// Server identity as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub hostname: String,
    pub port: u16,
    pub protocol: &'static str,
}

/// Cloneable bundle of registration capabilities.
#[derive(Clone)]
pub struct HttpServerSetup {
    inner: Arc<ServerInner>,
    pipeline: Arc<Pipeline>,
    session_storage_created: Arc<AtomicBool>,
}

impl HttpServerSetup {
    pub(crate) fn new(inner: Arc<ServerInner>, pipeline: Arc<Pipeline>) -> Self {
        Self {
            inner,
            pipeline,
            session_storage_created: Arc::default(),
        }
    }

    fn check_registration(&self, what: &'static str) -> Result<()> {
        match self.inner.state.get() {
            ServerState::Listening => Err(HttpServerError::RegisterWhileListening(what)),
            state if state.is_stopping_or_stopped() => {
                tracing::warn!(state = %state, "Registering {what} after the http server began stopping");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Queue a router; its routes are configured when the server starts.
    /// Registering the same router twice has no effect.
    pub fn register_router(&self, router: impl Into<Arc<HttpRouter>>) -> Result<()> {
        let router = router.into();
        let mut registrations = self.inner.registrations();
        self.check_registration("router")?;
        if registrations.router_ids.insert(router.id()) {
            tracing::debug!(prefix = router.prefix(), routes = router.routes().len(), "Router registered");
            registrations.pending.push(router);
        }
        Ok(())
    }

    /// Like [`register_router`](Self::register_router), but a listening
    /// server serves the router's routes immediately.
    pub fn register_router_after_listening(&self, router: impl Into<Arc<HttpRouter>>) -> Result<()> {
        let router = router.into();
        let mut registrations = self.inner.registrations();
        if !registrations.router_ids.insert(router.id()) {
            return Ok(());
        }
        if self.inner.state.get() != ServerState::Listening {
            registrations.pending.push(router);
            return Ok(());
        }

        let mut routes = registrations.configured.clone();
        routes.extend(ServerInner::configure(&self.pipeline, std::slice::from_ref(&router)));
        if let Err(error) = self.pipeline.install_routes(&routes, &registrations.static_dirs) {
            registrations.router_ids.remove(&router.id());
            return Err(error);
        }
        registrations.configured = routes;
        tracing::debug!(prefix = router.prefix(), "Router registered after listening");
        Ok(())
    }

    /// Serve the files under `dir` at `path` without authentication.
    pub fn register_static_dir(&self, path: &str, dir: impl Into<PathBuf>) -> Result<()> {
        let dir = dir.into();
        let invalid = |reason: &str| HttpServerError::InvalidStaticDir {
            path: path.to_string(),
            reason: reason.to_string(),
        };
        if !path.starts_with('/') || path == "/" || path.ends_with('/') {
            return Err(invalid("path must start with '/' and must not end with '/'"));
        }
        if !dir.is_dir() {
            return Err(invalid("directory does not exist"));
        }

        let mut registrations = self.inner.registrations();
        self.check_registration("static directory")?;
        if registrations.static_dirs.iter().any(|existing| existing.path == path) {
            return Err(invalid("path is already registered"));
        }
        registrations.static_dirs.push(StaticDir {
            path: path.to_string(),
            dir,
        });
        Ok(())
    }

    pub fn register_on_pre_routing(&self, handler: impl OnPreRoutingHandler) -> Result<()> {
        self.check_registration("onPreRouting hook")?;
        let handler: Arc<dyn OnPreRoutingHandler> = Arc::new(handler);
        self.pipeline
            .update_hooks(|hooks| hooks.pre_routing.push(Arc::clone(&handler)));
        Ok(())
    }

    pub fn register_on_pre_auth(&self, handler: impl OnPreAuthHandler) -> Result<()> {
        self.check_registration("onPreAuth hook")?;
        let handler: Arc<dyn OnPreAuthHandler> = Arc::new(handler);
        self.pipeline
            .update_hooks(|hooks| hooks.pre_auth.push(Arc::clone(&handler)));
        Ok(())
    }

    /// Install the authentication strategy. Only one may be registered.
    pub fn register_auth(&self, handler: impl AuthenticationHandler) -> Result<()> {
        self.check_registration("auth")?;
        if !self.pipeline.auth.state.mark_registered() {
            return Err(HttpServerError::AuthAlreadyRegistered);
        }
        let handler: Arc<dyn AuthenticationHandler> = Arc::new(handler);
        let copy_headers: Arc<dyn OnPreResponseHandler> = Arc::new(AuthResponseHeaders {
            storage: self.pipeline.auth.response_headers.clone(),
        });
        self.pipeline.update_hooks(|hooks| {
            hooks.auth = Some(Arc::clone(&handler));
            hooks.pre_response.push(Arc::clone(&copy_headers));
        });
        Ok(())
    }

    pub fn register_on_post_auth(&self, handler: impl OnPostAuthHandler) -> Result<()> {
        self.check_registration("onPostAuth hook")?;
        let handler: Arc<dyn OnPostAuthHandler> = Arc::new(handler);
        self.pipeline
            .update_hooks(|hooks| hooks.post_auth.push(Arc::clone(&handler)));
        Ok(())
    }

    pub fn register_on_pre_response(&self, handler: impl OnPreResponseHandler) -> Result<()> {
        self.check_registration("onPreResponse hook")?;
        let handler: Arc<dyn OnPreResponseHandler> = Arc::new(handler);
        self.pipeline
            .update_hooks(|hooks| hooks.pre_response.push(Arc::clone(&handler)));
        Ok(())
    }

    /// Create the cookie session factory. Only one may be created.
    pub fn create_cookie_session_storage_factory<T>(
        &self,
        options: SessionCookieOptions<T>,
    ) -> Result<SessionStorageFactory<T>>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        if self.inner.state.get().is_stopping_or_stopped() {
            tracing::warn!("Creating a session storage factory after the http server began stopping");
        }
        if self.session_storage_created.swap(true, Ordering::SeqCst) {
            return Err(HttpServerError::SessionStorageAlreadyCreated);
        }

        let cookie_path = match self.pipeline.base_path.server_base_path() {
            "" => "/".to_string(),
            base_path => base_path.to_string(),
        };
        SessionStorageFactory::new(options, cookie_path, self.pipeline.session_cookies.clone()).map_err(|error| {
            self.session_storage_created.store(false, Ordering::SeqCst);
            HttpServerError::from(error)
        })
    }

    pub fn base_path(&self) -> BasePath {
        self.pipeline.base_path.clone()
    }

    /// Referrer allow-list for compression; replacing it affects later requests.
    pub fn compression_referrers(&self) -> ReferrerAllowList {
        self.pipeline.compression_referrers.clone()
    }

    pub fn csp(&self) -> CspConfig {
        self.pipeline.config.csp.clone()
    }

    pub fn auth(&self) -> HttpAuth {
        HttpAuth::new(self.pipeline.auth.state.clone())
    }

    /// Request headers recorded by the auth strategy, per request.
    pub fn auth_request_headers(&self) -> AuthHeadersStorage {
        self.pipeline.auth.request_headers.clone()
    }

    pub fn server_info(&self) -> ServerInfo {
        let options = ListenerOptions::from_config(&self.pipeline.config);
        ServerInfo {
            name: self.inner.name.clone(),
            port: self
                .inner
                .bound_address()
                .map(|address| address.port())
                .unwrap_or(options.port),
            protocol: options.protocol(),
            hostname: options.host,
        }
    }
}
