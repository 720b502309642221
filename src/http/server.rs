//! The HTTP server shell: setup, start and graceful stop.
//!
//! # Responsibilities
//! - Own the lifecycle state and the request pipeline
//! - Configure pending routers and install the route table on start
//! - Bind the listener and run the axum-server serve loop
//! - Drain in-flight requests on stop, bounded by the shutdown timeout
//!
//! # Design Decisions
//! - `setup` returns the registration bundle; nothing can be registered without it
//! - `stop` always ends in `Stopped`, detaching the serve task on timeout

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use axum::Router;
use axum_server::Handle;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::task::JoinHandle;

use crate::config::HttpConfig;
use crate::hooks::on_pre_routing::OnPreRoutingHandler;
use crate::http::base_path::BasePathRewrite;
use crate::http::compression::ConditionalCompression;
use crate::http::error::{HttpServerError, Result};
use crate::http::pipeline::Pipeline;
use crate::http::setup::HttpServerSetup;
use crate::lifecycle::shutdown::{ShutdownGuard, DETACH_GRACE};
use crate::lifecycle::{ServerState, ShutdownTimeout, StateCell};
use crate::net::{listener, tls, ListenerOptions};
use crate::routing::table::StaticDir;
use crate::routing::{configure_route, HttpRouter, ResolvedRoute, RouterId};

/// Routers and static dirs collected by the setup bundle.
#[derive(Default)]
pub(crate) struct Registrations {
    pub pending: Vec<Arc<HttpRouter>>,
    pub router_ids: HashSet<RouterId>,
    /// Routes already part of the live table.
    pub configured: Vec<Arc<ResolvedRoute>>,
    pub static_dirs: Vec<StaticDir>,
}

struct Running {
    handle: Handle,
    task: JoinHandle<std::io::Result<()>>,
    address: SocketAddr,
}

pub(crate) struct ServerInner {
    pub name: String,
    pub state: StateCell,
    shutdown_timeout: ShutdownTimeout,
    pub pipeline: OnceLock<Arc<Pipeline>>,
    pub registrations: Mutex<Registrations>,
    running: Mutex<Option<Running>>,
}

impl ServerInner {
    pub(crate) fn registrations(&self) -> MutexGuard<'_, Registrations> {
        self.registrations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn bound_address(&self) -> Option<SocketAddr> {
        self.running().as_ref().map(|running| running.address)
    }

    /// Resolve the routes of `routers` against the current auth registration.
    pub(crate) fn configure(pipeline: &Pipeline, routers: &[Arc<HttpRouter>]) -> Vec<Arc<ResolvedRoute>> {
        let auth_registered = pipeline.auth.state.is_registered();
        routers
            .iter()
            .flat_map(|router| router.routes())
            .map(|descriptor| Arc::new(configure_route(descriptor.clone(), &pipeline.config, auth_registered)))
            .collect()
    }
}

/// Keep-alive connections are closed when the next request's headers do
/// not arrive within the keep-alive timeout.
fn configure_http1(builder: &mut auto::Builder<TokioExecutor>, options: &ListenerOptions) {
    let mut http1 = builder.http1();
    match options.keep_alive {
        Some(idle) => {
            http1.keep_alive(true).timer(TokioTimer::new()).header_read_timeout(idle);
        }
        None => {
            http1.keep_alive(false);
        }
    }
}

/// HTTP server shell.
#[derive(Clone)]
pub struct HttpServer {
    inner: Arc<ServerInner>,
}

impl HttpServer {
    pub fn new(name: impl Into<String>, shutdown_timeout: ShutdownTimeout) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                name: name.into(),
                state: StateCell::new(),
                shutdown_timeout,
                pipeline: OnceLock::new(),
                registrations: Mutex::new(Registrations::default()),
                running: Mutex::new(None),
            }),
        }
    }

    /// Build the request pipeline from `config` and return the registration bundle.
    pub fn setup(&self, config: HttpConfig) -> Result<HttpServerSetup> {
        if self.inner.pipeline.get().is_some() {
            return Err(HttpServerError::AlreadySetup);
        }

        let rewritten_base_path = config.rewritten_base_path().map(str::to_owned);
        let compression_enabled = config.compression.enabled;
        let pipeline = Arc::new(Pipeline::new(config, self.inner.state.clone()));

        let mut built_in: Vec<Arc<dyn OnPreRoutingHandler>> =
            vec![Arc::new(ShutdownGuard::new(self.inner.state.clone()))];
        if let Some(base_path) = &rewritten_base_path {
            built_in.push(Arc::new(BasePathRewrite::new(base_path.clone())));
        }
        built_in.push(Arc::new(ConditionalCompression::new(
            compression_enabled,
            pipeline.compression_referrers.clone(),
        )));
        pipeline.update_hooks(|hooks| hooks.pre_routing.extend(built_in.iter().cloned()));

        if self.inner.pipeline.set(Arc::clone(&pipeline)).is_err() {
            return Err(HttpServerError::AlreadySetup);
        }
        let _ = self
            .inner
            .state
            .transition(ServerState::Unconfigured, ServerState::Configured);

        tracing::debug!(
            name = %self.inner.name,
            base_path = rewritten_base_path.as_deref().unwrap_or(""),
            compression = compression_enabled,
            "Http server set up"
        );
        Ok(HttpServerSetup::new(Arc::clone(&self.inner), pipeline))
    }

    /// Configure pending routers, bind and begin serving.
    pub async fn start(&self) -> Result<()> {
        let pipeline = Arc::clone(self.inner.pipeline.get().ok_or(HttpServerError::NotSetup)?);
        match self.inner.state.get() {
            state if state.is_stopping_or_stopped() => {
                tracing::warn!(state = %state, "Http server is stopping or stopped, not starting");
                return Ok(());
            }
            ServerState::Listening => return Err(HttpServerError::AlreadyListening),
            _ => {}
        }

        let options = ListenerOptions::from_config(&pipeline.config);
        let tls_config = match &pipeline.config.tls {
            Some(tls) => Some(tls::load_tls_config(tls).await.map_err(HttpServerError::Tls)?),
            None => None,
        };

        let mut registrations = self.inner.registrations();
        let mut routes = registrations.configured.clone();
        routes.extend(ServerInner::configure(&pipeline, &registrations.pending));
        pipeline.install_routes(&routes, &registrations.static_dirs)?;

        let std_listener = listener::bind(&options)?;
        let address = std_listener.local_addr()?;
        registrations.configured = routes;
        registrations.pending.clear();

        let handle = Handle::new();
        let app = pipeline
            .service()
            .into_make_service_with_connect_info::<SocketAddr>();
        let task = match tls_config {
            Some(tls_config) => {
                let mut server = axum_server::tls_rustls::from_tcp_rustls(std_listener, tls_config)
                    .handle(handle.clone());
                configure_http1(server.http_builder(), &options);
                tokio::spawn(server.serve(app))
            }
            None => {
                let mut server = axum_server::from_tcp(std_listener)
                    .handle(handle.clone());
                configure_http1(server.http_builder(), &options);
                tokio::spawn(server.serve(app))
            }
        };

        *self.inner.running() = Some(Running {
            handle,
            task,
            address,
        });
        // Registrations stay locked until Listening is visible, so a router
        // registered concurrently is either pending here or served live.
        self.inner.state.set(ServerState::Listening);
        drop(registrations);

        tracing::info!(
            "http server running at {}://{}:{}{}",
            options.protocol(),
            options.host,
            address.port(),
            pipeline.config.rewritten_base_path().unwrap_or("")
        );
        Ok(())
    }

    /// Stop accepting requests and drain the ones in flight.
    pub async fn stop(&self) {
        let state = self.inner.state.get();
        if state.is_stopping_or_stopped() {
            tracing::debug!(state = %state, "Http server is already stopping");
            return;
        }
        self.inner.state.set(ServerState::Stopping);

        let Some(running) = self.inner.running().take() else {
            self.inner.state.set(ServerState::Stopped);
            tracing::debug!("Http server was not listening, stopped");
            return;
        };

        let timeout = self.inner.shutdown_timeout.sample();
        tracing::debug!(timeout_ms = timeout.as_millis() as u64, "Stopping http server");
        running.handle.graceful_shutdown(Some(timeout));

        let mut task = running.task;
        match tokio::time::timeout(timeout + DETACH_GRACE, &mut task).await {
            Ok(Ok(Ok(()))) => tracing::info!("http server stopped"),
            Ok(Ok(Err(error))) => tracing::error!(error = %error, "Http server stopped with an error"),
            Ok(Err(error)) => tracing::error!(error = %error, "Http server task failed"),
            Err(_) => {
                task.abort();
                let in_flight = self
                    .inner
                    .pipeline
                    .get()
                    .map(|pipeline| pipeline.in_flight.active_count())
                    .unwrap_or(0);
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    in_flight,
                    "Http server did not drain in time, detached"
                );
            }
        }
        self.inner.state.set(ServerState::Stopped);
    }

    /// The live request pipeline, for embedding and tests.
    pub fn service(&self) -> Result<Router> {
        self.inner
            .pipeline
            .get()
            .map(|pipeline| pipeline.service())
            .ok_or(HttpServerError::NotSetup)
    }

    pub fn is_listening(&self) -> bool {
        self.inner.state.get() == ServerState::Listening
    }

    pub fn state(&self) -> ServerState {
        self.inner.state.get()
    }

    /// Address bound by `start`, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.bound_address()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }
}
