//! `http-shell`: runs the HTTP server shell from a TOML config file.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap};
use axum::Json;
use clap::Parser;
use subtle::ConstantTimeEq;

use http_server_shell::config::watcher::{ConfigWatcher, ReloadTargets};
use http_server_shell::config::{load_config, ServerConfig};
use http_server_shell::hooks::{
    AuthOutcome, AuthResult, HookError, PreResponseInfo, PreResponseOutcome,
};
use http_server_shell::http::{HookResponse, HttpRequest, HttpServer, HttpServerSetup};
use http_server_shell::lifecycle::signals::shutdown_signal;
use http_server_shell::lifecycle::ShutdownTimeout;
use http_server_shell::observability::{logging, metrics};
use http_server_shell::routing::{AuthRequirement, HttpRouter, RouteMethod, RouteOptions};

#[derive(Debug, Parser)]
#[command(name = "http-shell", version, about = "HTTP server shell")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        load_config(&cli.config)?
    } else {
        ServerConfig::default()
    };

    logging::init(&config.observability);
    if !cli.config.exists() {
        tracing::warn!(path = ?cli.config, "Config file not found, using defaults");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let (timeout_tx, shutdown_timeout) = ShutdownTimeout::channel(config.http.shutdown_timeout());
    let server = HttpServer::new(config.http.name.clone(), shutdown_timeout);
    let setup = server.setup(config.http.clone())?;

    register_status_route(&setup)?;
    register_csp_header(&setup)?;
    for static_dir in &config.static_dirs {
        setup.register_static_dir(&static_dir.path, static_dir.dir.clone())?;
    }
    if let Some(api_key) = config.auth.api_key.clone() {
        register_bearer_auth(&setup, api_key)?;
    }

    server.start().await?;

    let _watcher = if cli.config.exists() {
        let targets = ReloadTargets {
            shutdown_timeout: timeout_tx,
            compression_referrers: setup.compression_referrers(),
        };
        Some(ConfigWatcher::new(&cli.config, &config, targets).run()?)
    } else {
        None
    };

    shutdown_signal().await;
    server.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn register_status_route(setup: &HttpServerSetup) -> Result<(), Box<dyn std::error::Error>> {
    let status_setup = setup.clone();
    let options = RouteOptions {
        auth_required: AuthRequirement::Optional,
        tags: vec!["access:status".into()],
        ..RouteOptions::default()
    };
    let router = HttpRouter::new("/api").route_with(
        RouteMethod::Get,
        "/status",
        options,
        move |_req: HttpRequest, _body: Body| {
            let info = status_setup.server_info();
            async move { Json(info) }
        },
    );
    setup.register_router(router)?;
    Ok(())
}

fn register_csp_header(setup: &HttpServerSetup) -> Result<(), Box<dyn std::error::Error>> {
    let csp = setup.csp().header_value()?;
    setup.register_on_pre_response(move |_req: HttpRequest, _info: PreResponseInfo| {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_SECURITY_POLICY, csp.clone());
        async move { Ok::<_, HookError>(PreResponseOutcome::with_headers(headers)) }
    })?;
    Ok(())
}

fn register_bearer_auth(setup: &HttpServerSetup, api_key: String) -> Result<(), Box<dyn std::error::Error>> {
    let api_key: Arc<str> = api_key.into();
    setup.register_auth(move |req: HttpRequest| {
        let api_key = Arc::clone(&api_key);
        async move {
            let Some(token) = req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
            else {
                return Ok::<_, HookError>(AuthOutcome::NotHandled);
            };
            if api_key_matches(token, &api_key) {
                Ok(AuthOutcome::Authenticated(AuthResult::new(
                    serde_json::json!({ "principal": "api-key" }),
                )))
            } else {
                Ok(AuthOutcome::Respond(HookResponse::unauthorized("Invalid API key")))
            }
        }
    })?;
    Ok(())
}

fn api_key_matches(token: &str, api_key: &str) -> bool {
    bool::from(token.as_bytes().ct_eq(api_key.as_bytes()))
}
