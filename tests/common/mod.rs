//! Shared utilities for integration tests.

use std::time::Duration;

use http_server_shell::config::HttpConfig;
use http_server_shell::{HttpServer, HttpServerSetup, ShutdownTimeout};

/// Config bound to an ephemeral localhost port.
pub fn local_config() -> HttpConfig {
    HttpConfig {
        host: "127.0.0.1".into(),
        port: 0,
        ..HttpConfig::default()
    }
}

/// Create and set up a server; routes and hooks are registered by the caller.
pub fn setup_server(config: HttpConfig, shutdown_timeout: Duration) -> (HttpServer, HttpServerSetup) {
    let server = HttpServer::new("integration", ShutdownTimeout::fixed(shutdown_timeout));
    let setup = server.setup(config).unwrap();
    (server, setup)
}

/// Base URL of a started server.
pub fn base_url(server: &HttpServer) -> String {
    let address = server.local_addr().expect("server is listening");
    format!("http://{}", address)
}

/// Client without connection pooling, so every request opens a new connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}
