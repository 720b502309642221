//! Lifecycle tests against a real listener.

use std::time::{Duration, Instant};

use axum::body::Body;
use reqwest::StatusCode;

use http_server_shell::config::HttpConfig;
use http_server_shell::hooks::{HookError, PreAuthOutcome};
use http_server_shell::http::HookResponse;
use http_server_shell::{HttpRequest, HttpRouter, ServerState};

mod common;

fn slow_router(delay: Duration) -> HttpRouter {
    HttpRouter::new("/api")
        .get("/ping", |_req: HttpRequest, _body: Body| async { "pong" })
        .get("/slow", move |_req: HttpRequest, _body: Body| async move {
            tokio::time::sleep(delay).await;
            "done"
        })
}

#[tokio::test]
async fn serves_until_stopped() {
    let (server, setup) = common::setup_server(common::local_config(), Duration::from_secs(1));
    setup.register_router(slow_router(Duration::ZERO)).unwrap();
    server.start().await.unwrap();
    let url = common::base_url(&server);
    let client = common::client();

    let response = client.get(format!("{url}/api/ping")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "pong");

    let missing = client.get(format!("{url}/api/nope")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    server.stop().await;
    assert_eq!(server.state(), ServerState::Stopped);
    assert!(client.get(format!("{url}/api/ping")).send().await.is_err());
}

#[tokio::test]
async fn in_flight_requests_drain_on_stop() {
    let (server, setup) = common::setup_server(common::local_config(), Duration::from_secs(5));
    setup.register_router(slow_router(Duration::from_millis(300))).unwrap();
    server.start().await.unwrap();
    let url = common::base_url(&server);

    let in_flight = tokio::spawn(async move {
        common::client().get(format!("{url}/api/slow")).send().await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    server.stop().await;
    let response = in_flight.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "done");
    assert_eq!(server.state(), ServerState::Stopped);
}

#[tokio::test]
async fn stop_is_bounded_by_shutdown_timeout() {
    let (server, setup) = common::setup_server(common::local_config(), Duration::from_millis(100));
    setup.register_router(slow_router(Duration::from_secs(30))).unwrap();
    server.start().await.unwrap();
    let url = common::base_url(&server);

    let stuck = tokio::spawn(async move {
        let _ = common::client().get(format!("{url}/api/slow")).send().await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    server.stop().await;
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(server.state(), ServerState::Stopped);
    stuck.abort();
}

#[tokio::test]
async fn static_dir_is_served_with_cache_headers() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.txt"), "hello from disk").unwrap();

    let (server, setup) = common::setup_server(common::local_config(), Duration::from_secs(1));
    setup.register_static_dir("/assets", dir.path()).unwrap();
    server.start().await.unwrap();
    let url = common::base_url(&server);

    let response = common::client()
        .get(format!("{url}/assets/hello.txt"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["cache-control"],
        "must-revalidate, public"
    );
    assert_eq!(response.text().await.unwrap(), "hello from disk");

    server.stop().await;
}

#[tokio::test]
async fn static_dir_runs_pre_auth_hooks() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("secret.txt"), "secret").unwrap();

    let (server, setup) = common::setup_server(common::local_config(), Duration::from_secs(1));
    setup.register_router(slow_router(Duration::ZERO)).unwrap();
    setup.register_static_dir("/assets", dir.path()).unwrap();
    setup
        .register_on_pre_auth(|req: HttpRequest| async move {
            if req.headers().contains_key("x-let-me-in") {
                return Ok::<_, HookError>(PreAuthOutcome::Next);
            }
            Ok(PreAuthOutcome::Respond(HookResponse::forbidden("blocked")))
        })
        .unwrap();
    server.start().await.unwrap();
    let url = common::base_url(&server);
    let client = common::client();

    let route = client.get(format!("{url}/api/ping")).send().await.unwrap();
    assert_eq!(route.status(), StatusCode::FORBIDDEN);

    let blocked = client.get(format!("{url}/assets/secret.txt")).send().await.unwrap();
    assert_eq!(blocked.status(), StatusCode::FORBIDDEN);
    assert!(!blocked.text().await.unwrap().contains("secret"));

    let allowed = client
        .get(format!("{url}/assets/secret.txt"))
        .header("x-let-me-in", "1")
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
    assert_eq!(allowed.text().await.unwrap(), "secret");

    server.stop().await;
}

#[tokio::test]
async fn idle_connection_is_closed_after_keep_alive_timeout() {
    use tokio::io::AsyncReadExt;

    let config = HttpConfig {
        keep_alive_timeout_ms: 200,
        ..common::local_config()
    };
    let (server, _setup) = common::setup_server(config, Duration::from_secs(1));
    server.start().await.unwrap();
    let address = server.local_addr().unwrap();

    let mut stream = tokio::net::TcpStream::connect(address).await.unwrap();
    let mut received = Vec::new();
    let closed = tokio::time::timeout(Duration::from_secs(3), stream.read_to_end(&mut received)).await;
    assert!(closed.is_ok(), "idle connection was not closed");

    server.stop().await;
}

#[tokio::test]
async fn rewritten_base_path_over_the_wire() {
    let config = HttpConfig {
        base_path: Some("/shell".into()),
        rewrite_base_path: true,
        ..common::local_config()
    };
    let (server, setup) = common::setup_server(config, Duration::from_secs(1));
    setup.register_router(slow_router(Duration::ZERO)).unwrap();
    server.start().await.unwrap();
    let url = common::base_url(&server);
    let client = common::client();

    let response = client.get(format!("{url}/shell/api/ping")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let outside = client.get(format!("{url}/api/ping")).send().await.unwrap();
    assert_eq!(outside.status(), StatusCode::NOT_FOUND);

    server.stop().await;
}

#[tokio::test]
async fn opaque_id_is_used_when_trusted() {
    let mut config = common::local_config();
    config.request_id.allow_from_any_ip = true;
    let (server, setup) = common::setup_server(config, Duration::from_secs(1));
    setup
        .register_router(HttpRouter::new("").get("/id", |req: HttpRequest, _body: Body| {
            let id = req.id().to_string();
            async move { id }
        }))
        .unwrap();
    server.start().await.unwrap();
    let url = common::base_url(&server);

    let response = common::client()
        .get(format!("{url}/id"))
        .header("x-opaque-id", "trace-42")
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "trace-42");

    server.stop().await;
}
