//! Auth, session and hook behaviour against a real listener.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use http_server_shell::auth::SessionCookieOptions;
use http_server_shell::hooks::{
    AuthOutcome, AuthResult, HookError, PreResponseInfo, PreResponseOutcome,
};
use http_server_shell::http::HookResponse;
use http_server_shell::routing::{AuthRequirement, RouteMethod, RouteOptions};
use http_server_shell::{HttpRequest, HttpRouter, HttpServerError};

mod common;

async fn bearer(req: HttpRequest) -> Result<AuthOutcome, HookError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned);
    Ok(match token.as_deref() {
        None => AuthOutcome::NotHandled,
        Some("secret") => {
            let mut request_headers = HeaderMap::new();
            request_headers.insert("x-principal", HeaderValue::from_static("alice"));
            let mut response_headers = HeaderMap::new();
            response_headers.insert("x-auth-realm", HeaderValue::from_static("shell"));
            AuthOutcome::Authenticated(
                AuthResult::new(serde_json::json!({ "user": "alice" }))
                    .with_request_headers(request_headers)
                    .with_response_headers(response_headers),
            )
        }
        Some(_) => AuthOutcome::Respond(HookResponse::unauthorized("Invalid token")),
    })
}

#[tokio::test]
async fn bearer_auth_protects_required_routes() {
    let (server, setup) = common::setup_server(common::local_config(), Duration::from_secs(1));
    setup.register_auth(bearer).unwrap();
    let public = RouteOptions {
        auth_required: AuthRequirement::None,
        ..RouteOptions::default()
    };
    setup
        .register_router(
            HttpRouter::new("/api")
                .get("/whoami", |req: HttpRequest, _body: Body| async move {
                    req.headers()
                        .get("x-principal")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("nobody")
                        .to_string()
                })
                .route_with(RouteMethod::Get, "/public", public, |_req: HttpRequest, _body: Body| async {
                    "public"
                }),
        )
        .unwrap();
    server.start().await.unwrap();
    let url = common::base_url(&server);
    let client = common::client();

    let anonymous = client.get(format!("{url}/api/whoami")).send().await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let wrong = client
        .get(format!("{url}/api/whoami"))
        .bearer_auth("nope")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let ok = client
        .get(format!("{url}/api/whoami"))
        .bearer_auth("secret")
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(ok.headers()["x-auth-realm"], "shell");
    assert_eq!(ok.text().await.unwrap(), "alice");

    let public = client.get(format!("{url}/api/public")).send().await.unwrap();
    assert_eq!(public.status(), StatusCode::OK);

    server.stop().await;
}

#[tokio::test]
async fn first_auth_survives_rejected_second_registration() {
    async fn deny_all(_req: HttpRequest) -> Result<AuthOutcome, HookError> {
        Ok(AuthOutcome::Respond(HookResponse::forbidden("nobody gets in")))
    }

    let (server, setup) = common::setup_server(common::local_config(), Duration::from_secs(1));
    setup.register_auth(bearer).unwrap();
    assert!(matches!(
        setup.register_auth(deny_all),
        Err(HttpServerError::AuthAlreadyRegistered)
    ));
    setup
        .register_router(HttpRouter::new("/api").get("/whoami", |req: HttpRequest, _body: Body| async move {
            req.headers()
                .get("x-principal")
                .and_then(|value| value.to_str().ok())
                .unwrap_or("nobody")
                .to_string()
        }))
        .unwrap();
    server.start().await.unwrap();
    let url = common::base_url(&server);
    let client = common::client();

    let ok = client
        .get(format!("{url}/api/whoami"))
        .bearer_auth("secret")
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(ok.text().await.unwrap(), "alice");

    let anonymous = client.get(format!("{url}/api/whoami")).send().await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    server.stop().await;
}

#[tokio::test]
async fn compression_honours_referrer_allow_list() {
    let mut config = common::local_config();
    config.compression.referrer_whitelist = Some(vec!["allowed.example".into()]);
    let (server, setup) = common::setup_server(config, Duration::from_secs(1));
    let page = "compress me ".repeat(512);
    setup
        .register_router(HttpRouter::new("").get("/page", move |_req: HttpRequest, _body: Body| {
            let page = page.clone();
            async move { page }
        }))
        .unwrap();
    server.start().await.unwrap();
    let url = common::base_url(&server);
    let client = common::client();

    let encoding = |referrer: Option<&'static str>| {
        let mut request = client
            .get(format!("{url}/page"))
            .header("accept-encoding", "gzip");
        if let Some(referrer) = referrer {
            request = request.header("referer", referrer);
        }
        async move {
            let response = request.send().await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            response
                .headers()
                .get("content-encoding")
                .map(|value| value.to_str().unwrap().to_string())
        }
    };

    assert_eq!(encoding(Some("https://allowed.example/app")).await.as_deref(), Some("gzip"));
    assert_eq!(encoding(None).await.as_deref(), Some("gzip"));
    assert_eq!(encoding(Some("https://other.example/app")).await, None);
    assert_eq!(encoding(Some("not a url")).await, None);

    server.stop().await;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Session {
    user: String,
}

#[tokio::test]
async fn session_cookie_round_trip() {
    let (server, setup) = common::setup_server(common::local_config(), Duration::from_secs(1));
    let sessions = setup
        .create_cookie_session_storage_factory(
            SessionCookieOptions::<Session>::new("sid", vec!["0123456789abcdef0123456789abcdef".into()])
                .validate(|session: &Session| {
                    if session.user.is_empty() {
                        http_server_shell::auth::SessionValidation::invalid(None)
                    } else {
                        http_server_shell::auth::SessionValidation::valid()
                    }
                }),
        )
        .unwrap();

    let login = sessions.clone();
    let me = sessions.clone();
    setup
        .register_router(
            HttpRouter::new("")
                .get("/login", move |req: HttpRequest, _body: Body| {
                    let storage = login.as_scoped(&req);
                    async move {
                        match storage.set(Session { user: "alice".into() }) {
                            Ok(()) => "logged in",
                            Err(_) => "failed",
                        }
                    }
                })
                .get("/me", move |req: HttpRequest, _body: Body| {
                    let session = me.as_scoped(&req).get();
                    async move {
                        session
                            .map(|session| session.user)
                            .unwrap_or_else(|| "anonymous".into())
                    }
                }),
        )
        .unwrap();
    server.start().await.unwrap();
    let url = common::base_url(&server);
    let client = common::client();

    let login = client.get(format!("{url}/login")).send().await.unwrap();
    let set_cookie = login.headers()[header::SET_COOKIE.as_str()].to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("sid="));
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let me = client
        .get(format!("{url}/me"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(me.text().await.unwrap(), "alice");

    let tampered = format!("{cookie}00");
    let me = client
        .get(format!("{url}/me"))
        .header("cookie", tampered)
        .send()
        .await
        .unwrap();
    assert!(me.headers().contains_key("set-cookie"));
    assert_eq!(me.text().await.unwrap(), "anonymous");

    server.stop().await;
}

async fn render_not_found(
    _req: HttpRequest,
    info: PreResponseInfo,
) -> Result<PreResponseOutcome, HookError> {
    if info.status_code == axum::http::StatusCode::NOT_FOUND {
        return Ok(PreResponseOutcome::Render {
            body: Bytes::from_static(b"custom not found page"),
            headers: None,
        });
    }
    Ok(PreResponseOutcome::next())
}

#[tokio::test]
async fn pre_response_renders_not_found() {
    let (server, setup) = common::setup_server(common::local_config(), Duration::from_secs(1));
    setup.register_on_pre_response(render_not_found).unwrap();
    server.start().await.unwrap();
    let url = common::base_url(&server);

    let response = common::client().get(format!("{url}/missing")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.text().await.unwrap(), "custom not found page");

    server.stop().await;
}
