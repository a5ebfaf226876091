//! Captcha-protected submission against a local stand-in for Turnstile siteverify.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Form, Json, Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    routing::post,
};
use http_body_util::BodyExt;
use rootmart::config::Config;
use serde_json::{Value, json};
use tower::ServiceExt;

const PASSING_TOKEN: &str = "XXXX.DUMMY.TOKEN.PASS";

#[derive(Clone, Default)]
struct FakeSiteverify {
    seen: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

async fn siteverify(
    State(fake): State<FakeSiteverify>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<Value> {
    let passed = form.get("response").map(String::as_str) == Some(PASSING_TOKEN)
        && form.get("secret").map(String::as_str) == Some("turnstile-secret");
    fake.seen.lock().unwrap().push(form);

    if passed {
        Json(json!({ "success": true, "error-codes": [] }))
    } else {
        Json(json!({ "success": false, "error-codes": ["invalid-input-response"] }))
    }
}

async fn spawn_fake_siteverify() -> (String, FakeSiteverify) {
    let fake = FakeSiteverify::default();
    let app = Router::new()
        .route("/turnstile/v0/siteverify", post(siteverify))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/turnstile/v0/siteverify"), fake)
}

fn test_config(verify_url: &str) -> Config {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.general.max_db_connections = 1;
    config.general.min_db_connections = 1;
    config.server.secure_cookies = false;
    config.scheduler.enabled = false;
    config.turnstile.enabled = true;
    config.turnstile.site_key = "turnstile-site".to_string();
    config.turnstile.secret_key = "turnstile-secret".to_string();
    config.turnstile.verify_url = verify_url.to_string();
    config
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value, HeaderMap) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("cf-connecting-ip", "203.0.113.7");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json, headers)
}

fn submission(name: &str, token: &str) -> Value {
    json!({
        "name": name,
        "short_description": "Boosts speaker output on most devices",
        "description": "Applies a tuned mixer configuration that raises the speaker volume ceiling.",
        "author": "someone",
        "category": "Audio",
        "license": "MIT",
        "android_versions": ["14"],
        "root_methods": ["Magisk"],
        "source_url": "https://github.com/someone/audio-boost",
        "is_open_source": true,
        "turnstile_token": token
    })
}

#[tokio::test]
async fn test_submission_requires_passing_captcha() {
    let (verify_url, fake) = spawn_fake_siteverify().await;
    let state = rootmart::api::create_app_state_from_config(test_config(&verify_url), None)
        .await
        .expect("Failed to create app state");
    let app = rootmart::api::router(state).await;

    let (_, body, _) = send(&app, "GET", "/api/config/public", None, None).await;
    assert_eq!(body["data"]["turnstile_enabled"], true);

    let (status, _, headers) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "admin", "password": "password" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .unwrap()
        .to_string();

    let (status, body, _) = send(
        &app,
        "POST",
        "/api/modules",
        Some(&cookie),
        Some(submission("Audio Boost", "not-a-real-token")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["success"], false);

    let (status, body, _) = send(
        &app,
        "POST",
        "/api/modules",
        Some(&cookie),
        Some(submission("Audio Boost", PASSING_TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["slug"], "audio-boost");

    let seen = fake.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    for form in &seen {
        assert_eq!(form.get("secret").map(String::as_str), Some("turnstile-secret"));
        assert_eq!(form.get("remoteip").map(String::as_str), Some("203.0.113.7"));
    }
    assert_eq!(seen[1].get("response").map(String::as_str), Some(PASSING_TOKEN));
}
