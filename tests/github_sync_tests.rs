//! GitHub release sync against a local stand-in for the GitHub REST API.

use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use http_body_util::BodyExt;
use rootmart::config::Config;
use rootmart::domain::{JobKind, JobStatus};
use serde_json::{Value, json};
use tower::ServiceExt;

#[derive(Clone, Default)]
struct FakeGithub {
    seen_auth: Arc<Mutex<Vec<Option<String>>>>,
}

async fn fake_releases(
    State(fake): State<FakeGithub>,
    Path((owner, repo)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    fake.seen_auth.lock().unwrap().push(auth);

    if owner != "someone" || repo != "audio-boost" {
        return (StatusCode::NOT_FOUND, Json(json!({ "message": "Not Found" }))).into_response();
    }

    let release = |id: i64, tag: &str, draft: bool, prerelease: bool| {
        json!({
            "id": id,
            "tag_name": tag,
            "name": tag,
            "body": format!("Changes in {tag}"),
            "draft": draft,
            "prerelease": prerelease,
            "html_url": format!("https://github.com/someone/audio-boost/releases/tag/{tag}"),
            "published_at": format!("2024-0{id}-01T12:00:00Z"),
            "assets": [{
                "name": format!("audio-boost-{tag}.zip"),
                "size": 1024 * id,
                "browser_download_url": format!("https://github.com/someone/audio-boost/releases/download/{tag}/audio-boost.zip")
            }]
        })
    };

    // Newest first, like the real API.
    Json(json!([
        release(4, "v1.3.0-beta", false, true),
        release(3, "v1.2.0", false, false),
        release(5, "v1.2.1-draft", true, false),
        release(2, "v1.1.0", false, false),
        release(1, "v1.0.0", false, false),
    ]))
    .into_response()
}

async fn spawn_fake_github() -> (String, FakeGithub) {
    let fake = FakeGithub::default();
    let app = Router::new()
        .route("/repos/{owner}/{repo}/releases", get(fake_releases))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), fake)
}

fn test_config(github_base: &str) -> Config {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.general.max_db_connections = 1;
    config.general.min_db_connections = 1;
    config.server.secure_cookies = false;
    config.scheduler.enabled = false;
    config.scheduler.sync_error_history = 2;
    config.github.api_base_url = github_base.to_string();
    config.github.token = Some("ghp_server_token".to_string());
    config
}

struct TestApp {
    router: Router,
    state: Arc<rootmart::api::AppState>,
    cookie: String,
}

impl TestApp {
    async fn new(github_base: &str) -> Self {
        let state = rootmart::api::create_app_state_from_config(test_config(github_base), None)
            .await
            .expect("Failed to create app state");
        let router = rootmart::api::router(state.clone()).await;

        let mut app = Self {
            router,
            state,
            cookie: String::new(),
        };

        let (status, _, headers) = app
            .send(
                "POST",
                "/api/auth/login",
                Some(json!({ "username": "admin", "password": "password" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        app.cookie = headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .unwrap()
            .to_string();
        app
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>) -> (StatusCode,
        Value,
        HeaderMap,
    ) {
        let mut builder = Request::builder().method(method).uri(uri);
        if !self.cookie.is_empty() {
            builder = builder.header(header::COOKIE, &self.cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json, headers)
    }

    async fn create_module(&self) -> i64 {
        let (status, body, _) = self
            .send(
                "POST",
                "/api/modules",
                Some(json!({
                    "name": "Audio Boost",
                    "short_description": "Boosts speaker output on most devices",
                    "description": "Applies a tuned mixer configuration that raises the speaker volume ceiling.",
                    "author": "someone",
                    "category": "Audio",
                    "license": "MIT",
                    "android_versions": ["14"],
                    "root_methods": ["Magisk"],
                    "source_url": "https://github.com/someone/audio-boost",
                    "is_open_source": true
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_sync_imports_stable_releases_once() {
    let (base, fake) = spawn_fake_github().await;
    let app = TestApp::new(&base).await;
    let id = app.create_module().await;

    let (status, body, _) = app
        .send(
            "PUT",
            &format!("/api/admin/modules/{id}/github-sync"),
            Some(json!({ "repository": "https://github.com/someone/audio-boost.git" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["owner"], "someone");
    assert_eq!(body["data"]["repo"], "audio-boost");

    let run_uri = format!("/api/admin/modules/{id}/github-sync/run");
    let (status, body, _) = app.send("POST", &run_uri, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["imported"], 3);
    assert_eq!(body["data"]["latest_tag"], "v1.2.0");

    let (_, body, _) = app.send("GET", &format!("/api/admin/modules/{id}"), None).await;
    let releases = body["data"]["releases"].as_array().unwrap();
    assert_eq!(releases.len(), 3);
    let latest: Vec<&Value> = releases.iter().filter(|r| r["is_latest"] == true).collect();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0]["version"], "v1.2.0");
    assert_eq!(latest[0]["size_bytes"], 3072);

    let (_, body, _) = app.send("POST", &run_uri, None).await;
    assert_eq!(body["data"]["imported"], 0);

    let seen = fake.seen_auth.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert!(
        seen.iter()
            .all(|auth| auth.as_deref() == Some("Bearer ghp_server_token"))
    );
}

impl TestApp {
    async fn add_manual_release(&self, id: i64, version: &str) {
        let (status, body, _) = self
            .send(
                "POST",
                &format!("/api/admin/modules/{id}/releases"),
                Some(json!({
                    "version": version,
                    "download_url": format!("https://example.com/audio-boost-{version}.zip"),
                    "mark_latest": true
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    async fn latest_version(&self, id: i64) -> String {
        let (_, body, _) = self.send("GET", &format!("/api/admin/modules/{id}"), None).await;
        let releases = body["data"]["releases"].as_array().unwrap();
        let latest: Vec<&Value> = releases.iter().filter(|r| r["is_latest"] == true).collect();
        assert_eq!(latest.len(), 1);
        latest[0]["version"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_sync_keeps_newer_manual_latest() {
    let (base, _fake) = spawn_fake_github().await;
    let app = TestApp::new(&base).await;
    let id = app.create_module().await;
    app.add_manual_release(id, "v9.0.0").await;

    app.send(
        "PUT",
        &format!("/api/admin/modules/{id}/github-sync"),
        Some(json!({ "repository": "someone/audio-boost" })),
    )
    .await;

    let (status, body, _) = app
        .send("POST", &format!("/api/admin/modules/{id}/github-sync/run"), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["imported"], 3);

    assert_eq!(app.latest_version(id).await, "v9.0.0");
}

#[tokio::test]
async fn test_sync_promotes_tag_newer_than_latest() {
    let (base, _fake) = spawn_fake_github().await;
    let app = TestApp::new(&base).await;
    let id = app.create_module().await;
    app.add_manual_release(id, "v1.1.0").await;

    app.send(
        "PUT",
        &format!("/api/admin/modules/{id}/github-sync"),
        Some(json!({ "repository": "someone/audio-boost" })),
    )
    .await;

    let (_, body, _) = app
        .send("POST", &format!("/api/admin/modules/{id}/github-sync/run"), None)
        .await;
    assert_eq!(body["data"]["imported"], 2);

    assert_eq!(app.latest_version(id).await, "v1.2.0");
}

#[tokio::test]
async fn test_prereleases_are_opt_in() {
    let (base, _fake) = spawn_fake_github().await;
    let app = TestApp::new(&base).await;
    let id = app.create_module().await;

    app.send(
        "PUT",
        &format!("/api/admin/modules/{id}/github-sync"),
        Some(json!({ "repository": "someone/audio-boost", "include_prereleases": true })),
    )
    .await;

    let (_, body, _) = app
        .send("POST", &format!("/api/admin/modules/{id}/github-sync/run"), None)
        .await;
    assert_eq!(body["data"]["imported"], 4);
    assert_eq!(body["data"]["latest_tag"], "v1.3.0-beta");
}

#[tokio::test]
async fn test_failed_sync_keeps_bounded_error_history() {
    let (base, _fake) = spawn_fake_github().await;
    let app = TestApp::new(&base).await;
    let id = app.create_module().await;

    let (status, _, _) = app
        .send(
            "PUT",
            &format!("/api/admin/modules/{id}/github-sync"),
            Some(json!({ "repository": "not a repo" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.send(
        "PUT",
        &format!("/api/admin/modules/{id}/github-sync"),
        Some(json!({ "repository": "someone/missing" })),
    )
    .await;

    let run_uri = format!("/api/admin/modules/{id}/github-sync/run");
    for _ in 0..3 {
        let (status, _, _) = app.send("POST", &run_uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    let (status, body, _) = app
        .send("GET", &format!("/api/admin/modules/{id}/github-sync"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let errors = body["data"]["sync_errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors[0]["message"].as_str().unwrap().contains("someone/missing"));
}

#[tokio::test]
async fn test_scheduled_sync_job_summarizes_pass() {
    let (base, _fake) = spawn_fake_github().await;
    let app = TestApp::new(&base).await;

    let good = app.create_module().await;
    app.send(
        "PUT",
        &format!("/api/admin/modules/{good}/github-sync"),
        Some(json!({ "repository": "someone/audio-boost" })),
    )
    .await;

    let run = app
        .state
        .jobs()
        .run_now(JobKind::GithubSync, None)
        .await
        .unwrap();

    assert_eq!(run.status, JobStatus::Completed);
    assert_eq!(
        run.summary.as_deref(),
        Some("1 synced, 3 releases imported, 0 failed")
    );
}

#[tokio::test]
async fn test_personal_token_is_masked() {
    let (base, _fake) = spawn_fake_github().await;
    let app = TestApp::new(&base).await;

    let (_, body, _) = app.send("GET", "/api/github/token", None).await;
    assert_eq!(body["data"]["configured"], false);

    let (status, _, _) = app
        .send("PUT", "/api/github/token", Some(json!({ "token": "ghp_abcdefghijklmnop" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body, _) = app.send("GET", "/api/github/token", None).await;
    assert_eq!(body["data"]["configured"], true);
    let masked = body["data"]["masked"].as_str().unwrap();
    assert!(!masked.contains("abcdefghijkl"));

    let (status, _, _) = app.send("DELETE", "/api/github/token", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = app.send("DELETE", "/api/github/token", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
