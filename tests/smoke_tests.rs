//! Smoke tests against a file-backed database, including a process restart.

use std::time::Duration;

use rootmart::config::Config;
use rootmart::db::Store;
use rootmart::domain::{JobKind, JobStatus, UserRole};
use rootmart::models::module::ModuleDraft;
use rootmart::models::release::NewRelease;
use rootmart::services::SearchQuery;
use rootmart::state::SharedState;

fn file_config() -> (Config, std::path::PathBuf) {
    let db_path =
        std::env::temp_dir().join(format!("rootmart-smoke-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.scheduler.enabled = false;
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    (config, db_path)
}

fn draft(name: &str) -> ModuleDraft {
    ModuleDraft {
        name: name.to_string(),
        short_description: "Keeps the battery cool while charging".to_string(),
        description: "Throttles charging current when the battery temperature climbs.".to_string(),
        author: "someone".to_string(),
        category: "Battery".to_string(),
        license: "MIT".to_string(),
        android_versions: vec!["14".to_string()],
        root_methods: vec!["KernelSU".to_string()],
        features: vec![],
        source_url: "https://github.com/someone/cool-charge".to_string(),
        icon_url: None,
        is_open_source: true,
    }
}

fn release(version: &str) -> NewRelease {
    NewRelease {
        version: version.to_string(),
        download_url: format!("https://example.com/cool-charge-{version}.zip"),
        changelog: None,
        size_bytes: Some(512),
        github_release_id: None,
    }
}

#[tokio::test]
async fn test_catalogue_survives_restart() {
    let (config, db_path) = file_config();

    let slug = {
        let state = SharedState::new(config.clone()).await.unwrap();
        let admin = state
            .store
            .user_repo()
            .get_by_username("admin")
            .await
            .unwrap()
            .expect("bootstrap admin missing");
        assert!(admin.must_change_password);
        assert_eq!(admin.role, UserRole::Admin);

        let module = state
            .module_service
            .submit(&admin.actor(), draft("Cool Charge"), vec![release("1.0")])
            .await
            .unwrap();
        state
            .review_service
            .approve(&admin.actor(), module.id, true, None)
            .await
            .unwrap();
        module.slug
    };

    let state = SharedState::new(config).await.unwrap();
    let page = state
        .module_service
        .search(&SearchQuery::default())
        .await
        .unwrap();

    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].slug, slug);
    assert_eq!(page.items[0].latest_version.as_deref(), Some("1.0"));

    std::fs::remove_file(db_path).ok();
}

#[tokio::test]
async fn test_interrupted_jobs_fail_on_startup() {
    let (config, db_path) = file_config();

    let stale_id = {
        let store = Store::new(&config.general.database_path).await.unwrap();
        store
            .job_repo()
            .create(JobKind::GithubSync, None)
            .await
            .unwrap()
            .id
    };

    let state = SharedState::new(config).await.unwrap();
    let run = state.jobs.get(stale_id).await.unwrap();
    assert_eq!(run.status, JobStatus::Failed);
    assert!(run.error.is_some());

    let fresh = state.jobs.run_now(JobKind::GithubSync, None).await.unwrap();
    assert_eq!(fresh.status, JobStatus::Completed);

    std::fs::remove_file(db_path).ok();
}

#[tokio::test]
async fn test_events_land_in_activity_log() {
    let (config, db_path) = file_config();
    let state = SharedState::new(config).await.unwrap();

    let admin = state
        .store
        .user_repo()
        .get_by_username("admin")
        .await
        .unwrap()
        .unwrap();
    state
        .module_service
        .submit(&admin.actor(), draft("Cool Charge"), vec![])
        .await
        .unwrap();

    let mut found = false;
    for _ in 0..50 {
        let (logs, _) = state
            .store
            .get_logs(1, 20, None, Some("ModuleSubmitted".to_string()))
            .await
            .unwrap();
        if !logs.is_empty() {
            assert!(logs[0].message.contains("Cool Charge"));
            found = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(found, "submission was never logged");

    assert!(state.store.clear_logs().await.unwrap() >= 1);

    std::fs::remove_file(db_path).ok();
}
