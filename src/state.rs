use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

use crate::clients::github::GithubClient;
use crate::clients::turnstile::TurnstileClient;
use crate::config::Config;
use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::services::{
    ApiKeyService, AuthService, GithubSyncService, JobService, LogService, ModuleService,
    RatingService, ReviewService, SeaOrmApiKeyService, SeaOrmAuthService, SeaOrmModuleService,
    SeaOrmRatingService, SeaOrmReviewService,
};

/// Build a shared HTTP client with reasonable defaults for API calls.
/// This client should be reused across all HTTP-based services to enable
/// connection pooling and avoid socket exhaustion.
fn build_shared_http_client(
    timeout_seconds: u64,
    user_agent: &str,
) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .user_agent(user_agent)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub turnstile: TurnstileClient,

    pub log_service: Arc<LogService>,

    pub event_bus: broadcast::Sender<NotificationEvent>,

    pub auth_service: Arc<dyn AuthService>,

    pub module_service: Arc<dyn ModuleService>,

    pub review_service: Arc<dyn ReviewService>,

    pub rating_service: Arc<dyn RatingService>,

    pub api_key_service: Arc<dyn ApiKeyService>,

    pub github_sync: Arc<GithubSyncService>,

    pub jobs: Arc<JobService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let (event_bus, _) = broadcast::channel(config.general.event_bus_buffer_size);

        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let http_client = build_shared_http_client(
            config.github.request_timeout_seconds.into(),
            &config.github.user_agent,
        )?;

        let github_client = GithubClient::new(http_client.clone(), &config.github);
        let turnstile = TurnstileClient::new(http_client);

        let config_arc = Arc::new(RwLock::new(config));

        let log_service = Arc::new(LogService::new(store.clone(), event_bus.clone()));
        log_service.clone().start_listener();

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            config_arc.clone(),
            event_bus.clone(),
        )) as Arc<dyn AuthService + Send + Sync + 'static>;

        let module_service = Arc::new(SeaOrmModuleService::new(store.clone(), event_bus.clone()))
            as Arc<dyn ModuleService + Send + Sync + 'static>;

        let review_service = Arc::new(SeaOrmReviewService::new(store.clone(), event_bus.clone()))
            as Arc<dyn ReviewService + Send + Sync + 'static>;

        let rating_service = Arc::new(SeaOrmRatingService::new(store.clone()))
            as Arc<dyn RatingService + Send + Sync + 'static>;

        let api_key_service = Arc::new(SeaOrmApiKeyService::new(
            store.clone(),
            config_arc.clone(),
            event_bus.clone(),
        )) as Arc<dyn ApiKeyService + Send + Sync + 'static>;

        let github_sync = Arc::new(GithubSyncService::new(
            store.clone(),
            github_client,
            config_arc.clone(),
            event_bus.clone(),
        ));

        let jobs = Arc::new(JobService::new(
            store.clone(),
            github_sync.clone(),
            config_arc.clone(),
            event_bus.clone(),
        ));
        jobs.recover_stale().await?;

        Ok(Self {
            config: config_arc,
            store,
            turnstile,
            log_service,
            event_bus,
            auth_service,
            module_service,
            review_service,
            rating_service,
            api_key_service,
            github_sync,
            jobs,
        })
    }
}
