//! Serve command handler

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tracing::{error, info};

use crate::api;
use crate::config::Config;
use crate::domain::events::NotificationEvent;
use crate::services::Scheduler;

pub async fn cmd_serve(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<()> {
    info!("Rootmart v{} starting...", env!("CARGO_PKG_VERSION"));

    let api_state = api::create_app_state_from_config(config.clone(), prometheus_handle).await?;

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(api_state.jobs()),
        config.scheduler.clone(),
    ));

    let scheduler_handle = {
        let sched = Arc::clone(&scheduler);
        let event_bus = api_state.shared.event_bus.clone();
        tokio::spawn(async move {
            if let Err(e) = sched.start().await {
                error!("Scheduler error: {}", e);
                let _ = event_bus.send(NotificationEvent::Error {
                    message: format!("Scheduler stopped: {e}"),
                });
            }
        })
    };

    if config.server.enabled {
        let port = config.server.port;
        let app = api::router(api_state).await;
        let addr = format!("0.0.0.0:{port}");
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!("Web API listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        info!("Web API disabled, running scheduler only. Press Ctrl+C to stop.");
        shutdown_signal().await;
    }

    scheduler.stop().await;
    scheduler_handle.abort();
    info!("Rootmart stopped");

    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {}", e),
    }
}
