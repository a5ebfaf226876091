//! Job execution with a persistent run record per trigger.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{error, info};

use crate::config::Config;
use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::domain::{JobKind, UserId};
use crate::models::job::JobRun;
use crate::services::github_sync::GithubSyncService;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("A {0} job is already pending or running")]
    AlreadyRunning(JobKind),

    #[error("Job not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for JobError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

pub struct JobService {
    store: Store,
    github_sync: Arc<GithubSyncService>,
    config: Arc<RwLock<Config>>,
    event_bus: broadcast::Sender<NotificationEvent>,
    /// Serializes the "is one active? then create" check.
    claim: Mutex<()>,
}

impl JobService {
    #[must_use]
    pub fn new(
        store: Store,
        github_sync: Arc<GithubSyncService>,
        config: Arc<RwLock<Config>>,
        event_bus: broadcast::Sender<NotificationEvent>,
    ) -> Self {
        Self {
            store,
            github_sync,
            config,
            event_bus,
            claim: Mutex::new(()),
        }
    }

    async fn claim_run(
        &self,
        kind: JobKind,
        triggered_by: Option<UserId>,
    ) -> Result<JobRun, JobError> {
        let _guard = self.claim.lock().await;
        let jobs = self.store.job_repo();

        if jobs.find_active(kind).await?.is_some() {
            return Err(JobError::AlreadyRunning(kind));
        }

        Ok(jobs.create(kind, triggered_by).await?)
    }

    /// Creates a pending run and executes it in the background. Returns the pending run.
    pub async fn trigger(
        self: &Arc<Self>,
        kind: JobKind,
        triggered_by: Option<UserId>,
    ) -> Result<JobRun, JobError> {
        let run = self.claim_run(kind, triggered_by).await?;

        let service = Arc::clone(self);
        let pending = run.clone();
        tokio::spawn(async move {
            service.execute(pending).await;
        });

        Ok(run)
    }

    /// Creates a run and waits for it to finish. Used by the scheduler and the CLI.
    pub async fn run_now(
        &self,
        kind: JobKind,
        triggered_by: Option<UserId>,
    ) -> Result<JobRun, JobError> {
        let run = self.claim_run(kind, triggered_by).await?;
        let id = run.id;
        self.execute(run).await;
        self.get(id).await
    }

    pub async fn get(&self, id: i32) -> Result<JobRun, JobError> {
        self.store.job_repo().get(id).await?.ok_or(JobError::NotFound)
    }

    pub async fn list(&self, kind: Option<JobKind>, limit: u64) -> Result<Vec<JobRun>, JobError> {
        Ok(self.store.job_repo().list(kind, limit).await?)
    }

    /// Marks runs left pending or running by a previous process as failed.
    pub async fn recover_stale(&self) -> Result<u64, JobError> {
        let count = self.store.job_repo().fail_stale_runs().await?;
        if count > 0 {
            info!(count, "Marked interrupted job runs as failed");
        }
        Ok(count)
    }

    async fn execute(&self, run: JobRun) {
        let jobs = self.store.job_repo();
        let start = std::time::Instant::now();

        if let Err(e) = jobs.mark_running(run.id).await {
            // Never leave the run pending.
            self.fail(&run, format!("Could not start job: {e:#}"), 0).await;
            return;
        }

        info!(event = "job_started", job_id = run.id, job_name = %run.kind, "Job started");
        let _ = self.event_bus.send(NotificationEvent::JobStarted {
            job_id: run.id,
            kind: run.kind,
        });

        let duration_ms = || u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match self.perform(run.kind).await {
            Ok(summary) => {
                if let Err(e) = jobs.mark_completed(run.id, &summary).await {
                    error!(job_id = run.id, error = %e, "Failed to record job completion");
                }
                info!(
                    event = "job_finished",
                    job_id = run.id,
                    job_name = %run.kind,
                    duration_ms = duration_ms(),
                    summary = %summary,
                    "Job finished"
                );
                let _ = self.event_bus.send(NotificationEvent::JobFinished {
                    job_id: run.id,
                    kind: run.kind,
                    summary,
                });
            }
            Err(e) => {
                self.fail(&run, format!("{e:#}"), duration_ms()).await;
            }
        }
    }

    async fn fail(&self, run: &JobRun, message: String, duration_ms: u64) {
        if let Err(db_err) = self.store.job_repo().mark_failed(run.id, &message).await {
            error!(job_id = run.id, error = %db_err, "Failed to record job failure");
        }
        error!(
            event = "job_failed",
            job_id = run.id,
            job_name = %run.kind,
            duration_ms,
            error = %message,
            "Job failed"
        );
        let _ = self.event_bus.send(NotificationEvent::JobFailed {
            job_id: run.id,
            kind: run.kind,
            error: message,
        });
    }

    async fn perform(&self, kind: JobKind) -> anyhow::Result<String> {
        match kind {
            JobKind::GithubSync => {
                let summary = self.github_sync.sync_all().await?;
                Ok(summary.to_string())
            }
            JobKind::PruneLogs => {
                let days = self.config.read().await.scheduler.log_retention_days;
                let pruned = self.store.prune_logs(i64::from(days)).await?;
                Ok(format!("{pruned} log entries older than {days} days pruned"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::github::GithubClient;
    use crate::domain::JobStatus;

    async fn service() -> Arc<JobService> {
        let store = Store::with_pool_options("sqlite::memory:", 1, 1)
            .await
            .unwrap();
        let config = Arc::new(RwLock::new(Config::default()));
        let (tx, _rx) = broadcast::channel(16);
        let client = GithubClient::new(reqwest::Client::new(), &config.read().await.github);
        let github_sync = Arc::new(GithubSyncService::new(
            store.clone(),
            client,
            config.clone(),
            tx.clone(),
        ));
        Arc::new(JobService::new(store, github_sync, config, tx))
    }

    #[tokio::test]
    async fn test_run_now_completes_prune() {
        let jobs = service().await;
        let run = jobs.run_now(JobKind::PruneLogs, None).await.unwrap();
        assert_eq!(run.status, JobStatus::Completed);
        assert!(run.summary.unwrap().contains("pruned"));
        assert!(run.started_at.is_some());
        assert!(run.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_sync_with_no_configs_completes() {
        let jobs = service().await;
        let run = jobs.run_now(JobKind::GithubSync, None).await.unwrap();
        assert_eq!(run.status, JobStatus::Completed);
        assert_eq!(
            run.summary.as_deref(),
            Some("0 synced, 0 releases imported, 0 failed")
        );
    }

    #[tokio::test]
    async fn test_second_trigger_while_active_conflicts() {
        let jobs = service().await;
        let pending = jobs.store.job_repo().create(JobKind::GithubSync, None).await.unwrap();

        assert!(matches!(
            jobs.trigger(JobKind::GithubSync, None).await,
            Err(JobError::AlreadyRunning(JobKind::GithubSync))
        ));
        assert!(jobs.run_now(JobKind::PruneLogs, None).await.is_ok());

        assert_eq!(jobs.recover_stale().await.unwrap(), 1);
        let failed = jobs.get(pending.id).await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_run_that_cannot_start_is_failed() {
        use sea_orm::ConnectionTrait;

        let jobs = service().await;
        jobs.store
            .conn
            .execute_unprepared(
                "CREATE TRIGGER refuse_running BEFORE UPDATE ON job_runs \
                 WHEN NEW.status = 'running' \
                 BEGIN SELECT RAISE(ABORT, 'database is locked'); END;",
            )
            .await
            .unwrap();

        let run = jobs.run_now(JobKind::PruneLogs, None).await.unwrap();
        assert_eq!(run.status, JobStatus::Failed);
        assert!(run.error.unwrap().contains("Could not start job"));

        jobs.store
            .conn
            .execute_unprepared("DROP TRIGGER refuse_running")
            .await
            .unwrap();
        let next = jobs.run_now(JobKind::PruneLogs, None).await.unwrap();
        assert_eq!(next.status, JobStatus::Completed);
    }
}
