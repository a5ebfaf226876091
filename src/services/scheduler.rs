use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::config::SchedulerConfig;
use crate::domain::JobKind;
use crate::services::jobs::{JobError, JobService};

/// Log pruning runs daily at 03:00 in cron mode.
const PRUNE_CRON: &str = "0 0 3 * * *";

const PRUNE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct Scheduler {
    jobs: Arc<JobService>,
    config: SchedulerConfig,
    running: Arc<RwLock<bool>>,
}

async fn run_scheduled(jobs: &JobService, kind: JobKind) {
    match jobs.run_now(kind, None).await {
        Ok(_) => {}
        Err(JobError::AlreadyRunning(_)) => {
            info!(job_name = %kind, "Skipping scheduled run, previous run still active");
        }
        Err(e) => warn!(job_name = %kind, error = %e, "Scheduled job could not start"),
    }
}

impl Scheduler {
    pub fn new(jobs: Arc<JobService>, config: SchedulerConfig) -> Self {
        Self {
            jobs,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting background scheduler");

        if let Some(cron_expr) = &self.config.cron_expression {
            self.run_with_cron(cron_expr).await
        } else {
            self.run_with_interval().await
        }
    }

    async fn run_with_cron(&self, cron_expr: &str) -> Result<()> {
        let mut sched = JobScheduler::new().await?;

        let jobs_for_sync = Arc::clone(&self.jobs);
        let running = Arc::clone(&self.running);
        let sync_job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let jobs = Arc::clone(&jobs_for_sync);
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                run_scheduled(&jobs, JobKind::GithubSync).await;
            })
        })?;

        let jobs_for_prune = Arc::clone(&self.jobs);
        let running = Arc::clone(&self.running);
        let prune_job = Job::new_async(PRUNE_CRON, move |_uuid, _lock| {
            let jobs = Arc::clone(&jobs_for_prune);
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                run_scheduled(&jobs, JobKind::PruneLogs).await;
            })
        })?;

        sched.add(sync_job).await?;
        sched.add(prune_job).await?;
        sched.start().await?;

        info!("GitHub sync scheduled with cron: {}", cron_expr);
        info!("Log pruning scheduled: {}", PRUNE_CRON);

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    async fn run_with_interval(&self) -> Result<()> {
        let interval_mins = self.config.github_sync_interval_minutes.max(1);

        info!(
            "Scheduler running: GitHub sync every {}m, log pruning daily",
            interval_mins
        );

        let mut sync_interval = interval(Duration::from_secs(u64::from(interval_mins) * 60));
        let mut prune_interval = interval(PRUNE_INTERVAL);

        loop {
            tokio::select! {
                _ = sync_interval.tick() => {
                    if !*self.running.read().await {
                        break;
                    }
                    run_scheduled(&self.jobs, JobKind::GithubSync).await;
                }
                _ = prune_interval.tick() => {
                    if !*self.running.read().await {
                        break;
                    }
                    run_scheduled(&self.jobs, JobKind::PruneLogs).await;
                }
            }
        }

        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
    }
}
