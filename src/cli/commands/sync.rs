//! One-shot GitHub sync command handler

use crate::config::Config;
use crate::domain::{JobKind, JobStatus};
use crate::state::SharedState;

pub async fn cmd_sync(config: Config) -> anyhow::Result<()> {
    let state = SharedState::new(config).await?;

    println!("Syncing GitHub releases...");
    let run = state.jobs.run_now(JobKind::GithubSync, None).await?;

    match run.status {
        JobStatus::Completed => {
            println!("{}", run.summary.as_deref().unwrap_or("Sync complete"));
            Ok(())
        }
        _ => anyhow::bail!(
            "Sync failed: {}",
            run.error.as_deref().unwrap_or("unknown error")
        ),
    }
}
