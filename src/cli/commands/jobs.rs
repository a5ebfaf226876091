//! Job history command handler

use crate::config::Config;
use crate::db::Store;

pub async fn cmd_jobs(config: &Config, limit: u64) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let runs = store.job_repo().list(None, limit.clamp(1, 200)).await?;

    if runs.is_empty() {
        println!("No jobs have run yet.");
        return Ok(());
    }

    println!("{:<6} {:<12} {:<10} {:<26} Result", "ID", "Job", "Status", "Created");
    println!("{:-<80}", "");

    for run in runs {
        let result = run
            .error
            .as_deref()
            .or(run.summary.as_deref())
            .unwrap_or("-");
        println!(
            "{:<6} {:<12} {:<10} {:<26} {}",
            run.id, run.kind, run.status, run.created_at, result
        );
    }

    Ok(())
}
