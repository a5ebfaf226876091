//! Log pruning command handler

use crate::config::Config;
use crate::db::Store;

pub async fn cmd_prune_logs(config: &Config, days: Option<u32>) -> anyhow::Result<()> {
    let days = days.unwrap_or(config.scheduler.log_retention_days);
    let store = Store::new(&config.general.database_path).await?;

    let pruned = store.prune_logs(i64::from(days)).await?;
    println!("Pruned {pruned} log entries older than {days} days.");

    Ok(())
}
