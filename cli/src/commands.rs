use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use app::prelude::{rebase_pairs, register_pairs, SyncTask, TaskOptions, TaskRegistry};
use utils::app_config::AppConfig;
use utils::error::{Error, Result};

fn build_registry(config: &AppConfig, base_dir: &Path) -> (Arc<TaskRegistry>, Vec<Arc<SyncTask>>) {
    let registry = Arc::new(TaskRegistry::new());
    let tasks = register_pairs(
        &registry,
        &rebase_pairs(&config.sync_pairs, base_dir),
        Duration::from_secs(config.sync_interval),
        &TaskOptions::from(config),
    );

    if tasks.is_empty() {
        log::warn!("No valid sync pairs configured");
    }
    (registry, tasks)
}

pub async fn run_cmd(base_dir: &Path) -> Result<()> {
    let config = AppConfig::fetch()?;
    log::info!(
        "Starting dirsync with {} sync pairs, interval {}s",
        config.sync_pairs.len(),
        config.sync_interval
    );

    let (registry, _) = build_registry(&config, base_dir);
    let started = registry.start_all();
    log::info!("Started {} sync tasks", started);

    server::serve(registry, &config.port).await
}

pub async fn once_cmd(base_dir: &Path) -> Result<()> {
    let config = AppConfig::fetch()?;
    let (_, tasks) = build_registry(&config, base_dir);

    if tasks.is_empty() {
        println!("No sync pairs configured");
        return Ok(());
    }

    let mut failed = 0;
    for task in &tasks {
        match task.sync_now().await {
            Ok(outcome) => println!("OK     {}: {}", task.id(), outcome),
            Err(e) => {
                failed += 1;
                println!("FAILED {}: {}", task.id(), e);
            }
        }
    }

    if failed > 0 {
        return Err(Error::new(&format!(
            "{} of {} sync pairs failed",
            failed,
            tasks.len()
        )));
    }

    println!("Sync completed successfully");
    Ok(())
}
