//! Run named tasks.

use anyhow::Result;
use kiln_build::{Pipeline, Task};

use crate::config::ConfigFile;

/// Run `tasks` in series. The first failure halts the run.
pub async fn run(file: &ConfigFile, tasks: Vec<Task>) -> Result<()> {
    let pipeline = Pipeline::new(file.pipeline_config());

    let reports = tokio::task::spawn_blocking(move || pipeline.run_series(&tasks)).await??;

    let total_ms: u64 = reports.iter().map(|r| r.duration_ms).sum();
    tracing::info!("Ran {} task(s) in {}ms", reports.len(), total_ms);

    Ok(())
}
