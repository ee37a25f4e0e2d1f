//! One-shot build command.

use std::path::PathBuf;

use anyhow::Result;
use kiln_build::Pipeline;

use crate::config::ConfigFile;

/// Run the build command.
pub async fn run(file: &ConfigFile, output: Option<PathBuf>, minify: Option<bool>) -> Result<()> {
    tracing::info!("Building site...");

    let mut config = file.pipeline_config();
    if let Some(output) = output {
        config.output_dir = output;
    }
    if let Some(minify) = minify {
        config.minify = minify;
    }

    let pipeline = Pipeline::new(config);
    let result = tokio::task::spawn_blocking(move || pipeline.build()).await??;

    let failed: usize = result.reports.iter().map(|r| r.failed).sum();
    if failed > 0 {
        tracing::warn!("{} stylesheet(s) failed to compile", failed);
    }

    tracing::info!(
        "Built {} tasks in {}ms",
        result.reports.len(),
        result.duration_ms
    );

    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}
