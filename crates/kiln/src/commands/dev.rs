//! Development server command: the default pipeline.

use std::sync::Arc;

use anyhow::{Context, Result};
use kiln_build::{Pipeline, Task, TaskRunner};
use kiln_server::{BrowserNotifier, Coordinator, DevServer, ReloadHub};

use crate::config::ConfigFile;

/// Clean, start watching, serve, and run the initial build.
pub async fn run(file: &ConfigFile, port: Option<u16>, open: Option<bool>) -> Result<()> {
    let config = file.pipeline_config();
    let server_config = file.server_config(port, open);

    let hub = ReloadHub::new();
    let pipeline = Arc::new(
        Pipeline::new(config.clone()).with_notifier(Arc::new(BrowserNotifier::new(hub.clone()))),
    );

    let clean = Arc::clone(&pipeline);
    tokio::task::spawn_blocking(move || clean.run(Task::Clean)).await??;

    let root = std::env::current_dir().context("Failed to resolve working directory")?;
    let _watch = Coordinator::new(pipeline.clone(), hub.clone(), &config, &root)?.start()?;

    // Producers are independent here: one failing does not skip the rest
    let initial = Arc::clone(&pipeline);
    tokio::task::spawn_blocking(move || {
        for task in Task::producers(initial.config().webp) {
            if let Err(e) = initial.run(task) {
                initial.notifier().notify(task.name(), &e.to_string());
            }
        }
    });

    DevServer::new(server_config, hub).start().await?;

    Ok(())
}
