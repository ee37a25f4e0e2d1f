//! Preview server command.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use kiln_server::DevServerConfig;
use tower_http::services::ServeDir;

/// Serve the built output as-is, without watching or live reload.
pub async fn run(config: DevServerConfig) -> Result<()> {
    if !config.root.is_dir() {
        anyhow::bail!(
            "Directory not found: {}. Run 'kiln build' first.",
            config.root.display()
        );
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid address {}:{}", config.host, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let url = format!("http://{}", listener.local_addr()?);
    tracing::info!("Previewing {} at {}", config.root.display(), url);

    if config.open {
        if let Err(e) = open::that(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    let app = Router::new().fallback_service(ServeDir::new(&config.root));
    axum::serve(listener, app)
        .await
        .context("Preview server stopped")?;

    Ok(())
}
