//! synapse binary: serve the linguistic-steering API
//!
//! Run with: OPENROUTER_API_KEY=... synapse

use std::sync::Arc;

use synapse::artifacts::ArtifactStore;
use synapse::config::Config;
use synapse::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "synapse=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    if config.api_key.is_none() {
        tracing::warn!("OPENROUTER_API_KEY not set; execution and roster calls will fail");
    }

    let store = Arc::new(ArtifactStore::open(&config.artifact_dir).await?);
    tracing::info!(dir = %config.artifact_dir.display(), "artifact store ready");

    let port = config.port;
    let model = config.model.clone();
    let state = Arc::new(AppState::new(config, store));
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, model, "synapse listening");

    axum::serve(listener, app).await?;
    Ok(())
}
