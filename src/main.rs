use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use mediscribe::config::{self, AppConfig};
use mediscribe::server::{self, AppState};
use mediscribe::store::RecordStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let app_config = AppConfig::from_env();
    if let Some(parent) = app_config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::create_dir_all(&app_config.upload_dir)?;

    let store = Arc::new(RecordStore::open(&app_config.db_path)?);
    let bind_addr = app_config.bind_addr.clone();
    let state = Arc::new(AppState {
        store,
        config: app_config,
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening");
    axum::serve(listener, server::router(state)).await?;

    Ok(())
}
