mod config;
mod demo;
mod router;
mod ws;

use clap::Parser;
use config::ServerConfig;
use router::{router, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log))
        .init();
    tracing::info!(bind = %config.bind, demo_app_id = %config.demo_app_id, "starting compute-control core");

    let manager = demo::bootstrap(&config.demo_app_id);
    let app = router(AppState { manager });

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(bind = %config.bind, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
