//! campus-edge server entry point.
//!
//! Boots the caching edge in front of the web application. The cache database
//! is opened and HTTP served right away; installing the current store runs in
//! the background and is retried until upstream answers. Until then requests
//! are relayed. Logs go to stderr as JSON.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use campus_edge_client::{Backoff, CacheController, ControllerConfig, FetchClient, FetchConfig};
use campus_edge_core::{AppConfig, CacheDb};

mod error;
mod handler;
mod middleware;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        listen = %config.listen_addr,
        upstream = %config.upstream_url,
        store = %config.store_name(),
        "starting campus-edge"
    );

    let db = CacheDb::open(&config.db_path).await?;
    let upstream = Arc::new(FetchClient::new(FetchConfig::from(&config), config.upstream()?)?);
    let controller = Arc::new(CacheController::new(
        ControllerConfig::try_from(&config)?,
        Arc::new(db),
        upstream.clone(),
    ));

    tokio::spawn({
        let controller = Arc::clone(&controller);
        let backoff = Backoff::from(&config);
        async move { controller.boot(backoff).await }
    });

    let state = handler::AppState::new(controller, upstream, config.origin()?, config.max_bytes);
    let listener = TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, handler::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
