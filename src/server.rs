use crate::{
    config::Config,
    error::Result,
    gateway::{ObjectStoreGateway, S3Gateway},
    handlers,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tower_http::cors::CorsLayer;
use tracing::info;

pub struct AppState {
    pub config: Config,
    pub gateway: Arc<dyn ObjectStoreGateway>,
}

pub async fn run(config: Config) -> Result<()> {
    let gateway = Arc::new(S3Gateway::new(&config.store)?);

    let state = Arc::new(AppState {
        config: config.clone(),
        gateway,
    });

    let app = build_app(state);

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid HOST: {}", e))?;
    let addr = SocketAddr::new(host, config.server.port);
    info!("bucketview listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/buckets", get(handlers::browse::list_buckets))
        .route("/api/browse/:bucket", get(handlers::browse::browse_bucket))
        .route("/api/create-folder", post(handlers::folder::create))
        .route("/api/list-folder-files", post(handlers::folder::list_files))
        .route("/api/delete-mixed", post(handlers::bulk::delete_mixed))
        .route("/api/download-zip", post(handlers::download::download_zip))
        .route("/api/download-mixed", post(handlers::download::download_mixed))
        .route("/api/download-folder", post(handlers::download::download_folder))
        .route("/api/presigned", post(handlers::presign::issue))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        },
    }
}
