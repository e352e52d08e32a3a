use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use signup_api::storage::UploadDir;
use signup_api::{AppState, AppStateInner};
use signup_db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "signup=debug,signup_api=debug,signup_db=info,tower_http=debug".into()
            }),
        )
        .init();

    // Config
    let db_path: PathBuf = std::env::var("SIGNUP_DB_PATH")
        .unwrap_or_else(|_| "users.db".into())
        .into();
    let upload_dir: PathBuf = std::env::var("SIGNUP_UPLOAD_DIR")
        .unwrap_or_else(|_| "uploads".into())
        .into();
    let host = std::env::var("SIGNUP_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("SIGNUP_PORT")
        .unwrap_or_else(|_| "5000".into())
        .parse()?;

    // Init database and schema before accepting requests
    let db = Database::open(&db_path)?;
    db.migrate()?;

    let uploads = UploadDir::new(upload_dir).await?;

    let state: AppState = Arc::new(AppStateInner { db, uploads });

    let app = signup_api::routes(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Signup server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Signup server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
