use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use superchat_api::{AppState, AppStateInner};
use superchat_db::{Database, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "superchat=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("SUPERCHAT_DB_PATH").unwrap_or_else(|_| "superchat.db".into());
    let host = std::env::var("SUPERCHAT_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("SUPERCHAT_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let store: Arc<dyn Store> = Arc::new(Database::open(&PathBuf::from(&db_path))?);
    info!("Database opened at {}", db_path);

    let state: AppState = Arc::new(AppStateInner::new(store));

    let app = superchat_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Superchat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
