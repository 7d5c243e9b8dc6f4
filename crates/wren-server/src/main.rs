use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use wren_api::{AppStateInner, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wren=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("WREN_DB_PATH").unwrap_or_else(|_| "wren.db".into());
    let host = std::env::var("WREN_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("WREN_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = wren_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let state = Arc::new(AppStateInner {
        db,
        sessions: SessionStore::new(),
    });

    let app = wren_api::router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Wren listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
