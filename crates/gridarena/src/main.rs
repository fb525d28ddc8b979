//! Gridarena server binary.
//!
//! Binds to `GRIDARENA_ADDR` (default `127.0.0.1:8080`) and serves rooms
//! until terminated. Log verbosity follows `RUST_LOG`.

use gridarena::{GridarenaError, GridarenaServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), GridarenaError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("GRIDARENA_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    let server = GridarenaServer::builder()
        .bind(&addr)
        .precreate_room("room-1")
        .build()
        .await?;

    tracing::info!(%addr, "gridarena listening");
    server.run().await
}
