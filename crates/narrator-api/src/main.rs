//! Narrator API server entry point.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use narrator_api::config::AppConfig;
use narrator_api::http_transport::HttpTransport;
use narrator_api::state::AppState;
use narrator_core::clock::SystemClock;
use narrator_core::documents::DocumentStore;
use narrator_core::rng::SystemRng;
use narrator_session::application::command_handlers::resume_ballot_timers;
use narrator_session::application::services::SessionServices;
use narrator_store::{MemoryDocumentStore, PgDocumentStore, ProfileStore, SnapshotFile, WriteBehind};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Narrator API server");

    let config = AppConfig::from_env()?;

    // Document store: Postgres when configured, otherwise process memory.
    let backend: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(5))
                .connect_lazy(url)?;
            let store = PgDocumentStore::new(pool);
            if let Err(err) = store.ensure_schema().await {
                tracing::warn!(error = %err, "document store unreachable at startup; serving cached and snapshot profiles");
            }
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; profiles live in memory only");
            Arc::new(MemoryDocumentStore::new())
        }
    };
    let (writes, flusher) = WriteBehind::spawn(backend.clone());
    let profiles = Arc::new(ProfileStore::new(backend, writes));

    let snapshot = SnapshotFile::new(config.snapshot_path.clone());
    let directory = SessionServices::restore(&snapshot, &profiles).await;

    let transport = Arc::new(HttpTransport::new(
        &config.platform_api_url,
        &config.bot_token,
    )?);
    let services = Arc::new(
        SessionServices::new(
            directory,
            transport,
            profiles.clone(),
            Arc::new(SystemClock),
            Box::new(SystemRng::from_os()),
            config.game.clone(),
        )
        .with_snapshot(snapshot),
    );
    resume_ballot_timers(&services).await;

    let app = narrator_api::build_router(AppState::new(services));

    tracing::info!("Listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // Drain queued profile writes before exiting.
    profiles.flush().await;
    flusher.abort();

    Ok(())
}
