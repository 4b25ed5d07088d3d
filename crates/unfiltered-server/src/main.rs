use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use unfiltered_server::authority::StaticMembership;
use unfiltered_server::config::ServerConfig;
use unfiltered_server::store::InMemoryStore;
use unfiltered_server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,unfiltered_server=debug")),
        )
        .init();

    info!("Starting Unfiltered server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration (refuses to start without ID_DERIVE_SECRET)
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env()?;
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let store = Arc::new(InMemoryStore::new());
    let membership = Arc::new(StaticMembership::new());
    let stats_interval = config.stats_interval;
    let instance = config.instance_name.clone();

    let state = Arc::new(AppState::new(
        config,
        store.clone(),
        store,
        membership,
    )?);
    info!(instance = %instance, "Realtime core ready");

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic room statistics
    let stats = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(stats_interval);
        loop {
            interval.tick().await;
            info!(
                rooms = stats.rooms.room_count(),
                connections = stats.rooms.connection_count(),
                send_gates = stats.messages.open_gates(),
                "Room statistics"
            );
        }
    });

    // -----------------------------------------------------------------------
    // 5. Wait for shutdown
    // -----------------------------------------------------------------------
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down");

    Ok(())
}
