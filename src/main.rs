use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use vitalwatch::api::{create_query_router, create_ws_router, QueryAppState, WsAppState};
use vitalwatch::broadcast::{BroadcastSink, Broadcaster};
use vitalwatch::clock::SystemClock;
use vitalwatch::config::{load_config, VitalWatchConfig};
use vitalwatch::nats::NatsSink;
use vitalwatch::roster::RosterSource;
use vitalwatch::scheduler::Scheduler;
use vitalwatch::store::{DurableStore, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vitalwatch=info".into()),
        )
        .init();

    info!("VitalWatch starting...");

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!(path = %path, "Loading configuration");
            load_config(&path)?
        }
        None => {
            info!("No config file given, using defaults");
            VitalWatchConfig::default()
        }
    }
    .with_env_overrides();

    let sqlite = Arc::new(
        SqliteStore::open(&config.storage.database_path).context("Failed to open vitals database")?,
    );
    info!(path = %config.storage.database_path.display(), "Database ready");

    let cancel = CancellationToken::new();

    // External snapshot sinks
    let mut sinks: Vec<Arc<dyn BroadcastSink>> = Vec::new();
    if config.nats.enabled {
        match NatsSink::connect(&config.nats).await {
            Ok(sink) => sinks.push(Arc::new(sink)),
            Err(e) => warn!(error = %e, "NATS unavailable, snapshots will only reach WebSocket clients"),
        }
    }

    let (broadcaster, delivery_handle) = Broadcaster::spawn(&config.broadcast, sinks, cancel.clone());
    let broadcaster = Arc::new(broadcaster);

    let roster: Arc<dyn RosterSource> = sqlite.clone();
    let store: Arc<dyn DurableStore> = sqlite.clone();

    let scheduler = Scheduler::new(
        &config.scheduler,
        Arc::clone(&roster),
        Arc::clone(&store),
        Arc::clone(&broadcaster),
        Arc::new(SystemClock),
    )?;
    let states = scheduler.states();

    let api_handle = if config.api.enabled {
        let query_state = Arc::new(QueryAppState {
            states,
            roster,
            store,
            recent_alerts_limit: config.api.recent_alerts_limit,
        });
        let ws_state = Arc::new(WsAppState {
            broadcaster: Arc::clone(&broadcaster),
        });

        let app = create_query_router(query_state)
            .merge(create_ws_router(ws_state))
            .layer(CorsLayer::permissive());

        let listener = tokio::net::TcpListener::bind(&config.api.bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.api.bind_addr))?;
        info!(addr = %config.api.bind_addr, "Status API listening");

        let shutdown = cancel.clone();
        Some(tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "Status API server failed");
            }
        }))
    } else {
        None
    };

    let scheduler_handle = tokio::spawn(scheduler.run(cancel.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    cancel.cancel();

    scheduler_handle.await.context("Scheduler task panicked")?;
    delivery_handle.await.context("Broadcast task panicked")?;
    if let Some(handle) = api_handle {
        // Open WebSocket connections can hold graceful shutdown indefinitely
        if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
            warn!("Status API did not stop within 5s");
        }
    }

    info!("VitalWatch stopped");
    Ok(())
}
