use std::sync::Arc;

use almacen_server::clock::{Clock, SystemClock};
use almacen_server::config::Config;
use almacen_server::db::{DocumentStore, MemoryStore, PostgresStore};
use almacen_server::scheduler::Scheduler;
use almacen_server::sweep::OverdueSweep;
use almacen_server::{serve, shutdown_signal, AppState};
use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();

    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => Arc::new(
            PostgresStore::connect(url, config.pool_size)
                .await
                .context("failed to connect to Postgres")?,
        ),
        None => {
            warn!("DATABASE_URL not set, documents are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };
    info!(backend = store.backend_tag(), "store ready");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = Arc::new(AppState::new(store, clock));

    let (stop_tx, stop_rx) = watch::channel(false);
    let tasks = if config.no_sweep {
        info!("overdue sweep disabled");
        Vec::new()
    } else {
        Scheduler::daily_at(config.sweep_at)
            .register(Arc::new(OverdueSweep::new(state.orders.clone())))
            .spawn(stop_rx)
    };

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    serve(listener, state, shutdown_signal())
        .await
        .context("server failed")?;

    // Receivers may already be gone if no task was spawned.
    let _ = stop_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "scheduled task ended abnormally");
        }
    }
    info!("shut down");
    Ok(())
}
