//! Almacen backend: customer orders, supplier purchases, dashboard statistics
//! and the catalogue, served as a JSON API over axum.

pub mod aggregation;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod orders;
pub mod owners;
pub mod routes;
pub mod scheduler;
pub mod supplier_orders;
pub mod sweep;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::sync::Arc;

use axum::http::Method;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::aggregation::AggregationEngine;
use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::db::DocumentStore;
use crate::orders::OrderManager;
use crate::owners::Owners;
use crate::supplier_orders::SupplierOrderManager;

// ─── Shared State ───────────────────────────────────────────────────────────

/// Every manager shares one store handle and one clock.
pub struct AppState {
    pub orders: OrderManager,
    pub supplier_orders: SupplierOrderManager,
    pub stats: AggregationEngine,
    pub catalog: Catalog,
    pub owners: Owners,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        AppState {
            orders: OrderManager::new(store.clone(), clock.clone()),
            supplier_orders: SupplierOrderManager::new(store.clone(), clock.clone()),
            stats: AggregationEngine::new(store.clone(), clock),
            catalog: Catalog::new(store.clone()),
            owners: Owners::new(store),
        }
    }
}

// ─── Router ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .merge(routes::api())
        .layer(cors)
        .with_state(state)
}

// ─── Serving ────────────────────────────────────────────────────────────────

pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl-C or SIGTERM. A handler that cannot be installed never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "could not install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "could not install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
