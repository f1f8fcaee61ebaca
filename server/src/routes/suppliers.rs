use std::sync::Arc;

use almacen_common::supplier::Supplier;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::catalog::{Created, SupplierInput};
use crate::error::{AppError, Body};
use crate::supplier_orders::{SupplierOrderInput, SupplierOrderView, SupplierStatusChange};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/proveedor/crearproveedor", post(create_supplier_handler))
        .route("/proveedor/proveedores", get(list_suppliers_handler))
        .route("/proveedor/crearordenproveedor", post(create_order_handler))
        .route("/proveedor/ordenesproveedor", get(list_orders_handler))
        .route("/proveedor/marcarentregado/{id}", put(mark_delivered_handler))
        .route("/proveedor/ordenesproveedor/{id}/cancelar", put(cancel_handler))
        .route("/proveedor/ordenesproveedor/{id}/devolver", put(give_back_handler))
}

// ─── Suppliers ──────────────────────────────────────────────────────────────

async fn create_supplier_handler(
    State(state): State<Arc<AppState>>,
    Body(input): Body<SupplierInput>,
) -> Result<(StatusCode, Json<Created>), AppError> {
    let created = state.catalog.create_supplier(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_suppliers_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Supplier>>, AppError> {
    Ok(Json(state.catalog.list_suppliers().await?))
}

// ─── Supplier Orders ────────────────────────────────────────────────────────

async fn create_order_handler(
    State(state): State<Arc<AppState>>,
    Body(input): Body<SupplierOrderInput>,
) -> Result<(StatusCode, Json<SupplierOrderView>), AppError> {
    let order = state.supplier_orders.create(input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_orders_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SupplierOrderView>>, AppError> {
    Ok(Json(state.supplier_orders.list().await?))
}

async fn mark_delivered_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SupplierStatusChange>, AppError> {
    Ok(Json(state.supplier_orders.mark_delivered(&id).await?))
}

async fn cancel_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SupplierStatusChange>, AppError> {
    Ok(Json(state.supplier_orders.cancel(&id).await?))
}

async fn give_back_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SupplierStatusChange>, AppError> {
    Ok(Json(state.supplier_orders.give_back(&id).await?))
}
