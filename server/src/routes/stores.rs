use std::sync::Arc;

use almacen_common::storefront::{Storefront, StorefrontPatch};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::catalog::{Created, StoreRow, StoreUpdated};
use crate::error::{AppError, Body};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tienda/creartienda", post(create_handler))
        .route("/tienda/tiendas", get(list_handler))
        .route("/tienda/tienda/{store_id}", get(get_handler))
        .route("/tienda/actualizartienda/{store_id}", put(update_handler))
}

async fn create_handler(
    State(state): State<Arc<AppState>>,
    Body(store): Body<Storefront>,
) -> Result<(StatusCode, Json<Created>), AppError> {
    let created = state.catalog.create_store(store).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<StoreRow>>, AppError> {
    Ok(Json(state.catalog.list_stores().await?))
}

async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path(store_id): Path<String>,
) -> Result<Json<Storefront>, AppError> {
    Ok(Json(state.catalog.get_store(&store_id).await?))
}

async fn update_handler(
    State(state): State<Arc<AppState>>,
    Path(store_id): Path<String>,
    Body(patch): Body<StorefrontPatch>,
) -> Result<Json<StoreUpdated>, AppError> {
    Ok(Json(state.catalog.update_store(&store_id, patch).await?))
}
