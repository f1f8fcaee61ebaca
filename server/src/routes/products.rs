use std::sync::Arc;

use almacen_common::product::ProductPatch;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::catalog::{Created, ProductInput, ProductListParams, ProductPage, ProductUpdated};
use crate::error::{AppError, Body, Params};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/producto/crearproducto", post(create_handler))
        .route("/producto/productos", get(list_handler))
        .route("/producto/actualizarproducto/{product_id}", put(update_handler))
}

async fn create_handler(
    State(state): State<Arc<AppState>>,
    Body(input): Body<ProductInput>,
) -> Result<(StatusCode, Json<Created>), AppError> {
    let created = state.catalog.create_product(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_handler(
    State(state): State<Arc<AppState>>,
    Params(params): Params<ProductListParams>,
) -> Result<Json<ProductPage>, AppError> {
    Ok(Json(state.catalog.list_products(params).await?))
}

async fn update_handler(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
    Body(patch): Body<ProductPatch>,
) -> Result<Json<ProductUpdated>, AppError> {
    Ok(Json(state.catalog.update_product(&product_id, patch).await?))
}
