use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::error::{AppError, Body, Params};
use crate::orders::{ListParams, OrderInput, OrderPage, OrderReceipt, OrderRow, StatusChange};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orden/crearorden", post(create_handler))
        .route("/orden/ordenes", get(list_handler))
        .route("/orden/ordenesall", get(list_all_handler))
        .route("/orden/ordenes/{id}/confirmar", put(confirm_handler))
        .route("/orden/ordenes/{id}/devolver", put(give_back_handler))
}

async fn create_handler(
    State(state): State<Arc<AppState>>,
    Body(input): Body<OrderInput>,
) -> Result<(StatusCode, Json<OrderReceipt>), AppError> {
    let receipt = state.orders.create(input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn list_handler(
    State(state): State<Arc<AppState>>,
    Params(params): Params<ListParams>,
) -> Result<Json<OrderPage>, AppError> {
    Ok(Json(state.orders.list(params).await?))
}

async fn list_all_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<OrderRow>>, AppError> {
    Ok(Json(state.orders.list_all().await?))
}

async fn confirm_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusChange>, AppError> {
    Ok(Json(state.orders.confirm(&id).await?))
}

async fn give_back_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusChange>, AppError> {
    Ok(Json(state.orders.give_back(&id).await?))
}
