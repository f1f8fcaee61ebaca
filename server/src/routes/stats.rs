use std::sync::Arc;

use almacen_common::stats::{CategoryRank, ProductRank, ProfitSeries, ProfitSummary, StockSummary};
use almacen_common::window::Period;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::aggregation::{RangeParams, RankParams, Series, YearsParams, DEFAULT_YEARS};
use crate::error::{AppError, Params};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/proveedor/totalProfit", get(profit_range_handler))
        .route("/proveedor/totalProfitDay", get(profit_day_handler))
        .route("/proveedor/totalProfitWeek", get(profit_week_handler))
        .route("/proveedor/totalProfitMonth", get(profit_month_handler))
        .route("/proveedor/totalProfitYear", get(profit_year_handler))
        .route("/proveedor/totalProfitYearPuntos", get(years_series_handler))
        .route("/proveedor/totalProfitMonthPuntos", get(months_series_handler))
        .route("/proveedor/totalProfitDayPuntos", get(days_series_handler))
        .route("/proveedor/totalProfitWeekPuntos", get(weeks_series_handler))
        .route("/producto/categorias", get(categories_handler))
        .route("/producto/masvendidos", get(best_sellers_handler))
        .route("/producto/resumenstock", get(stock_summary_handler))
}

// ─── Profit ─────────────────────────────────────────────────────────────────

async fn profit_range_handler(
    State(state): State<Arc<AppState>>,
    Params(params): Params<RangeParams>,
) -> Result<Json<ProfitSummary>, AppError> {
    Ok(Json(state.stats.profit_in_range(params).await?))
}

async fn profit_day_handler(State(state): State<Arc<AppState>>) -> Result<Json<ProfitSummary>, AppError> {
    Ok(Json(state.stats.profit_in_period(Period::Day).await?))
}

async fn profit_week_handler(State(state): State<Arc<AppState>>) -> Result<Json<ProfitSummary>, AppError> {
    Ok(Json(state.stats.profit_in_period(Period::Week).await?))
}

async fn profit_month_handler(State(state): State<Arc<AppState>>) -> Result<Json<ProfitSummary>, AppError> {
    Ok(Json(state.stats.profit_in_period(Period::Month).await?))
}

async fn profit_year_handler(State(state): State<Arc<AppState>>) -> Result<Json<ProfitSummary>, AppError> {
    Ok(Json(state.stats.profit_in_period(Period::Year).await?))
}

// ─── Series ─────────────────────────────────────────────────────────────────

async fn years_series_handler(
    State(state): State<Arc<AppState>>,
    Params(params): Params<YearsParams>,
) -> Result<Json<ProfitSeries>, AppError> {
    let years = params.anios.unwrap_or(DEFAULT_YEARS);
    Ok(Json(state.stats.profit_series(Series::Years(years)).await?))
}

async fn months_series_handler(State(state): State<Arc<AppState>>) -> Result<Json<ProfitSeries>, AppError> {
    Ok(Json(state.stats.profit_series(Series::MonthsOfYear).await?))
}

async fn days_series_handler(State(state): State<Arc<AppState>>) -> Result<Json<ProfitSeries>, AppError> {
    Ok(Json(state.stats.profit_series(Series::DaysOfMonth).await?))
}

async fn weeks_series_handler(State(state): State<Arc<AppState>>) -> Result<Json<ProfitSeries>, AppError> {
    Ok(Json(state.stats.profit_series(Series::WeeksOfQuarter).await?))
}

// ─── Rankings ───────────────────────────────────────────────────────────────

async fn categories_handler(
    State(state): State<Arc<AppState>>,
    Params(params): Params<RankParams>,
) -> Result<Json<Vec<CategoryRank>>, AppError> {
    Ok(Json(state.stats.rank_categories(params).await?))
}

async fn best_sellers_handler(
    State(state): State<Arc<AppState>>,
    Params(params): Params<RankParams>,
) -> Result<Json<Vec<ProductRank>>, AppError> {
    Ok(Json(state.stats.rank_products(params).await?))
}

async fn stock_summary_handler(State(state): State<Arc<AppState>>) -> Result<Json<StockSummary>, AppError> {
    Ok(Json(state.stats.stock_summary().await?))
}
