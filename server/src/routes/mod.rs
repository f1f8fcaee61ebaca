//! HTTP surface. Each module owns the full paths of one resource family;
//! families sharing a prefix are merged rather than nested.

mod orders;
mod owners;
mod products;
mod stats;
mod stores;
mod suppliers;

use std::sync::Arc;

use axum::Router;

use crate::AppState;

pub fn api() -> Router<Arc<AppState>> {
    Router::new()
        .merge(orders::routes())
        .merge(suppliers::routes())
        .merge(products::routes())
        .merge(stores::routes())
        .merge(owners::routes())
        .merge(stats::routes())
}
