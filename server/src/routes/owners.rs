use std::sync::Arc;

use almacen_common::owner::OwnerProfile;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::error::{AppError, Body};
use crate::owners::{Credentials, Login, Registered, Registration};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dueno/creardueno", post(register_handler))
        .route("/dueno/login", post(login_handler))
        .route("/dueno/perfil", get(profile_handler))
}

/// Token of an `Authorization: Bearer <token>` header.
fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn register_handler(
    State(state): State<Arc<AppState>>,
    Body(input): Body<Registration>,
) -> Result<(StatusCode, Json<Registered>), AppError> {
    let registered = state.owners.register(input).await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

async fn login_handler(
    State(state): State<Arc<AppState>>,
    Body(credentials): Body<Credentials>,
) -> Result<(StatusCode, Json<Login>), AppError> {
    let login = state.owners.login(credentials).await?;
    Ok((StatusCode::CREATED, Json(login)))
}

async fn profile_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<OwnerProfile>, AppError> {
    Ok(Json(state.owners.profile(bearer(&headers)).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_needs_the_scheme_and_a_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer(&headers), Some("abc123"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer(&headers), None);
    }
}
