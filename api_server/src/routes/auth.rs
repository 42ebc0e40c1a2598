use axum::extract::State;
use axum::Json;
use core_logic::auth::{self, LoginRequest, TokenResponse, UserProfile};
use core_logic::ErrorResponse;
use tracing::info;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access token and profile", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult<Json<TokenResponse>> {
    info!("POST /auth/login - {}", req.email);
    let token = auth::login(
        &state.pool,
        &req,
        &state.settings.secret_key,
        state.settings.jwt_expiration_hours,
    )
    .await?;
    Ok(Json(token))
}

#[utoipa::path(
    get,
    path = "/auth/profile",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn profile(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<UserProfile>> {
    Ok(Json(auth::profile(&state.pool, user.user_type, user.id).await?))
}
