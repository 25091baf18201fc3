use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

use crate::{
    dto::auth::{LoginRequest, TokenResponse},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/token/login", post(login))
        .route("/token/logout", post(logout))
}

#[utoipa::path(
    post,
    path = "/api/auth/token/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Issue an auth token", body = ApiResponse<TokenResponse>),
        (status = 400, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<TokenResponse>>> {
    let resp = auth_service::login(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/token/logout",
    responses(
        (status = 204, description = "Token revoked"),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(State(state): State<AppState>, user: AuthUser) -> AppResult<StatusCode> {
    auth_service::logout(&state, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}
