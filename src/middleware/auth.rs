use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{HeaderValue, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use sea_orm::EntityTrait;
use uuid::Uuid;

use crate::{
    dto::auth::Claims,
    entity::{RevokedTokens, Users},
    error::{AppError, AppResult},
    state::AppState,
};

pub const ADMIN_ROLE: &str = "admin";
pub const USER_ROLE: &str = "user";

/// Authenticated caller, decoded from `Authorization: Token <jwt>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub role: String,
    pub jti: Uuid,
    pub expires_at: i64,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_author_or_admin(user: &AuthUser, author_id: i64) -> Result<(), AppError> {
    if user.user_id != author_id && !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Accepts both the `Token` and `Bearer` schemes.
pub fn extract_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    match scheme {
        "Token" | "Bearer" => Some(token),
        _ => None,
    }
}

pub fn decode_claims(secret: &str, token: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized)
}

pub async fn authenticate(state: &AppState, header: &HeaderValue) -> AppResult<AuthUser> {
    let raw = header.to_str().map_err(|_| AppError::Unauthorized)?;
    let token = extract_token(raw).ok_or(AppError::Unauthorized)?;
    let claims = decode_claims(&state.config.jwt_secret, token)?;

    let user_id = claims
        .sub
        .parse::<i64>()
        .map_err(|_| AppError::Unauthorized)?;
    let jti = Uuid::parse_str(&claims.jti).map_err(|_| AppError::Unauthorized)?;

    if RevokedTokens::find_by_id(jti).one(&state.orm).await?.is_some() {
        tracing::debug!(%jti, "rejected revoked token");
        return Err(AppError::Unauthorized);
    }

    // The role is read from the row, not the claims, so demotions apply at once.
    let Some(user) = Users::find_by_id(user_id).one(&state.orm).await? else {
        tracing::debug!(user_id, "rejected token of a deleted user");
        return Err(AppError::Unauthorized);
    };

    Ok(AuthUser {
        user_id,
        role: user.role,
        jti,
        expires_at: claims.exp as i64,
    })
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::Unauthorized)?;
        authenticate(&state, header).await
    }
}

/// `Option<AuthUser>`: no header means anonymous, a bad header is still 401.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let state = AppState::from_ref(state);
        match parts.headers.get(header::AUTHORIZATION) {
            Some(header) => authenticate(&state, header).await.map(Some),
            None => Ok(None),
        }
    }
}
