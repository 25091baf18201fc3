use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, TimeZone, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, sea_query::OnConflict,
};
use uuid::Uuid;

use crate::{
    audit,
    config::AppConfig,
    dto::auth::{Claims, LoginRequest, SetPasswordRequest, TokenResponse},
    entity::{
        revoked_tokens::{ActiveModel as RevokedActive, Column as RevokedCol, Entity as RevokedTokens},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn check_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err("password cannot be entirely numeric".into());
    }
    Ok(())
}

/// Sign a token for `user`, returning the encoded JWT.
pub fn issue_token(config: &AppConfig, user: &UserModel) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(config.token_ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        jti: Uuid::new_v4().to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub async fn login(state: &AppState, payload: LoginRequest) -> AppResult<ApiResponse<TokenResponse>> {
    let LoginRequest { email, password } = payload;
    let user = Users::find()
        .filter(UserCol::Email.eq(email.trim().to_lowercase()))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid email or password".into()))?;

    if !verify_password(&password, &user.password_hash)? {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    }

    let token = issue_token(&state.config, &user)?;

    audit::record(
        &state.pool,
        user.id,
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        TokenResponse { auth_token: token },
        Some(Meta::empty()),
    ))
}

/// Revoke the caller's current token and drop revocations that have expired.
pub async fn logout(state: &AppState, user: &AuthUser) -> AppResult<()> {
    let expires_at = Utc
        .timestamp_opt(user.expires_at, 0)
        .single()
        .unwrap_or_else(Utc::now);

    RevokedTokens::insert(RevokedActive {
        jti: Set(user.jti),
        expires_at: Set(expires_at.fixed_offset()),
    })
    .on_conflict(OnConflict::column(RevokedCol::Jti).do_nothing().to_owned())
    .do_nothing()
    .exec(&state.orm)
    .await?;

    RevokedTokens::delete_many()
        .filter(RevokedCol::ExpiresAt.lt(Utc::now()))
        .exec(&state.orm)
        .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "user_logout",
        "users",
        serde_json::json!({ "jti": user.jti }),
    )
    .await;
    Ok(())
}

pub async fn set_password(
    state: &AppState,
    user: &AuthUser,
    payload: SetPasswordRequest,
) -> AppResult<()> {
    let existing = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if !verify_password(&payload.current_password, &existing.password_hash)? {
        return Err(AppError::BadRequest("Current password is incorrect".into()));
    }
    check_password_strength(&payload.new_password).map_err(AppError::BadRequest)?;

    let mut active: UserActive = existing.into();
    active.password_hash = Set(hash_password(&payload.new_password)?);
    active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "password_change",
        "users",
        serde_json::json!({ "user_id": user.user_id }),
    )
    .await;
    Ok(())
}
