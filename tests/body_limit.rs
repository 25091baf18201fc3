use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use foodgram_api::{
    config::AppConfig,
    routes::{BODY_LIMIT_BYTES, create_app},
    state::AppState,
};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

// Nothing listens here; handlers that reach the database fail fast.
const UNREACHABLE_DB: &str = "postgres://foodgram@127.0.0.1:1/foodgram";

fn offline_state() -> anyhow::Result<AppState> {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(1))
        .connect_lazy(UNREACHABLE_DB)?;
    let config = AppConfig {
        database_url: UNREACHABLE_DB.into(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        token_ttl_hours: 1,
        media_root: std::env::temp_dir()
            .join("foodgram-test-media")
            .to_string_lossy()
            .into_owned(),
    };
    Ok(AppState::new(pool, config))
}

fn login_with_password_of(len: usize) -> Request<Body> {
    let body = serde_json::json!({
        "email": "cook@example.com",
        "password": "x".repeat(len),
    });
    Request::post("/api/auth/token/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn json_bodies_above_axum_default_are_accepted() -> anyhow::Result<()> {
    let app = create_app(offline_state()?);

    // Bigger than the 2 MiB extractor default, well under our limit.
    let response = app.oneshot(login_with_password_of(3 * 1024 * 1024)).await?;
    assert_ne!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    Ok(())
}

#[tokio::test]
async fn json_bodies_above_the_limit_are_rejected() -> anyhow::Result<()> {
    let app = create_app(offline_state()?);

    let response = app.oneshot(login_with_password_of(BODY_LIMIT_BYTES + 1)).await?;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    Ok(())
}
