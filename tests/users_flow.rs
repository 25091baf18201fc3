use axum::http::{HeaderValue, StatusCode};
use foodgram_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    dto::{
        auth::{LoginRequest, SetPasswordRequest},
        users::{RegisterRequest, UpdateUserRequest},
    },
    entity::{recipes::ActiveModel as RecipeActive, users::ActiveModel as UserActive},
    error::AppError,
    middleware::auth::{AuthUser, authenticate},
    routes::params::{Pagination, SubscriptionQuery},
    services::{
        auth_service,
        relation_service::{self, ToggleAction, ToggleOutcome},
        user_service,
    },
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};

// Register -> login -> subscribe -> logout revokes the token.
#[tokio::test]
async fn account_subscription_and_logout_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let anna = register(&state, "anna", "Anna").await?;
    let boris = register(&state, "boris", "Boris").await?;

    let taken = user_service::register_user(&state, register_request("anna", "Anna")).await;
    match taken {
        Err(AppError::Validation(fields)) => {
            assert!(fields.has("email"));
            assert!(fields.has("username"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    // Login is case-insensitive on email; a wrong password is a 400.
    let bad = auth_service::login(&state, login_request("anna@example.com", "nope")).await;
    assert_eq!(bad.unwrap_err().status(), StatusCode::BAD_REQUEST);
    let anna_auth = login(&state, "ANNA@example.com", "s3cret-pass").await?;
    assert_eq!(anna_auth.user_id, anna);
    let boris_auth = login(&state, "boris@example.com", "s3cret-pass").await?;

    // Boris publishes two recipes.
    for name in ["Borscht", "Pelmeni"] {
        RecipeActive {
            id: NotSet,
            author_id: Set(boris),
            name: Set(name.into()),
            image: Set("/media/recipes/placeholder.png".into()),
            text: Set("Cook it.".into()),
            cooking_time: Set(30),
            pub_date: NotSet,
        }
        .insert(&state.orm)
        .await?;
    }

    let own = relation_service::toggle_subscription(&state, &anna_auth, ToggleAction::Add, anna, None).await;
    assert_eq!(own.unwrap_err().status(), StatusCode::BAD_REQUEST);

    let subscribed = relation_service::toggle_subscription(&state, &anna_auth, ToggleAction::Add, boris, Some(1)).await?;
    match subscribed {
        ToggleOutcome::Created(resp) => {
            let view = resp.data.unwrap();
            assert!(view.user.is_subscribed);
            assert_eq!(view.recipes_count, 2);
            assert_eq!(view.recipes.len(), 1);
            assert_eq!(view.recipes[0].name, "Pelmeni");
        }
        ToggleOutcome::Deleted => panic!("expected a subscription"),
    }
    let twice = relation_service::toggle_subscription(&state, &anna_auth, ToggleAction::Add, boris, None).await;
    assert_eq!(twice.unwrap_err().status(), StatusCode::BAD_REQUEST);

    let listed = user_service::list_subscriptions(
        &state,
        &anna_auth,
        SubscriptionQuery {
            page: None,
            limit: None,
            recipes_limit: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(listed.items.len(), 1);
    assert_eq!(listed.items[0].recipes.len(), 2);

    // is_subscribed is relative to the viewer.
    let seen_by_anna = user_service::get_user(&state, Some(&anna_auth), boris).await?.data.unwrap();
    assert!(seen_by_anna.is_subscribed);
    let seen_anonymously = user_service::get_user(&state, None, boris).await?.data.unwrap();
    assert!(!seen_anonymously.is_subscribed);

    let users = user_service::list_users(&state, Some(&boris_auth), Pagination::default())
        .await?
        .meta
        .unwrap();
    assert_eq!(users.total, Some(2));

    // Only the user or an admin may edit a profile.
    let edit = UpdateUserRequest {
        first_name: Some("Anya".into()),
        ..Default::default()
    };
    let foreign = user_service::update_user(&state, &boris_auth, anna, edit).await;
    assert!(matches!(foreign, Err(AppError::Forbidden)));

    let unsubscribed = relation_service::toggle_subscription(&state, &anna_auth, ToggleAction::Remove, boris, None).await?;
    assert!(matches!(unsubscribed, ToggleOutcome::Deleted));
    let not_subscribed = relation_service::toggle_subscription(&state, &anna_auth, ToggleAction::Remove, boris, None).await;
    assert_eq!(not_subscribed.unwrap_err().status(), StatusCode::BAD_REQUEST);

    // Password change, then logout revokes the token.
    let wrong = auth_service::set_password(
        &state,
        &anna_auth,
        SetPasswordRequest {
            current_password: "wrong".into(),
            new_password: "another-pass".into(),
        },
    )
    .await;
    assert_eq!(wrong.unwrap_err().status(), StatusCode::BAD_REQUEST);
    auth_service::set_password(
        &state,
        &anna_auth,
        SetPasswordRequest {
            current_password: "s3cret-pass".into(),
            new_password: "another-pass".into(),
        },
    )
    .await?;

    let token = auth_service::login(&state, login_request("anna@example.com", "another-pass"))
        .await?
        .data
        .unwrap()
        .auth_token;
    let header = HeaderValue::from_str(&format!("Token {token}"))?;
    let session = authenticate(&state, &header).await?;
    auth_service::logout(&state, &session).await?;
    let revoked = authenticate(&state, &header).await;
    assert!(matches!(revoked, Err(AppError::Unauthorized)));

    // Role changes apply to tokens that are already issued.
    let boris_header = token_header(&state, "boris@example.com", "s3cret-pass").await?;
    set_role(&state, boris, "admin").await?;
    assert!(authenticate(&state, &boris_header).await?.is_admin());
    set_role(&state, boris, "user").await?;
    assert!(!authenticate(&state, &boris_header).await?.is_admin());

    // A deleted account cannot keep using its token.
    let carol = register(&state, "carol", "Carol").await?;
    let carol_header = token_header(&state, "carol@example.com", "s3cret-pass").await?;
    let carol_auth = authenticate(&state, &carol_header).await?;
    user_service::delete_user(&state, &carol_auth, carol).await?;
    let orphaned = authenticate(&state, &carol_header).await;
    assert!(matches!(orphaned, Err(AppError::Unauthorized)));

    Ok(())
}

fn register_request(username: &str, first_name: &str) -> RegisterRequest {
    RegisterRequest {
        email: format!("{username}@example.com"),
        username: username.into(),
        first_name: first_name.into(),
        last_name: "Testova".into(),
        password: "s3cret-pass".into(),
    }
}

fn login_request(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.into(),
        password: password.into(),
    }
}

async fn register(state: &AppState, username: &str, first_name: &str) -> anyhow::Result<i64> {
    let created = user_service::register_user(state, register_request(username, first_name)).await?;
    Ok(created.data.unwrap().id)
}

async fn token_header(state: &AppState, email: &str, password: &str) -> anyhow::Result<HeaderValue> {
    let token = auth_service::login(state, login_request(email, password))
        .await?
        .data
        .unwrap()
        .auth_token;
    Ok(HeaderValue::from_str(&format!("Bearer {token}"))?)
}

async fn login(state: &AppState, email: &str, password: &str) -> anyhow::Result<AuthUser> {
    let header = token_header(state, email, password).await?;
    Ok(authenticate(state, &header).await?)
}

async fn set_role(state: &AppState, user_id: i64, role: &str) -> anyhow::Result<()> {
    let user = UserActive {
        id: Set(user_id),
        role: Set(role.into()),
        ..Default::default()
    };
    user.update(&state.orm).await?;
    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    run_migrations(&pool).await?;

    let config = AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        token_ttl_hours: 1,
        media_root: std::env::temp_dir()
            .join("foodgram-test-media")
            .to_string_lossy()
            .into_owned(),
    };
    let state = AppState::new(pool, config);

    // Clean tables between runs
    let backend = state.orm.get_database_backend();
    state
        .orm
        .execute(Statement::from_string(
            backend,
            "TRUNCATE TABLE shopping_cart, favorites, recipe_ingredients, recipe_tags, recipes, \
             subscriptions, ingredients, tags, revoked_tokens, audit_logs, users RESTART IDENTITY CASCADE",
        ))
        .await?;

    Ok(state)
}
