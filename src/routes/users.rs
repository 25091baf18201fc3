use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    routing::{get, post},
};

use crate::{
    dto::{
        auth::SetPasswordRequest,
        users::{RegisterRequest, SubscriptionList, UpdateUserRequest, UserList},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Subscription, User},
    response::{ApiResponse, Created},
    routes::params::{Pagination, RecipesLimit, SubscriptionQuery},
    services::{
        auth_service,
        relation_service::{self, ToggleAction, ToggleOutcome},
        user_service,
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(register))
        .route("/me", get(me))
        .route("/set_password", post(set_password))
        .route("/subscriptions", get(list_subscriptions))
        .route("/{id}", get(get_user).patch(update_user).delete(delete_user))
        .route(
            "/{id}/subscribe",
            get(subscribe).post(subscribe).delete(subscribe),
        )
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(Pagination),
    responses(
        (status = 200, description = "List users", body = ApiResponse<UserList>)
    ),
    tag = "Users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<UserList>>> {
    let resp = user_service::list_users(&state, viewer.as_ref(), pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Register a new user", body = ApiResponse<User>),
        (status = 400, description = "Validation failed")
    ),
    tag = "Users"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<Created<User>> {
    Ok(Created(user_service::register_user(&state, payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<User>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(user_service::me(&state, &user).await?))
}

#[utoipa::path(
    post,
    path = "/api/users/set_password",
    request_body = SetPasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Wrong current password or weak new password")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn set_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SetPasswordRequest>,
) -> AppResult<StatusCode> {
    auth_service::set_password(&state, &user, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/users/subscriptions",
    params(SubscriptionQuery),
    responses(
        (status = 200, description = "Authors the caller follows", body = ApiResponse<SubscriptionList>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SubscriptionQuery>,
) -> AppResult<Json<ApiResponse<SubscriptionList>>> {
    Ok(Json(
        user_service::list_subscriptions(&state, &user, query).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Get user", body = ApiResponse<User>),
        (status = 404, description = "User not found")
    ),
    tag = "Users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(
        user_service::get_user(&state, viewer.as_ref(), id).await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = ApiResponse<User>),
        (status = 403, description = "Only the user or an admin"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(
        user_service::update_user(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted user"),
        (status = 403, description = "Only the user or an admin"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    user_service::delete_user(&state, &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET`/`POST` subscribe, `DELETE` unsubscribes.
#[utoipa::path(
    post,
    path = "/api/users/{id}/subscribe",
    params(
        ("id" = i64, Path, description = "Author ID"),
        RecipesLimit
    ),
    responses(
        (status = 201, description = "Subscribed", body = ApiResponse<Subscription>),
        (status = 204, description = "Unsubscribed"),
        (status = 400, description = "Self-subscription, duplicate or missing subscription"),
        (status = 404, description = "Author not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn subscribe(
    State(state): State<AppState>,
    user: AuthUser,
    method: Method,
    Path(id): Path<i64>,
    Query(query): Query<RecipesLimit>,
) -> AppResult<ToggleOutcome<Subscription>> {
    let action = ToggleAction::from_method(&method)
        .ok_or_else(|| AppError::BadRequest(format!("Method {method} is not supported")))?;
    relation_service::toggle_subscription(&state, &user, action, id, query.recipes_limit).await
}
