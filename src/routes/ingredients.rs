use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};

use crate::{
    dto::ingredients::{CreateIngredientRequest, IngredientList, IngredientQuery, UpdateIngredientRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Ingredient,
    response::{ApiResponse, Created},
    services::ingredient_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_ingredients).post(create_ingredient))
        .route(
            "/{id}",
            get(get_ingredient)
                .patch(update_ingredient)
                .delete(delete_ingredient),
        )
}

#[utoipa::path(
    get,
    path = "/api/ingredients",
    params(IngredientQuery),
    responses(
        (status = 200, description = "Prefix matches first, then substring matches", body = ApiResponse<IngredientList>)
    ),
    tag = "Ingredients"
)]
pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(query): Query<IngredientQuery>,
) -> AppResult<Json<ApiResponse<IngredientList>>> {
    Ok(Json(ingredient_service::list_ingredients(&state, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/ingredients/{id}",
    params(("id" = i64, Path, description = "Ingredient ID")),
    responses(
        (status = 200, description = "Get ingredient", body = ApiResponse<Ingredient>),
        (status = 404, description = "Ingredient not found")
    ),
    tag = "Ingredients"
)]
pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Ingredient>>> {
    Ok(Json(ingredient_service::get_ingredient(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/ingredients",
    request_body = CreateIngredientRequest,
    responses(
        (status = 201, description = "Create ingredient", body = ApiResponse<Ingredient>),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Ingredients"
)]
pub async fn create_ingredient(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateIngredientRequest>,
) -> AppResult<Created<Ingredient>> {
    Ok(Created(
        ingredient_service::create_ingredient(&state, &user, payload).await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/api/ingredients/{id}",
    params(("id" = i64, Path, description = "Ingredient ID")),
    request_body = UpdateIngredientRequest,
    responses(
        (status = 200, description = "Updated ingredient", body = ApiResponse<Ingredient>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Ingredient not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Ingredients"
)]
pub async fn update_ingredient(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateIngredientRequest>,
) -> AppResult<Json<ApiResponse<Ingredient>>> {
    Ok(Json(
        ingredient_service::update_ingredient(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/ingredients/{id}",
    params(("id" = i64, Path, description = "Ingredient ID")),
    responses(
        (status = 204, description = "Deleted ingredient"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Ingredient not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Ingredients"
)]
pub async fn delete_ingredient(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    ingredient_service::delete_ingredient(&state, &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
