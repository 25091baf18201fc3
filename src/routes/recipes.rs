use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    routing::get,
};

use crate::{
    dto::recipes::{RecipeList, RecipeWriteRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Recipe, ShortRecipe},
    response::{ApiResponse, Created, TextAttachment},
    routes::params::RecipeQuery,
    services::{
        recipe_service,
        relation_service::{self, RelationKind, ToggleAction, ToggleOutcome},
        shopping_list_service,
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_recipes).post(create_recipe))
        .route("/download_shopping_cart", get(download_shopping_cart))
        .route(
            "/{id}",
            get(get_recipe).patch(update_recipe).delete(delete_recipe),
        )
        .route(
            "/{id}/favorite",
            get(favorite).post(favorite).delete(favorite),
        )
        .route(
            "/{id}/shopping_cart",
            get(shopping_cart).post(shopping_cart).delete(shopping_cart),
        )
}

#[utoipa::path(
    get,
    path = "/api/recipes",
    params(
        ("page" = Option<i64>, Query, description = "Page number, from 1"),
        ("limit" = Option<i64>, Query, description = "Page size"),
        ("tags" = Option<Vec<String>>, Query, description = "Tag slugs, repeatable; any match"),
        ("author" = Option<i64>, Query, description = "Author ID"),
        ("is_favorited" = Option<String>, Query, description = "1 or 0, ignored for anonymous callers"),
        ("is_in_shopping_cart" = Option<String>, Query, description = "1 or 0, ignored for anonymous callers")
    ),
    responses(
        (status = 200, description = "Newest recipes first", body = ApiResponse<RecipeList>)
    ),
    tag = "Recipes"
)]
pub async fn list_recipes(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> AppResult<Json<ApiResponse<RecipeList>>> {
    let query = RecipeQuery::from_pairs(&pairs);
    let resp = recipe_service::list_recipes(&state, viewer.as_ref(), query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/recipes",
    request_body = RecipeWriteRequest,
    responses(
        (status = 201, description = "Create recipe", body = ApiResponse<Recipe>),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "Recipes"
)]
pub async fn create_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<RecipeWriteRequest>,
) -> AppResult<Created<Recipe>> {
    Ok(Created(
        recipe_service::create_recipe(&state, &user, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/recipes/download_shopping_cart",
    responses(
        (status = 200, description = "Plain-text shopping list", content_type = "text/plain"),
        (status = 400, description = "Shopping cart is empty"),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "Recipes"
)]
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<TextAttachment> {
    shopping_list_service::download(&state, &user).await
}

#[utoipa::path(
    get,
    path = "/api/recipes/{id}",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 200, description = "Get recipe", body = ApiResponse<Recipe>),
        (status = 404, description = "Recipe not found")
    ),
    tag = "Recipes"
)]
pub async fn get_recipe(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Recipe>>> {
    Ok(Json(
        recipe_service::get_recipe(&state, viewer.as_ref(), id).await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/api/recipes/{id}",
    params(("id" = i64, Path, description = "Recipe ID")),
    request_body = RecipeWriteRequest,
    responses(
        (status = 200, description = "Updated recipe", body = ApiResponse<Recipe>),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Only the author or an admin"),
        (status = 404, description = "Recipe not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Recipes"
)]
pub async fn update_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<RecipeWriteRequest>,
) -> AppResult<Json<ApiResponse<Recipe>>> {
    Ok(Json(
        recipe_service::update_recipe(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/recipes/{id}",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 204, description = "Deleted recipe"),
        (status = 403, description = "Only the author or an admin"),
        (status = 404, description = "Recipe not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Recipes"
)]
pub async fn delete_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    recipe_service::delete_recipe(&state, &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle(
    state: &AppState,
    user: &AuthUser,
    kind: RelationKind,
    method: &Method,
    id: i64,
) -> AppResult<ToggleOutcome<ShortRecipe>> {
    let action = ToggleAction::from_method(method)
        .ok_or_else(|| AppError::BadRequest(format!("Method {method} is not supported")))?;
    relation_service::toggle_recipe(state, user, kind, action, id).await
}

#[utoipa::path(
    post,
    path = "/api/recipes/{id}/favorite",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 201, description = "Added to favorites", body = ApiResponse<ShortRecipe>),
        (status = 204, description = "Removed from favorites"),
        (status = 400, description = "Already or not in favorites"),
        (status = 404, description = "Recipe not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Recipes"
)]
pub async fn favorite(
    State(state): State<AppState>,
    user: AuthUser,
    method: Method,
    Path(id): Path<i64>,
) -> AppResult<ToggleOutcome<ShortRecipe>> {
    toggle(&state, &user, RelationKind::Favorite, &method, id).await
}

#[utoipa::path(
    post,
    path = "/api/recipes/{id}/shopping_cart",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 201, description = "Added to shopping cart", body = ApiResponse<ShortRecipe>),
        (status = 204, description = "Removed from shopping cart"),
        (status = 400, description = "Already or not in the shopping cart"),
        (status = 404, description = "Recipe not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Recipes"
)]
pub async fn shopping_cart(
    State(state): State<AppState>,
    user: AuthUser,
    method: Method,
    Path(id): Path<i64>,
) -> AppResult<ToggleOutcome<ShortRecipe>> {
    toggle(&state, &user, RelationKind::ShoppingCart, &method, id).await
}
