//! Add/remove over the per-user join tables.
//!
//! The insert is `ON CONFLICT DO NOTHING`; zero affected rows on either
//! statement means the pair was already in the requested state.

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{
    audit,
    db::DbPool,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{ShortRecipe, Subscription},
    response::{ApiResponse, Created, Meta},
    services::{recipe_service, user_service},
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Favorite,
    ShoppingCart,
    Subscribe,
}

impl RelationKind {
    fn table(self) -> &'static str {
        match self {
            RelationKind::Favorite => "favorites",
            RelationKind::ShoppingCart => "shopping_cart",
            RelationKind::Subscribe => "subscriptions",
        }
    }

    fn owner_column(self) -> &'static str {
        match self {
            RelationKind::Favorite | RelationKind::ShoppingCart => "user_id",
            RelationKind::Subscribe => "follower_id",
        }
    }

    fn target_column(self) -> &'static str {
        match self {
            RelationKind::Favorite | RelationKind::ShoppingCart => "recipe_id",
            RelationKind::Subscribe => "author_id",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RelationKind::Favorite => "favorite",
            RelationKind::ShoppingCart => "shopping_cart",
            RelationKind::Subscribe => "subscribe",
        }
    }

    fn created_message(self) -> &'static str {
        match self {
            RelationKind::Favorite => "Added to favorites",
            RelationKind::ShoppingCart => "Added to shopping cart",
            RelationKind::Subscribe => "Subscribed",
        }
    }

    fn conflict_message(self, action: ToggleAction) -> &'static str {
        match (self, action) {
            (RelationKind::Favorite, ToggleAction::Add) => "Recipe is already in favorites",
            (RelationKind::Favorite, ToggleAction::Remove) => "Recipe is not in favorites",
            (RelationKind::ShoppingCart, ToggleAction::Add) => "Recipe is already in the shopping cart",
            (RelationKind::ShoppingCart, ToggleAction::Remove) => "Recipe is not in the shopping cart",
            (RelationKind::Subscribe, ToggleAction::Add) => "Already subscribed to this author",
            (RelationKind::Subscribe, ToggleAction::Remove) => "Not subscribed to this author",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Add,
    Remove,
}

impl ToggleAction {
    /// `GET` and `POST` add, `DELETE` removes.
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET | Method::POST => Some(ToggleAction::Add),
            Method::DELETE => Some(ToggleAction::Remove),
            _ => None,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            ToggleAction::Add => "add",
            ToggleAction::Remove => "remove",
        }
    }
}

#[derive(Debug)]
pub enum ToggleOutcome<T> {
    Created(ApiResponse<T>),
    Deleted,
}

impl<T: Serialize> IntoResponse for ToggleOutcome<T> {
    fn into_response(self) -> Response {
        match self {
            ToggleOutcome::Created(body) => Created(body).into_response(),
            ToggleOutcome::Deleted => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// Insert or delete the `(owner, target)` row. Returns whether a row changed.
pub async fn apply(
    pool: &DbPool,
    kind: RelationKind,
    action: ToggleAction,
    owner_id: i64,
    target_id: i64,
) -> AppResult<bool> {
    let (table, owner, target) = (kind.table(), kind.owner_column(), kind.target_column());
    let sql = match action {
        ToggleAction::Add => format!(
            "INSERT INTO {table} ({owner}, {target}) VALUES ($1, $2) \
             ON CONFLICT ({owner}, {target}) DO NOTHING"
        ),
        ToggleAction::Remove => {
            format!("DELETE FROM {table} WHERE {owner} = $1 AND {target} = $2")
        }
    };

    let result = sqlx::query(&sql)
        .bind(owner_id)
        .bind(target_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn apply_or_reject(
    state: &AppState,
    user: &AuthUser,
    kind: RelationKind,
    action: ToggleAction,
    target_id: i64,
) -> AppResult<()> {
    if !apply(&state.pool, kind, action, user.user_id, target_id).await? {
        return Err(AppError::BadRequest(kind.conflict_message(action).into()));
    }

    audit::record(
        &state.pool,
        user.user_id,
        &format!("{}_{}", kind.name(), action.verb()),
        kind.table(),
        serde_json::json!({ "target_id": target_id }),
    )
    .await;
    Ok(())
}

/// Favorite or shopping-cart toggle for a recipe.
pub async fn toggle_recipe(
    state: &AppState,
    user: &AuthUser,
    kind: RelationKind,
    action: ToggleAction,
    recipe_id: i64,
) -> AppResult<ToggleOutcome<ShortRecipe>> {
    debug_assert!(kind != RelationKind::Subscribe);
    let recipe = recipe_service::find_recipe(state, recipe_id).await?;
    apply_or_reject(state, user, kind, action, recipe.id).await?;

    Ok(match action {
        ToggleAction::Add => ToggleOutcome::Created(ApiResponse::success(
            kind.created_message(),
            recipe_service::short_recipe(&recipe),
            Some(Meta::empty()),
        )),
        ToggleAction::Remove => ToggleOutcome::Deleted,
    })
}

pub async fn toggle_subscription(
    state: &AppState,
    user: &AuthUser,
    action: ToggleAction,
    author_id: i64,
    recipes_limit: Option<u64>,
) -> AppResult<ToggleOutcome<Subscription>> {
    let author = user_service::find_user(state, author_id).await?;
    if author.id == user.user_id {
        return Err(AppError::BadRequest("You cannot subscribe to yourself".into()));
    }
    apply_or_reject(state, user, RelationKind::Subscribe, action, author.id).await?;

    match action {
        ToggleAction::Add => {
            let view = user_service::subscription_views(state, user, vec![author], recipes_limit)
                .await?
                .pop()
                .ok_or(AppError::NotFound)?;
            Ok(ToggleOutcome::Created(ApiResponse::success(
                RelationKind::Subscribe.created_message(),
                view,
                Some(Meta::empty()),
            )))
        }
        ToggleAction::Remove => Ok(ToggleOutcome::Deleted),
    }
}
