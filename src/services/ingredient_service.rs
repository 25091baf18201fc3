use sea_orm::{
    ActiveModelTrait, EntityTrait, QueryFilter, QueryOrder, Select, Set,
    ActiveValue::NotSet,
    sea_query::{Expr, LikeExpr, extension::postgres::PgExpr},
};

use crate::{
    audit,
    dto::ingredients::{CreateIngredientRequest, IngredientList, IngredientQuery, UpdateIngredientRequest},
    entity::ingredients::{ActiveModel, Column, Entity as Ingredients},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Ingredient,
    response::{ApiResponse, Meta},
    state::AppState,
    validation::{FieldErrors, INGREDIENT_NAME_MAX_LEN, MEASUREMENT_UNIT_MAX_LEN, check_text},
};

/// Escape `LIKE` wildcards so the search term is matched literally.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Ingredients whose name contains `term`, those starting with it first.
///
/// Both the filter and the ranking use `ILIKE` so they fold case the same way.
pub fn search_query(term: Option<&str>) -> Select<Ingredients> {
    let finder = Ingredients::find();
    let finder = match term {
        Some(term) => {
            let escaped = escape_like(term);
            let contains = LikeExpr::new(format!("%{escaped}%")).escape('\\');
            let starts_with = LikeExpr::new(format!("{escaped}%")).escape('\\');
            finder
                .filter(Expr::col(Column::Name).ilike(contains))
                .order_by_desc(Expr::col(Column::Name).ilike(starts_with))
        }
        None => finder,
    };
    finder.order_by_asc(Column::Name).order_by_asc(Column::Id)
}

pub async fn list_ingredients(
    state: &AppState,
    query: IngredientQuery,
) -> AppResult<ApiResponse<IngredientList>> {
    let term = query.name.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let items = search_query(term)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Ingredient::from)
        .collect();
    Ok(ApiResponse::success("Ingredients", IngredientList { items }, None))
}

pub async fn get_ingredient(state: &AppState, id: i64) -> AppResult<ApiResponse<Ingredient>> {
    let ingredient = Ingredients::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Ingredient", Ingredient::from(ingredient), None))
}

pub async fn create_ingredient(
    state: &AppState,
    user: &AuthUser,
    payload: CreateIngredientRequest,
) -> AppResult<ApiResponse<Ingredient>> {
    ensure_admin(user)?;
    let mut errors = FieldErrors::new();
    check_text(&mut errors, "name", &payload.name, INGREDIENT_NAME_MAX_LEN);
    check_text(
        &mut errors,
        "measurement_unit",
        &payload.measurement_unit,
        MEASUREMENT_UNIT_MAX_LEN,
    );
    errors.into_result()?;

    let ingredient = ActiveModel {
        id: NotSet,
        name: Set(payload.name.trim().to_string()),
        measurement_unit: Set(payload.measurement_unit.trim().to_string()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "ingredient_create",
        "ingredients",
        serde_json::json!({ "ingredient_id": ingredient.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Ingredient created",
        Ingredient::from(ingredient),
        Some(Meta::empty()),
    ))
}

pub async fn update_ingredient(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: UpdateIngredientRequest,
) -> AppResult<ApiResponse<Ingredient>> {
    ensure_admin(user)?;
    let existing = Ingredients::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut errors = FieldErrors::new();
    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        check_text(&mut errors, "name", &name, INGREDIENT_NAME_MAX_LEN);
        active.name = Set(name.trim().to_string());
    }
    if let Some(unit) = payload.measurement_unit {
        check_text(&mut errors, "measurement_unit", &unit, MEASUREMENT_UNIT_MAX_LEN);
        active.measurement_unit = Set(unit.trim().to_string());
    }
    errors.into_result()?;

    let ingredient = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "ingredient_update",
        "ingredients",
        serde_json::json!({ "ingredient_id": ingredient.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        Ingredient::from(ingredient),
        Some(Meta::empty()),
    ))
}

pub async fn delete_ingredient(state: &AppState, user: &AuthUser, id: i64) -> AppResult<()> {
    ensure_admin(user)?;
    let result = Ingredients::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "ingredient_delete",
        "ingredients",
        serde_json::json!({ "ingredient_id": id }),
    )
    .await;
    Ok(())
}
