use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set, ActiveValue::NotSet};

use crate::{
    audit,
    dto::tags::{CreateTagRequest, TagList, UpdateTagRequest},
    entity::tags::{ActiveModel, Column, Entity as Tags},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Tag,
    response::{ApiResponse, Meta},
    state::AppState,
    validation::{FieldErrors, TAG_NAME_MAX_LEN, check_text, normalize_hex_color, validate_slug},
};

pub async fn list_tags(state: &AppState) -> AppResult<ApiResponse<TagList>> {
    let items = Tags::find()
        .order_by_asc(Column::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Tag::from)
        .collect();
    Ok(ApiResponse::success("Tags", TagList { items }, None))
}

pub async fn get_tag(state: &AppState, id: i64) -> AppResult<ApiResponse<Tag>> {
    let tag = Tags::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Tag", Tag::from(tag), None))
}

pub async fn create_tag(
    state: &AppState,
    user: &AuthUser,
    payload: CreateTagRequest,
) -> AppResult<ApiResponse<Tag>> {
    ensure_admin(user)?;
    let mut errors = FieldErrors::new();
    check_text(&mut errors, "name", &payload.name, TAG_NAME_MAX_LEN);
    if let Err(msg) = validate_slug(&payload.slug) {
        errors.add("slug", msg);
    }
    let color = match normalize_hex_color(&payload.color) {
        Ok(color) => color,
        Err(msg) => {
            errors.add("color", msg);
            String::new()
        }
    };
    errors.into_result()?;

    let tag = ActiveModel {
        id: NotSet,
        name: Set(payload.name.trim().to_string()),
        slug: Set(payload.slug),
        color: Set(color),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "tag_create",
        "tags",
        serde_json::json!({ "tag_id": tag.id }),
    )
    .await;

    Ok(ApiResponse::success("Tag created", Tag::from(tag), Some(Meta::empty())))
}

pub async fn update_tag(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: UpdateTagRequest,
) -> AppResult<ApiResponse<Tag>> {
    ensure_admin(user)?;
    let existing = Tags::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut errors = FieldErrors::new();
    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        check_text(&mut errors, "name", &name, TAG_NAME_MAX_LEN);
        active.name = Set(name.trim().to_string());
    }
    if let Some(slug) = payload.slug {
        if let Err(msg) = validate_slug(&slug) {
            errors.add("slug", msg);
        }
        active.slug = Set(slug);
    }
    if let Some(color) = payload.color {
        match normalize_hex_color(&color) {
            Ok(color) => active.color = Set(color),
            Err(msg) => errors.add("color", msg),
        }
    }
    errors.into_result()?;

    let tag = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "tag_update",
        "tags",
        serde_json::json!({ "tag_id": tag.id }),
    )
    .await;

    Ok(ApiResponse::success("Updated", Tag::from(tag), Some(Meta::empty())))
}

pub async fn delete_tag(state: &AppState, user: &AuthUser, id: i64) -> AppResult<()> {
    ensure_admin(user)?;
    let result = Tags::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "tag_delete",
        "tags",
        serde_json::json!({ "tag_id": id }),
    )
    .await;
    Ok(())
}
