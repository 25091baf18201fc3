use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
    ActiveValue::NotSet,
};
use std::collections::{HashMap, HashSet};

use crate::{
    audit,
    dto::users::{RegisterRequest, SubscriptionList, UpdateUserRequest, UserList},
    entity::{
        recipes::{Column as RecipeCol, Entity as Recipes},
        subscriptions::{Column as SubCol, Entity as Subscriptions},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, USER_ROLE, ensure_author_or_admin},
    models::{ShortRecipe, Subscription, User},
    response::{ApiResponse, Meta},
    routes::params::{Pagination, SubscriptionQuery},
    services::auth_service::{check_password_strength, hash_password},
    state::AppState,
    validation::{FieldErrors, NAME_MAX_LEN, check_text, validate_email, validate_username},
};

/// Ids among `author_ids` that `viewer` is subscribed to.
pub async fn subscribed_authors(
    state: &AppState,
    viewer: Option<&AuthUser>,
    author_ids: &[i64],
) -> AppResult<HashSet<i64>> {
    let Some(viewer) = viewer else {
        return Ok(HashSet::new());
    };
    if author_ids.is_empty() {
        return Ok(HashSet::new());
    }
    let rows = Subscriptions::find()
        .filter(SubCol::FollowerId.eq(viewer.user_id))
        .filter(SubCol::AuthorId.is_in(author_ids.to_vec()))
        .all(&state.orm)
        .await?;
    Ok(rows.into_iter().map(|row| row.author_id).collect())
}

pub async fn find_user(state: &AppState, id: i64) -> AppResult<UserModel> {
    Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn to_user(state: &AppState, viewer: Option<&AuthUser>, model: UserModel) -> AppResult<User> {
    let subscribed = subscribed_authors(state, viewer, &[model.id]).await?;
    let is_subscribed = subscribed.contains(&model.id);
    Ok(User::from_entity(model, is_subscribed))
}

pub async fn register_user(state: &AppState, payload: RegisterRequest) -> AppResult<ApiResponse<User>> {
    let RegisterRequest {
        email,
        username,
        first_name,
        last_name,
        password,
    } = payload;
    let email = email.trim().to_lowercase();

    let mut errors = FieldErrors::new();
    if let Err(msg) = validate_email(&email) {
        errors.add("email", msg);
    }
    if let Err(msg) = validate_username(&username) {
        errors.add("username", msg);
    }
    check_text(&mut errors, "first_name", &first_name, NAME_MAX_LEN);
    check_text(&mut errors, "last_name", &last_name, NAME_MAX_LEN);
    if let Err(msg) = check_password_strength(&password) {
        errors.add("password", msg);
    }

    let taken = Users::find()
        .filter(
            Condition::any()
                .add(UserCol::Email.eq(email.as_str()))
                .add(UserCol::Username.eq(username.as_str())),
        )
        .all(&state.orm)
        .await?;
    for user in &taken {
        if user.email == email {
            errors.add("email", "Email is already taken");
        }
        if user.username == username {
            errors.add("username", "Username is already taken");
        }
    }
    errors.into_result()?;

    let user = UserActive {
        id: NotSet,
        email: Set(email),
        username: Set(username),
        first_name: Set(first_name),
        last_name: Set(last_name),
        password_hash: Set(hash_password(&password)?),
        role: Set(USER_ROLE.to_string()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        user.id,
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "User created",
        User::from_entity(user, false),
        None,
    ))
}

pub async fn list_users(
    state: &AppState,
    viewer: Option<&AuthUser>,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = Users::find().order_by_asc(UserCol::Username);
    let total = finder.clone().count(&state.orm).await? as i64;

    let users = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
    let subscribed = subscribed_authors(state, viewer, &ids).await?;
    let items = users
        .into_iter()
        .map(|u| {
            let is_subscribed = subscribed.contains(&u.id);
            User::from_entity(u, is_subscribed)
        })
        .collect();

    Ok(ApiResponse::success(
        "Users",
        UserList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_user(
    state: &AppState,
    viewer: Option<&AuthUser>,
    id: i64,
) -> AppResult<ApiResponse<User>> {
    let model = find_user(state, id).await?;
    Ok(ApiResponse::success("User", to_user(state, viewer, model).await?, None))
}

pub async fn me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let model = find_user(state, user.user_id).await?;
    Ok(ApiResponse::success(
        "Current user",
        User::from_entity(model, false),
        None,
    ))
}

pub async fn update_user(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: UpdateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_author_or_admin(user, id)?;
    let existing = find_user(state, id).await?;

    let mut errors = FieldErrors::new();
    let mut active: UserActive = existing.clone().into();
    if let Some(email) = payload.email.map(|e| e.trim().to_lowercase()) {
        match validate_email(&email) {
            Ok(()) if email != existing.email => {
                let taken = Users::find()
                    .filter(UserCol::Email.eq(email.as_str()))
                    .count(&state.orm)
                    .await?;
                if taken > 0 {
                    errors.add("email", "Email is already taken");
                }
                active.email = Set(email);
            }
            Ok(()) => {}
            Err(msg) => errors.add("email", msg),
        }
    }
    if let Some(username) = payload.username {
        match validate_username(&username) {
            Ok(()) if username != existing.username => {
                let taken = Users::find()
                    .filter(UserCol::Username.eq(username.as_str()))
                    .count(&state.orm)
                    .await?;
                if taken > 0 {
                    errors.add("username", "Username is already taken");
                }
                active.username = Set(username);
            }
            Ok(()) => {}
            Err(msg) => errors.add("username", msg),
        }
    }
    if let Some(first_name) = payload.first_name {
        check_text(&mut errors, "first_name", &first_name, NAME_MAX_LEN);
        active.first_name = Set(first_name);
    }
    if let Some(last_name) = payload.last_name {
        check_text(&mut errors, "last_name", &last_name, NAME_MAX_LEN);
        active.last_name = Set(last_name);
    }
    errors.into_result()?;

    let updated = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "user_update",
        "users",
        serde_json::json!({ "user_id": id }),
    )
    .await;

    let updated = to_user(state, Some(user), updated).await?;
    Ok(ApiResponse::success("Updated", updated, Some(Meta::empty())))
}

pub async fn delete_user(state: &AppState, user: &AuthUser, id: i64) -> AppResult<()> {
    ensure_author_or_admin(user, id)?;
    let result = Users::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "user_delete",
        "users",
        serde_json::json!({ "user_id": id }),
    )
    .await;
    Ok(())
}

/// Build subscription views for `authors`, keeping their order.
pub async fn subscription_views(
    state: &AppState,
    viewer: &AuthUser,
    authors: Vec<UserModel>,
    recipes_limit: Option<u64>,
) -> AppResult<Vec<Subscription>> {
    if authors.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = authors.iter().map(|a| a.id).collect();
    let recipes = Recipes::find()
        .filter(RecipeCol::AuthorId.is_in(ids.clone()))
        .order_by_desc(RecipeCol::PubDate)
        .order_by_desc(RecipeCol::Id)
        .all(&state.orm)
        .await?;

    let mut by_author: HashMap<i64, Vec<ShortRecipe>> = HashMap::new();
    for recipe in recipes {
        by_author
            .entry(recipe.author_id)
            .or_default()
            .push(ShortRecipe {
                id: recipe.id,
                name: recipe.name,
                image: recipe.image,
                cooking_time: recipe.cooking_time,
            });
    }

    let subscribed = subscribed_authors(state, Some(viewer), &ids).await?;
    Ok(authors
        .into_iter()
        .map(|author| {
            let mut recipes = by_author.remove(&author.id).unwrap_or_default();
            let recipes_count = recipes.len() as i64;
            if let Some(limit) = recipes_limit {
                recipes.truncate(limit as usize);
            }
            let is_subscribed = subscribed.contains(&author.id);
            Subscription {
                user: User::from_entity(author, is_subscribed),
                recipes,
                recipes_count,
            }
        })
        .collect())
}

pub async fn list_subscriptions(
    state: &AppState,
    user: &AuthUser,
    query: SubscriptionQuery,
) -> AppResult<ApiResponse<SubscriptionList>> {
    let (page, limit, offset) = query.pagination().normalize();

    let author_ids: Vec<i64> = Subscriptions::find()
        .filter(SubCol::FollowerId.eq(user.user_id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|s| s.author_id)
        .collect();

    let finder = Users::find()
        .filter(UserCol::Id.is_in(author_ids))
        .order_by_asc(UserCol::Username);
    let total = finder.clone().count(&state.orm).await? as i64;
    let authors = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = subscription_views(state, user, authors, query.recipes_limit).await?;
    Ok(ApiResponse::success(
        "Subscriptions",
        SubscriptionList { items },
        Some(Meta::new(page, limit, total)),
    ))
}
