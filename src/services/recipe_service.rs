use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    ActiveValue::NotSet,
    sea_query::{Expr, Query, SelectStatement},
};
use std::collections::{HashMap, HashSet};

use crate::{
    audit,
    dto::recipes::{RecipeList, RecipeWriteRequest},
    entity::{
        favorites::{Column as FavCol, Entity as Favorites},
        ingredients::{Column as IngredientCol, Entity as Ingredients},
        recipe_ingredients::{
            ActiveModel as RecipeIngredientActive, Column as RecipeIngredientCol,
            Entity as RecipeIngredients,
        },
        recipe_tags::{ActiveModel as RecipeTagActive, Column as RecipeTagCol, Entity as RecipeTags},
        recipes::{ActiveModel as RecipeActive, Column as RecipeCol, Entity as Recipes, Model as RecipeModel},
        shopping_cart::{Column as CartCol, Entity as ShoppingCart},
        tags::{Column as TagCol, Entity as Tags},
        users::{Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    media,
    middleware::auth::{AuthUser, ensure_author_or_admin},
    models::{Recipe, RecipeIngredient, ShortRecipe, Tag, User},
    response::{ApiResponse, Meta},
    routes::params::{MembershipFilter, RecipeQuery},
    services::user_service::subscribed_authors,
    state::AppState,
    validation::validate_recipe,
};

pub fn short_recipe(model: &RecipeModel) -> ShortRecipe {
    ShortRecipe {
        id: model.id,
        name: model.name.clone(),
        image: model.image.clone(),
        cooking_time: model.cooking_time,
    }
}

pub async fn find_recipe(state: &AppState, id: i64) -> AppResult<RecipeModel> {
    Recipes::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

fn membership(condition: Condition, subquery: SelectStatement, filter: MembershipFilter) -> Condition {
    match filter {
        MembershipFilter::Only => condition.add(RecipeCol::Id.in_subquery(subquery)),
        MembershipFilter::Exclude => condition.add(RecipeCol::Id.not_in_subquery(subquery)),
    }
}

/// Translate list filters into a condition on `recipes`.
///
/// Favorite and cart filters only apply to an authenticated viewer.
pub fn recipe_condition(query: &RecipeQuery, viewer: Option<&AuthUser>) -> Condition {
    let mut condition = Condition::all();

    if !query.tags.is_empty() {
        let tagged = Query::select()
            .column((RecipeTags, RecipeTagCol::RecipeId))
            .from(RecipeTags)
            .inner_join(
                Tags,
                Expr::col((Tags, TagCol::Id)).equals((RecipeTags, RecipeTagCol::TagId)),
            )
            .and_where(Expr::col((Tags, TagCol::Slug)).is_in(query.tags.clone()))
            .to_owned();
        condition = condition.add(RecipeCol::Id.in_subquery(tagged));
    }

    if let Some(author) = query.author {
        condition = condition.add(RecipeCol::AuthorId.eq(author));
    }

    let Some(viewer) = viewer else {
        return condition;
    };

    if let Some(filter) = query.is_favorited {
        let favorited = Query::select()
            .column(FavCol::RecipeId)
            .from(Favorites)
            .and_where(FavCol::UserId.eq(viewer.user_id))
            .to_owned();
        condition = membership(condition, favorited, filter);
    }

    if let Some(filter) = query.is_in_shopping_cart {
        let in_cart = Query::select()
            .column(CartCol::RecipeId)
            .from(ShoppingCart)
            .and_where(CartCol::UserId.eq(viewer.user_id))
            .to_owned();
        condition = membership(condition, in_cart, filter);
    }

    condition
}

/// Attach tags, ingredients, author and viewer flags to recipe rows.
pub async fn hydrate(
    state: &AppState,
    viewer: Option<&AuthUser>,
    recipes: Vec<RecipeModel>,
) -> AppResult<Vec<Recipe>> {
    if recipes.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = recipes.iter().map(|r| r.id).collect();
    let mut author_ids: Vec<i64> = recipes.iter().map(|r| r.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let mut tags: HashMap<i64, Vec<Tag>> = HashMap::new();
    for (link, tag) in RecipeTags::find()
        .filter(RecipeTagCol::RecipeId.is_in(ids.clone()))
        .find_also_related(Tags)
        .all(&state.orm)
        .await?
    {
        if let Some(tag) = tag {
            tags.entry(link.recipe_id).or_default().push(Tag::from(tag));
        }
    }
    for list in tags.values_mut() {
        list.sort_by(|a, b| a.name.cmp(&b.name));
    }

    let mut ingredients: HashMap<i64, Vec<RecipeIngredient>> = HashMap::new();
    for (link, ingredient) in RecipeIngredients::find()
        .filter(RecipeIngredientCol::RecipeId.is_in(ids.clone()))
        .order_by_asc(RecipeIngredientCol::Id)
        .find_also_related(Ingredients)
        .all(&state.orm)
        .await?
    {
        if let Some(ingredient) = ingredient {
            ingredients
                .entry(link.recipe_id)
                .or_default()
                .push(RecipeIngredient {
                    id: ingredient.id,
                    name: ingredient.name,
                    measurement_unit: ingredient.measurement_unit,
                    amount: link.amount,
                });
        }
    }

    let authors: HashMap<i64, _> = Users::find()
        .filter(UserCol::Id.is_in(author_ids.clone()))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    let subscribed = subscribed_authors(state, viewer, &author_ids).await?;

    let (favorited, in_cart) = match viewer {
        Some(viewer) => {
            let favorited: HashSet<i64> = Favorites::find()
                .filter(FavCol::UserId.eq(viewer.user_id))
                .filter(FavCol::RecipeId.is_in(ids.clone()))
                .all(&state.orm)
                .await?
                .into_iter()
                .map(|f| f.recipe_id)
                .collect();
            let in_cart: HashSet<i64> = ShoppingCart::find()
                .filter(CartCol::UserId.eq(viewer.user_id))
                .filter(CartCol::RecipeId.is_in(ids))
                .all(&state.orm)
                .await?
                .into_iter()
                .map(|c| c.recipe_id)
                .collect();
            (favorited, in_cart)
        }
        None => (HashSet::new(), HashSet::new()),
    };

    recipes
        .into_iter()
        .map(|recipe| {
            let author = authors
                .get(&recipe.author_id)
                .cloned()
                .ok_or_else(|| AppError::Internal(anyhow::anyhow!("recipe author missing")))?;
            Ok(Recipe {
                id: recipe.id,
                tags: tags.remove(&recipe.id).unwrap_or_default(),
                author: User::from_entity(author, subscribed.contains(&recipe.author_id)),
                ingredients: ingredients.remove(&recipe.id).unwrap_or_default(),
                is_favorited: favorited.contains(&recipe.id),
                is_in_shopping_cart: in_cart.contains(&recipe.id),
                name: recipe.name,
                image: recipe.image,
                text: recipe.text,
                cooking_time: recipe.cooking_time,
                pub_date: recipe.pub_date.with_timezone(&Utc),
            })
        })
        .collect()
}

async fn hydrate_one(state: &AppState, viewer: Option<&AuthUser>, recipe: RecipeModel) -> AppResult<Recipe> {
    hydrate(state, viewer, vec![recipe])
        .await?
        .pop()
        .ok_or(AppError::NotFound)
}

pub async fn list_recipes(
    state: &AppState,
    viewer: Option<&AuthUser>,
    query: RecipeQuery,
) -> AppResult<ApiResponse<RecipeList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let finder = Recipes::find()
        .filter(recipe_condition(&query, viewer))
        .order_by_desc(RecipeCol::PubDate)
        .order_by_desc(RecipeCol::Id);

    let total = finder.clone().count(&state.orm).await? as i64;

    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = hydrate(state, viewer, rows).await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Recipes", RecipeList { items }, Some(meta)))
}

pub async fn get_recipe(
    state: &AppState,
    viewer: Option<&AuthUser>,
    id: i64,
) -> AppResult<ApiResponse<Recipe>> {
    let recipe = find_recipe(state, id).await?;
    Ok(ApiResponse::success(
        "Recipe",
        hydrate_one(state, viewer, recipe).await?,
        None,
    ))
}

/// Validate `payload` against the ingredients and tags that exist.
async fn check_payload(state: &AppState, payload: &RecipeWriteRequest, image_required: bool) -> AppResult<()> {
    let ingredient_ids: Vec<i64> = payload.ingredients.iter().map(|i| i.id).collect();
    let known_ingredients: HashSet<i64> = if ingredient_ids.is_empty() {
        HashSet::new()
    } else {
        Ingredients::find()
            .select_only()
            .column(IngredientCol::Id)
            .filter(IngredientCol::Id.is_in(ingredient_ids))
            .into_tuple::<i64>()
            .all(&state.orm)
            .await?
            .into_iter()
            .collect()
    };

    let known_tags: HashSet<i64> = if payload.tags.is_empty() {
        HashSet::new()
    } else {
        Tags::find()
            .select_only()
            .column(TagCol::Id)
            .filter(TagCol::Id.is_in(payload.tags.clone()))
            .into_tuple::<i64>()
            .all(&state.orm)
            .await?
            .into_iter()
            .collect()
    };

    validate_recipe(payload, &known_ingredients, &known_tags, image_required)
}

/// Replace the tag and ingredient sets of a recipe.
async fn replace_associations<C: ConnectionTrait>(
    conn: &C,
    recipe_id: i64,
    payload: &RecipeWriteRequest,
) -> AppResult<()> {
    RecipeTags::delete_many()
        .filter(RecipeTagCol::RecipeId.eq(recipe_id))
        .exec(conn)
        .await?;
    RecipeIngredients::delete_many()
        .filter(RecipeIngredientCol::RecipeId.eq(recipe_id))
        .exec(conn)
        .await?;

    RecipeTags::insert_many(payload.tags.iter().map(|tag_id| RecipeTagActive {
        id: NotSet,
        recipe_id: Set(recipe_id),
        tag_id: Set(*tag_id),
    }))
    .exec(conn)
    .await?;

    RecipeIngredients::insert_many(payload.ingredients.iter().map(|item| {
        RecipeIngredientActive {
            id: NotSet,
            recipe_id: Set(recipe_id),
            ingredient_id: Set(item.id),
            amount: Set(item.amount),
        }
    }))
    .exec(conn)
    .await?;

    Ok(())
}

pub async fn create_recipe(
    state: &AppState,
    user: &AuthUser,
    payload: RecipeWriteRequest,
) -> AppResult<ApiResponse<Recipe>> {
    check_payload(state, &payload, true).await?;
    let image_data = payload
        .image
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("image is required".into()))?;
    let image = media::save_recipe_image(&state.config.media_root, image_data).await?;

    let result = async {
        let txn = state.orm.begin().await?;
        let recipe = RecipeActive {
            id: NotSet,
            author_id: Set(user.user_id),
            name: Set(payload.name.trim().to_string()),
            image: Set(image.clone()),
            text: Set(payload.text.clone()),
            cooking_time: Set(payload.cooking_time),
            pub_date: NotSet,
        }
        .insert(&txn)
        .await?;
        replace_associations(&txn, recipe.id, &payload).await?;
        txn.commit().await?;
        Ok::<_, AppError>(recipe)
    }
    .await;

    let recipe = match result {
        Ok(recipe) => recipe,
        Err(err) => {
            media::remove_recipe_image(&state.config.media_root, &image).await;
            return Err(err);
        }
    };

    audit::record(
        &state.pool,
        user.user_id,
        "recipe_create",
        "recipes",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Recipe created",
        hydrate_one(state, Some(user), recipe).await?,
        Some(Meta::empty()),
    ))
}

pub async fn update_recipe(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: RecipeWriteRequest,
) -> AppResult<ApiResponse<Recipe>> {
    let existing = find_recipe(state, id).await?;
    ensure_author_or_admin(user, existing.author_id)?;
    check_payload(state, &payload, false).await?;

    let old_image = existing.image.clone();
    let new_image = match payload.image.as_deref().filter(|s| !s.is_empty()) {
        Some(data) => Some(media::save_recipe_image(&state.config.media_root, data).await?),
        None => None,
    };

    let result = async {
        let txn = state.orm.begin().await?;
        let mut active: RecipeActive = existing.into();
        active.name = Set(payload.name.trim().to_string());
        active.text = Set(payload.text.clone());
        active.cooking_time = Set(payload.cooking_time);
        if let Some(image) = &new_image {
            active.image = Set(image.clone());
        }
        let recipe = active.update(&txn).await?;
        replace_associations(&txn, recipe.id, &payload).await?;
        txn.commit().await?;
        Ok::<_, AppError>(recipe)
    }
    .await;

    let recipe = match result {
        Ok(recipe) => {
            if new_image.is_some() {
                media::remove_recipe_image(&state.config.media_root, &old_image).await;
            }
            recipe
        }
        Err(err) => {
            if let Some(image) = &new_image {
                media::remove_recipe_image(&state.config.media_root, image).await;
            }
            return Err(err);
        }
    };

    audit::record(
        &state.pool,
        user.user_id,
        "recipe_update",
        "recipes",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        hydrate_one(state, Some(user), recipe).await?,
        Some(Meta::empty()),
    ))
}

pub async fn delete_recipe(state: &AppState, user: &AuthUser, id: i64) -> AppResult<()> {
    let existing = find_recipe(state, id).await?;
    ensure_author_or_admin(user, existing.author_id)?;

    Recipes::delete_by_id(id).exec(&state.orm).await?;
    media::remove_recipe_image(&state.config.media_root, &existing.image).await;

    audit::record(
        &state.pool,
        user.user_id,
        "recipe_delete",
        "recipes",
        serde_json::json!({ "recipe_id": id }),
    )
    .await;
    Ok(())
}
