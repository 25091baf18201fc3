use chrono::{DateTime, Utc};

use crate::{
    db::DbPool,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::ShoppingListItem,
    response::TextAttachment,
    services::user_service::find_user,
    state::AppState,
};

pub const DATE_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Sum ingredient amounts over every recipe in the user's cart.
pub async fn aggregate(pool: &DbPool, user_id: i64) -> AppResult<Vec<ShoppingListItem>> {
    let items = sqlx::query_as::<_, ShoppingListItem>(
        r#"
        SELECT i.name, i.measurement_unit, SUM(ri.amount)::BIGINT AS total_amount
        FROM shopping_cart sc
        JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
        JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE sc.user_id = $1
        GROUP BY i.name, i.measurement_unit
        ORDER BY i.name, i.measurement_unit
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

pub fn render(display_name: &str, generated_at: DateTime<Utc>, items: &[ShoppingListItem]) -> String {
    let mut out = format!(
        "Shopping list for:\n\n{display_name}\n{} UTC\n\n",
        generated_at.format(DATE_FORMAT)
    );
    for item in items {
        out.push_str(&format!(
            "{}: {} {}\n",
            item.name, item.total_amount, item.measurement_unit
        ));
    }
    out.push_str("\n\nCounted by Foodgram");
    out
}

pub async fn download(state: &AppState, user: &AuthUser) -> AppResult<TextAttachment> {
    let in_cart: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM shopping_cart WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await?;
    if in_cart.0 == 0 {
        return Err(AppError::BadRequest("Shopping cart is empty".into()));
    }

    let owner = find_user(state, user.user_id).await?;
    let items = aggregate(&state.pool, user.user_id).await?;
    tracing::debug!(user_id = user.user_id, lines = items.len(), "built shopping list");

    let display_name = if owner.first_name.trim().is_empty() {
        owner.username.as_str()
    } else {
        owner.first_name.as_str()
    };

    Ok(TextAttachment {
        filename: format!("{}_shopping_list.txt", owner.username),
        body: render(display_name, Utc::now(), &items),
    })
}
