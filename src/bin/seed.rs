use foodgram_api::{
    config::AppConfig,
    db::{DbPool, create_pool, run_migrations},
    middleware::auth::{ADMIN_ROLE, USER_ROLE},
    services::auth_service::hash_password,
};
use serde::Deserialize;

const INGREDIENTS_JSON: &str = include_str!("../../data/ingredients.json");

#[derive(Deserialize)]
struct IngredientRow {
    name: String,
    measurement_unit: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin", "Admin", "admin12345", ADMIN_ROLE).await?;
    let user_id = ensure_user(&pool, "user@example.com", "cook", "Demo", "cook12345", USER_ROLE).await?;
    seed_tags(&pool).await?;
    seed_ingredients(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &DbPool,
    email: &str,
    username: &str,
    first_name: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<i64> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO users (email, username, first_name, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(email)
    .bind(username)
    .bind(first_name)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

async fn seed_tags(pool: &DbPool) -> anyhow::Result<()> {
    let tags = [
        ("Breakfast", "breakfast", "#E26C2D"),
        ("Lunch", "lunch", "#49B64E"),
        ("Dinner", "dinner", "#8775D2"),
    ];

    for (name, slug, color) in tags {
        sqlx::query(
            r#"
            INSERT INTO tags (name, slug, color)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(name)
        .bind(slug)
        .bind(color)
        .execute(pool)
        .await?;
    }

    println!("Seeded tags");
    Ok(())
}

async fn seed_ingredients(pool: &DbPool) -> anyhow::Result<()> {
    let rows: Vec<IngredientRow> = serde_json::from_str(INGREDIENTS_JSON)?;
    let mut inserted = 0;
    for row in &rows {
        let result = sqlx::query(
            r#"
            INSERT INTO ingredients (name, measurement_unit)
            VALUES ($1, $2)
            ON CONFLICT (name, measurement_unit) DO NOTHING
            "#,
        )
        .bind(&row.name)
        .bind(&row.measurement_unit)
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }

    println!("Seeded ingredients: {inserted} new of {}", rows.len());
    Ok(())
}
