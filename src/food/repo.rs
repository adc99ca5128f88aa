use sqlx::PgPool;

use super::repo_types::{Food, FoodSearchRow};

const FOOD_COLUMNS: &str = "id, code, product_name, brands, categories, ingredients_text, image_url, \
    allergens, energy_kcal_100g, fat_100g, saturated_fat_100g, carbohydrates_100g, sugars_100g, \
    fiber_100g, proteins_100g, salt_100g";

/// Case-insensitive substring search on the product name. `pattern` must
/// already be escaped for `ILIKE`.
pub async fn search_by_name(
    db: &PgPool,
    pattern: &str,
    limit: i64,
) -> anyhow::Result<Vec<FoodSearchRow>> {
    let rows = sqlx::query_as::<_, FoodSearchRow>(
        r#"
        SELECT id, product_name, image_url, allergens
        FROM foods
        WHERE product_name ILIKE '%' || $1 || '%' ESCAPE '\'
        ORDER BY product_name
        LIMIT $2
        "#,
    )
    .bind(pattern)
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find_by_code(db: &PgPool, code: &str) -> anyhow::Result<Option<Food>> {
    let food = sqlx::query_as::<_, Food>(&format!(
        "SELECT {FOOD_COLUMNS} FROM foods WHERE code = $1"
    ))
    .bind(code)
    .fetch_optional(db)
    .await?;
    Ok(food)
}
