use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{MealEntry, MealEntryRow, MealWithFood, NewMealEntry};

pub async fn insert(db: &PgPool, new: NewMealEntry<'_>) -> anyhow::Result<MealEntry> {
    let entry = sqlx::query_as::<_, MealEntry>(
        r#"
        INSERT INTO meal_entries (id, user_id, meal_kind, food_id, quantity, date)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, user_id, meal_kind, food_id, quantity, date
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.user_id)
    .bind(new.meal_kind)
    .bind(new.food_id)
    .bind(new.quantity)
    .bind(new.date)
    .fetch_one(db)
    .await?;
    Ok(entry)
}

/// All entries of a user, newest first, each with its food if it still exists.
pub async fn list_with_food(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<MealWithFood>> {
    let rows = sqlx::query_as::<_, MealEntryRow>(
        r#"
        SELECT m.id, m.user_id, m.meal_kind, m.food_id, m.quantity, m.date,
               CASE WHEN f.id IS NULL THEN NULL ELSE to_jsonb(f) END AS food
        FROM meal_entries m
        LEFT JOIN foods f ON f.id = m.food_id
        WHERE m.user_id = $1
        ORDER BY m.date DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(MealWithFood::from).collect())
}

/// Deletes one of the user's entries. Returns `false` when nothing matched.
pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM meal_entries WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
