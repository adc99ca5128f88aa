use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::HistoryItem;

/// Appends one entry stamped with the current time.
pub async fn append(db: &PgPool, kind: &str, value_id: Uuid, user_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO history_entries (id, kind, value_id, user_id, timestamp)
        VALUES ($1, $2, $3, $4, now())
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(kind)
    .bind(value_id)
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn list_for_user(
    db: &PgPool,
    user_id: Uuid,
    kind: &str,
) -> anyhow::Result<Vec<HistoryItem>> {
    let rows = sqlx::query_as::<_, HistoryItem>(
        r#"
        SELECT h.id, h.kind, h.value_id, h.user_id, h.timestamp, f.product_name
        FROM history_entries h
        LEFT JOIN foods f ON f.id = h.value_id
        WHERE h.user_id = $1 AND h.kind = $2
        ORDER BY h.timestamp DESC
        "#,
    )
    .bind(user_id)
    .bind(kind)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
