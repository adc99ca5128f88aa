use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::Group;

pub async fn create(db: &PgPool, coach_id: Uuid, name: &str) -> anyhow::Result<Group> {
    let group = sqlx::query_as::<_, Group>(
        r#"
        INSERT INTO chat_groups (id, coach_id, members, name)
        VALUES ($1, $2, '{}', $3)
        RETURNING id, coach_id, members, name, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(coach_id)
    .bind(name)
    .fetch_one(db)
    .await?;
    Ok(group)
}

pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Group>> {
    let group = sqlx::query_as::<_, Group>(
        "SELECT id, coach_id, members, name, created_at FROM chat_groups WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(group)
}

/// Appends `added` to the member list in one statement, skipping ids that
/// are already members at write time. `None` when the group is gone.
pub async fn add_members(db: &PgPool, id: Uuid, added: &[Uuid]) -> anyhow::Result<Option<Group>> {
    let group = sqlx::query_as::<_, Group>(
        r#"
        UPDATE chat_groups
        SET members = members || ARRAY(
            SELECT t.m
            FROM unnest($2::uuid[]) WITH ORDINALITY AS t(m, ord)
            WHERE t.m <> ALL(chat_groups.members)
            ORDER BY t.ord
        )
        WHERE id = $1
        RETURNING id, coach_id, members, name, created_at
        "#,
    )
    .bind(id)
    .bind(added)
    .fetch_optional(db)
    .await?;
    Ok(group)
}

/// Drops `user_id` from the member list. `None` when the group is gone or
/// the user was no longer a member.
pub async fn remove_member(db: &PgPool, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Group>> {
    let group = sqlx::query_as::<_, Group>(
        r#"
        UPDATE chat_groups
        SET members = array_remove(members, $2)
        WHERE id = $1 AND $2 = ANY(members)
        RETURNING id, coach_id, members, name, created_at
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(group)
}

/// Deletes the group and its messages.
pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let mut tx = db.begin().await?;
    sqlx::query("DELETE FROM chat_messages WHERE group_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let res = sqlx::query("DELETE FROM chat_groups WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(res.rows_affected() > 0)
}
