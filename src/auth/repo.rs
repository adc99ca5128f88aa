use crate::auth::repo_types::{NewUser, PublicUser, User, UserSummary};
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, email, password_hash, provider, provider_id, role, allergens, avatar, created_at";

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_provider(
        db: &PgPool,
        provider: &str,
        provider_id: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE provider = $1 AND provider_id = $2"
        ))
        .bind(provider)
        .bind(provider_id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Insert a new account.
    pub async fn create(db: &PgPool, new: NewUser<'_>) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, provider, provider_id, role, avatar)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.name)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.provider)
        .bind(new.provider_id)
        .bind(new.role)
        .bind(new.avatar)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Attach an OAuth identity to an existing account.
    pub async fn link_provider(
        db: &PgPool,
        id: Uuid,
        provider: &str,
        provider_id: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET provider = $2, provider_id = $3
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(provider)
        .bind(provider_id)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Applies a partial profile update. Returns `None` if the user is gone.
    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        name: Option<&str>,
        password_hash: Option<&str>,
        avatar: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   password_hash = COALESCE($3, password_hash),
                   avatar = COALESCE($4, avatar)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(name)
        .bind(password_hash)
        .bind(avatar)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn set_allergens(db: &PgPool, id: Uuid, allergens: &[String]) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET allergens = $2 WHERE id = $1")
            .bind(id)
            .bind(allergens)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Returns `false` when no row matched.
    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn list_public(db: &PgPool) -> anyhow::Result<Vec<PublicUser>> {
        let rows = sqlx::query_as::<_, PublicUser>(
            "SELECT id, name, email, avatar, role, allergens FROM users ORDER BY name",
        )
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn summaries(db: &PgPool, ids: &[Uuid]) -> anyhow::Result<Vec<UserSummary>> {
        let rows = sqlx::query_as::<_, UserSummary>(
            "SELECT id, name, email FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// How many of `ids` exist.
    pub async fn count_existing(db: &PgPool, ids: &[Uuid]) -> anyhow::Result<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_one(db)
            .await?;
        Ok(n)
    }
}
