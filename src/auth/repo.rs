use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewUser, User};

/// Account persistence. Handlers only see this trait so tests can swap in memory.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by (lowercased) email.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    /// Insert a user. Returns `None` when the email is already taken.
    async fn create(&self, new: NewUser<'_>) -> anyhow::Result<Option<User>>;

    /// Rename a user. Returns `None` when the id is unknown.
    async fn update_name(&self, id: Uuid, name: &str) -> anyhow::Result<Option<User>>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn create(&self, new: NewUser<'_>) -> anyhow::Result<Option<User>> {
        // The unique index on email settles registration races.
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, name, email, password_hash, role, created_at
            "#,
        )
        .bind(new.name)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.role.as_str())
        .fetch_optional(&self.db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    async fn update_name(&self, id: Uuid, name: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET name = $2
            WHERE id = $1
            RETURNING id, name, email, password_hash, role, created_at
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.db)
        .await
        .context("update user name")?;
        Ok(user)
    }
}
