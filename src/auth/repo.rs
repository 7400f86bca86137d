use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    auth::repo_types::{NewUser, User},
    error::AuthError,
};

/// Persistence of user accounts and their single refresh-token slot.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>>;

    /// Fails with [`AuthError::EmailTaken`] when the email already exists.
    async fn create(&self, user: NewUser) -> Result<User, AuthError>;

    /// Unconditionally overwrites the slot. `None` ends the session.
    async fn set_refresh_token_hash(&self, id: i64, hash: Option<&str>) -> anyhow::Result<()>;

    /// Replaces the slot only if it still holds `expected`. Returns whether
    /// the swap happened.
    async fn swap_refresh_token_hash(
        &self,
        id: i64,
        expected: &str,
        new: &str,
    ) -> anyhow::Result<bool>;
}

const USER_COLUMNS: &str =
    "id, email, password_hash, refresh_token_hash, name, created_at, updated_at";

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
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, AuthError> {
        let res = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, name)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(u) => Ok(u),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AuthError::EmailTaken),
            Err(e) => Err(AuthError::Internal(e.into())),
        }
    }

    async fn set_refresh_token_hash(&self, id: i64, hash: Option<&str>) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET refresh_token_hash = $2, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(hash)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn swap_refresh_token_hash(
        &self,
        id: i64,
        expected: &str,
        new: &str,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET refresh_token_hash = $3, updated_at = now()
             WHERE id = $1 AND refresh_token_hash = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(new)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }
}
