use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::{NewUser, User};

#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &NewUser) -> DbResult<User>;
    async fn find_by_email(&self, email: &str) -> DbResult<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> DbResult<User>;
    /// Registra o horário do último login
    async fn record_login(&self, id: Uuid) -> DbResult<()>;
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: &NewUser) -> DbResult<User> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, phone, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(&user.phone)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(user_id = %id, "usuário criado");
        self.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Usuário não encontrado"))
    }

    async fn record_login(&self, id: Uuid) -> DbResult<()> {
        let now = Utc::now();
        sqlx::query("UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_ROLE;
    use crate::repositories::fixtures::test_pool;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ana Souza".into(),
            email: email.into(),
            password_hash: "$argon2id$fake".into(),
            role: DEFAULT_ROLE.into(),
            phone: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let (_dir, pool) = test_pool().await;
        let repo = SqliteUserRepository::new(pool);

        let user = repo.create(&new_user("ana@psygrow.com.br")).await.unwrap();
        assert!(user.is_active);
        assert_eq!(user.role, "professional");
        assert!(user.last_login_at.is_none());

        let found = repo.find_by_email("ana@psygrow.com.br").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
        assert!(repo.find_by_email("outro@psygrow.com.br").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_constraint_violation() {
        let (_dir, pool) = test_pool().await;
        let repo = SqliteUserRepository::new(pool);

        repo.create(&new_user("dup@psygrow.com.br")).await.unwrap();
        let err = repo.create(&new_user("dup@psygrow.com.br")).await.unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_record_login_sets_timestamp() {
        let (_dir, pool) = test_pool().await;
        let repo = SqliteUserRepository::new(pool);

        let user = repo.create(&new_user("login@psygrow.com.br")).await.unwrap();
        repo.record_login(user.id).await.unwrap();
        let user = repo.find_by_id(user.id).await.unwrap();
        assert!(user.last_login_at.is_some());
    }
}
