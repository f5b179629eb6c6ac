use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::db::models::User;
use crate::db::now_rfc3339;
use crate::error::AppError;

pub struct UserRepository;

impl UserRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        username: String,
        password_hash: &str,
        email: Option<String>,
    ) -> Result<User, AppError> {
        let id = Uuid::new_v4().to_string();
        let created_at = now_rfc3339();

        let user = sqlx::query_as::<_, User>(
            r#"
INSERT INTO users (id, username, password_hash, email, created_at)
VALUES (?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&username)
        .bind(password_hash)
        .bind(&email)
        .bind(&created_at)
        .fetch_one(pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("Username or email is already in use".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(user)
    }

    pub async fn get_by_username(
        pool: &Pool<Sqlite>,
        username: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    pub async fn get_by_email(pool: &Pool<Sqlite>, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    pub async fn get_by_id(pool: &Pool<Sqlite>, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_pool;

    #[tokio::test]
    async fn test_create_and_fetch() {
        let pool = test_pool().await;

        let user = UserRepository::create(&pool, "alice".to_string(), "hash", None)
            .await
            .unwrap();

        let fetched = UserRepository::get_by_username(&pool, "alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.id, user.id);
        assert_eq!(fetched.password_hash, "hash");
    }

    #[tokio::test]
    async fn test_duplicate_username_is_conflict() {
        let pool = test_pool().await;

        UserRepository::create(&pool, "alice".to_string(), "h1", None)
            .await
            .unwrap();
        let err = UserRepository::create(&pool, "alice".to_string(), "h2", None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
    }
}
