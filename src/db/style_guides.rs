use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::db::models::StyleGuide;
use crate::db::now_rfc3339;
use crate::error::AppError;

pub struct StyleGuideRepository;

impl StyleGuideRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        user_id: &str,
        name: &str,
        description: Option<String>,
        examples: Option<String>,
    ) -> Result<StyleGuide, AppError> {
        let id = Uuid::new_v4().to_string();
        let now = now_rfc3339();

        let guide = sqlx::query_as::<_, StyleGuide>(
            r#"
INSERT INTO style_guides (id, user_id, name, description, examples, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(name)
        .bind(&description)
        .bind(&examples)
        .bind(&now)
        .bind(&now)
        .fetch_one(pool)
        .await?;

        Ok(guide)
    }

    pub async fn get(
        pool: &Pool<Sqlite>,
        id: &str,
        user_id: &str,
    ) -> Result<Option<StyleGuide>, AppError> {
        let guide = sqlx::query_as::<_, StyleGuide>(
            "SELECT * FROM style_guides WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(guide)
    }

    /// Default guide first, then alphabetical.
    pub async fn list(pool: &Pool<Sqlite>, user_id: &str) -> Result<Vec<StyleGuide>, AppError> {
        let guides = sqlx::query_as::<_, StyleGuide>(
            "SELECT * FROM style_guides WHERE user_id = ? ORDER BY is_default DESC, name ASC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(guides)
    }

    pub async fn update(
        pool: &Pool<Sqlite>,
        id: &str,
        user_id: &str,
        name: Option<String>,
        description: Option<String>,
        examples: Option<String>,
        guide_content: Option<String>,
    ) -> Result<Option<StyleGuide>, AppError> {
        let guide = sqlx::query_as::<_, StyleGuide>(
            r#"
UPDATE style_guides SET
    name = COALESCE(?, name),
    description = COALESCE(?, description),
    examples = COALESCE(?, examples),
    guide_content = COALESCE(?, guide_content),
    updated_at = ?
WHERE id = ? AND user_id = ?
RETURNING *
            "#,
        )
        .bind(&name)
        .bind(&description)
        .bind(&examples)
        .bind(&guide_content)
        .bind(now_rfc3339())
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(guide)
    }

    pub async fn set_guide_content(
        pool: &Pool<Sqlite>,
        id: &str,
        user_id: &str,
        guide_content: &str,
    ) -> Result<Option<StyleGuide>, AppError> {
        let guide = sqlx::query_as::<_, StyleGuide>(
            r#"
UPDATE style_guides SET guide_content = ?, updated_at = ?
WHERE id = ? AND user_id = ?
RETURNING *
            "#,
        )
        .bind(guide_content)
        .bind(now_rfc3339())
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(guide)
    }

    /// Mark one guide as the user's default. A single UPDATE flips the flag
    /// for every guide of the user at once, so two concurrent calls can never
    /// leave two defaults. Returns the target guide, None if not owned.
    pub async fn set_default(
        pool: &Pool<Sqlite>,
        id: &str,
        user_id: &str,
    ) -> Result<Option<StyleGuide>, AppError> {
        if Self::get(pool, id, user_id).await?.is_none() {
            return Ok(None);
        }

        sqlx::query(
            r#"
UPDATE style_guides
SET is_default = CASE WHEN id = ? THEN 1 ELSE 0 END, updated_at = ?
WHERE user_id = ?
            "#,
        )
        .bind(id)
        .bind(now_rfc3339())
        .bind(user_id)
        .execute(pool)
        .await?;

        Self::get(pool, id, user_id).await
    }

    pub async fn delete(pool: &Pool<Sqlite>, id: &str, user_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM style_guides WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{test_pool, test_user};

    async fn count_defaults(pool: &Pool<Sqlite>, user_id: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM style_guides WHERE user_id = ? AND is_default = 1")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_at_most_one_default() {
        let pool = test_pool().await;
        let user = test_user(&pool, "alice").await;

        let a = StyleGuideRepository::create(&pool, &user.id, "Formal", None, None)
            .await
            .unwrap();
        let b = StyleGuideRepository::create(&pool, &user.id, "Casual", None, None)
            .await
            .unwrap();
        let c = StyleGuideRepository::create(&pool, &user.id, "Posts", None, None)
            .await
            .unwrap();

        for target in [&a, &b, &c, &b] {
            let updated = StyleGuideRepository::set_default(&pool, &target.id, &user.id)
                .await
                .unwrap()
                .unwrap();
            assert!(updated.is_default);
            assert_eq!(count_defaults(&pool, &user.id).await, 1);
        }

        let fetched_b = StyleGuideRepository::get(&pool, &b.id, &user.id)
            .await
            .unwrap()
            .unwrap();
        assert!(fetched_b.is_default);
    }

    #[tokio::test]
    async fn test_default_scoped_per_user() {
        let pool = test_pool().await;
        let alice = test_user(&pool, "alice").await;
        let bob = test_user(&pool, "bob").await;

        let a = StyleGuideRepository::create(&pool, &alice.id, "Mine", None, None)
            .await
            .unwrap();
        let b = StyleGuideRepository::create(&pool, &bob.id, "His", None, None)
            .await
            .unwrap();

        StyleGuideRepository::set_default(&pool, &a.id, &alice.id)
            .await
            .unwrap();
        StyleGuideRepository::set_default(&pool, &b.id, &bob.id)
            .await
            .unwrap();

        assert_eq!(count_defaults(&pool, &alice.id).await, 1);
        assert_eq!(count_defaults(&pool, &bob.id).await, 1);

        // Bob cannot set a default on Alice's guide
        assert!(StyleGuideRepository::set_default(&pool, &a.id, &bob.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_partial_update() {
        let pool = test_pool().await;
        let user = test_user(&pool, "alice").await;

        let g = StyleGuideRepository::create(
            &pool,
            &user.id,
            "Articles",
            Some("Long form".to_string()),
            None,
        )
        .await
        .unwrap();

        let updated = StyleGuideRepository::update(
            &pool,
            &g.id,
            &user.id,
            None,
            None,
            Some("example one".to_string()),
            None,
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.name, "Articles");
        assert_eq!(updated.description.as_deref(), Some("Long form"));
        assert_eq!(updated.examples.as_deref(), Some("example one"));
    }
}
