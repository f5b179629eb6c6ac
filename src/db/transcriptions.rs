use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::db::models::Transcription;
use crate::db::now_rfc3339;
use crate::error::AppError;

pub struct TranscriptionRepository;

impl TranscriptionRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        user_id: &str,
        filename: Option<String>,
        duration_seconds: f64,
        raw_text: String,
    ) -> Result<Transcription, AppError> {
        let id = Uuid::new_v4().to_string();
        let now = now_rfc3339();

        let row = sqlx::query_as::<_, Transcription>(
            r#"
INSERT INTO transcriptions (id, user_id, filename, duration_seconds, raw_text, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&filename)
        .bind(duration_seconds)
        .bind(&raw_text)
        .bind(&now)
        .bind(&now)
        .fetch_one(pool)
        .await?;

        Ok(row)
    }

    /// Load by id, scoped to the owning user.
    pub async fn get(
        pool: &Pool<Sqlite>,
        id: &str,
        user_id: &str,
    ) -> Result<Option<Transcription>, AppError> {
        let row = sqlx::query_as::<_, Transcription>(
            "SELECT * FROM transcriptions WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    pub async fn list(
        pool: &Pool<Sqlite>,
        user_id: &str,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<Transcription>, i64), AppError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transcriptions WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(pool)
                .await?;

        let rows = sqlx::query_as::<_, Transcription>(
            r#"
SELECT * FROM transcriptions
WHERE user_id = ?
ORDER BY created_at DESC
LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(pool)
        .await?;

        Ok((rows, total))
    }

    pub async fn update_raw_text(
        pool: &Pool<Sqlite>,
        id: &str,
        user_id: &str,
        raw_text: &str,
    ) -> Result<Option<Transcription>, AppError> {
        let row = sqlx::query_as::<_, Transcription>(
            r#"
UPDATE transcriptions SET raw_text = ?, updated_at = ?
WHERE id = ? AND user_id = ?
RETURNING *
            "#,
        )
        .bind(raw_text)
        .bind(now_rfc3339())
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    /// Store the rewrite result. Prior instruction/processed_text are
    /// overwritten; usage rows are the only history kept.
    pub async fn set_processed(
        pool: &Pool<Sqlite>,
        id: &str,
        user_id: &str,
        instruction: &str,
        processed_text: &str,
    ) -> Result<Option<Transcription>, AppError> {
        let row = sqlx::query_as::<_, Transcription>(
            r#"
UPDATE transcriptions SET instruction = ?, processed_text = ?, updated_at = ?
WHERE id = ? AND user_id = ?
RETURNING *
            "#,
        )
        .bind(instruction)
        .bind(processed_text)
        .bind(now_rfc3339())
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    pub async fn set_audio_path(
        pool: &Pool<Sqlite>,
        id: &str,
        user_id: &str,
        audio_path: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE transcriptions SET audio_path = ?, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(audio_path)
        .bind(now_rfc3339())
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Returns true when a row was deleted.
    pub async fn delete(pool: &Pool<Sqlite>, id: &str, user_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM transcriptions WHERE id = ? AND user_id = ?")
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

    #[tokio::test]
    async fn test_raw_text_round_trip() {
        let pool = test_pool().await;
        let user = test_user(&pool, "alice").await;

        let t = TranscriptionRepository::create(
            &pool,
            &user.id,
            Some("memo.m4a".to_string()),
            12.5,
            "original words".to_string(),
        )
        .await
        .unwrap();

        TranscriptionRepository::update_raw_text(&pool, &t.id, &user.id, "X")
            .await
            .unwrap()
            .unwrap();

        let fetched = TranscriptionRepository::get(&pool, &t.id, &user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.raw_text, "X");
    }

    #[tokio::test]
    async fn test_process_does_not_touch_raw_text() {
        let pool = test_pool().await;
        let user = test_user(&pool, "alice").await;

        let t = TranscriptionRepository::create(&pool, &user.id, None, 0.0, "raw".to_string())
            .await
            .unwrap();

        let updated =
            TranscriptionRepository::set_processed(&pool, &t.id, &user.id, "summarize", "short")
                .await
                .unwrap()
                .unwrap();

        assert_eq!(updated.raw_text, "raw");
        assert_eq!(updated.processed_text.as_deref(), Some("short"));
        assert_eq!(updated.instruction.as_deref(), Some("summarize"));
    }

    #[tokio::test]
    async fn test_clear_audio_keeps_text() {
        let pool = test_pool().await;
        let user = test_user(&pool, "alice").await;

        let t = TranscriptionRepository::create(&pool, &user.id, None, 0.0, "keep me".to_string())
            .await
            .unwrap();
        TranscriptionRepository::set_audio_path(&pool, &t.id, &user.id, Some("/tmp/a.m4a"))
            .await
            .unwrap();
        TranscriptionRepository::set_audio_path(&pool, &t.id, &user.id, None)
            .await
            .unwrap();

        let fetched = TranscriptionRepository::get(&pool, &t.id, &user.id)
            .await
            .unwrap()
            .unwrap();
        assert!(fetched.audio_path.is_none());
        assert_eq!(fetched.raw_text, "keep me");
    }

    #[tokio::test]
    async fn test_ownership_isolation() {
        let pool = test_pool().await;
        let alice = test_user(&pool, "alice").await;
        let bob = test_user(&pool, "bob").await;

        let t = TranscriptionRepository::create(&pool, &alice.id, None, 0.0, "secret".to_string())
            .await
            .unwrap();

        assert!(TranscriptionRepository::get(&pool, &t.id, &bob.id)
            .await
            .unwrap()
            .is_none());
        assert!(
            TranscriptionRepository::update_raw_text(&pool, &t.id, &bob.id, "hax")
                .await
                .unwrap()
                .is_none()
        );
        assert!(!TranscriptionRepository::delete(&pool, &t.id, &bob.id)
            .await
            .unwrap());
    }
}
