use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::db::models::ImageGeneration;
use crate::db::now_rfc3339;
use crate::error::AppError;

pub struct NewImageGeneration {
    pub user_id: String,
    pub prompt: String,
    pub image_data: Vec<u8>,
    pub image_mime_type: String,
    pub text_response: Option<String>,
    pub continuation_token: Option<String>,
    pub turn_number: i64,
    pub parent_id: Option<String>,
    pub transcription_id: Option<String>,
}

pub struct ImageRepository;

impl ImageRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        new: NewImageGeneration,
    ) -> Result<ImageGeneration, AppError> {
        let id = Uuid::new_v4().to_string();

        let row = sqlx::query_as::<_, ImageGeneration>(
            r#"
INSERT INTO image_generations (
    id, user_id, prompt, image_data, image_mime_type, text_response,
    continuation_token, turn_number, parent_id, transcription_id, created_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&new.user_id)
        .bind(&new.prompt)
        .bind(&new.image_data)
        .bind(&new.image_mime_type)
        .bind(&new.text_response)
        .bind(&new.continuation_token)
        .bind(new.turn_number)
        .bind(&new.parent_id)
        .bind(&new.transcription_id)
        .bind(now_rfc3339())
        .fetch_one(pool)
        .await?;

        Ok(row)
    }

    pub async fn get(
        pool: &Pool<Sqlite>,
        id: &str,
        user_id: &str,
    ) -> Result<Option<ImageGeneration>, AppError> {
        let row = sqlx::query_as::<_, ImageGeneration>(
            "SELECT * FROM image_generations WHERE id = ? AND user_id = ?",
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
    ) -> Result<(Vec<ImageGeneration>, i64), AppError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM image_generations WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(pool)
                .await?;

        let rows = sqlx::query_as::<_, ImageGeneration>(
            r#"
SELECT * FROM image_generations
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

    /// Flat set of generations linked to a transcription, newest first.
    pub async fn list_by_transcription(
        pool: &Pool<Sqlite>,
        user_id: &str,
        transcription_id: &str,
    ) -> Result<Vec<ImageGeneration>, AppError> {
        let rows = sqlx::query_as::<_, ImageGeneration>(
            r#"
SELECT * FROM image_generations
WHERE user_id = ? AND transcription_id = ?
ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(transcription_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Walk the parent chain from `id` up to the root and return it in
    /// chronological (root-first) order. Rows reference parents by id only,
    /// so the walk is a sequence of point lookups.
    pub async fn chain(
        pool: &Pool<Sqlite>,
        id: &str,
        user_id: &str,
    ) -> Result<Vec<ImageGeneration>, AppError> {
        let mut chain = Vec::new();
        let mut current = Some(id.to_string());

        while let Some(current_id) = current {
            let Some(row) = Self::get(pool, &current_id, user_id).await? else {
                break;
            };
            current = row.parent_id.clone();
            chain.push(row);
        }

        chain.reverse();
        Ok(chain)
    }

    pub async fn delete(pool: &Pool<Sqlite>, id: &str, user_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM image_generations WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
