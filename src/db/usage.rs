use serde::Serialize;
use sqlx::{FromRow, Pool, Sqlite};
use uuid::Uuid;

use crate::db::models::UsageRecord;
use crate::db::now_rfc3339;
use crate::error::AppError;

/// Input for one usage log row. Costs are computed by the caller; the DKK
/// amount is fixed at write time with the configured exchange rate.
#[derive(Debug, Default)]
pub struct NewUsageRecord {
    pub provider: &'static str,
    pub model: String,
    pub operation: &'static str,
    pub api_tier: Option<String>,
    pub audio_seconds: Option<f64>,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub images_generated: Option<i64>,
    pub image_resolution: Option<String>,
    pub cost_usd: f64,
    pub transcription_id: Option<String>,
    pub style_guide_id: Option<String>,
    pub image_generation_id: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OperationSummary {
    pub operation: String,
    pub count: i64,
    pub total_cost_usd: f64,
    pub total_cost_dkk: f64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MonthlySummary {
    pub month: String, // YYYY-MM
    pub count: i64,
    pub total_cost_usd: f64,
    pub total_cost_dkk: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct UsageTotals {
    pub count: i64,
    pub total_cost_usd: f64,
    pub total_cost_dkk: f64,
}

pub struct UsageRepository;

impl UsageRepository {
    pub async fn record(
        pool: &Pool<Sqlite>,
        user_id: &str,
        new: NewUsageRecord,
        usd_to_dkk: f64,
    ) -> Result<UsageRecord, AppError> {
        let id = Uuid::new_v4().to_string();
        let cost_dkk = new.cost_usd * usd_to_dkk;

        let row = sqlx::query_as::<_, UsageRecord>(
            r#"
INSERT INTO usage_records (
    id, user_id, provider, model, operation, api_tier,
    audio_seconds, input_tokens, output_tokens, images_generated, image_resolution,
    cost_usd, cost_dkk, transcription_id, style_guide_id, image_generation_id, created_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(new.provider)
        .bind(&new.model)
        .bind(new.operation)
        .bind(&new.api_tier)
        .bind(new.audio_seconds)
        .bind(new.input_tokens)
        .bind(new.output_tokens)
        .bind(new.images_generated)
        .bind(&new.image_resolution)
        .bind(new.cost_usd)
        .bind(cost_dkk)
        .bind(&new.transcription_id)
        .bind(&new.style_guide_id)
        .bind(&new.image_generation_id)
        .bind(now_rfc3339())
        .fetch_one(pool)
        .await?;

        Ok(row)
    }

    pub async fn list(
        pool: &Pool<Sqlite>,
        user_id: &str,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<UsageRecord>, AppError> {
        let rows = sqlx::query_as::<_, UsageRecord>(
            r#"
SELECT * FROM usage_records
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

        Ok(rows)
    }

    pub async fn totals(pool: &Pool<Sqlite>, user_id: &str) -> Result<UsageTotals, AppError> {
        let totals = sqlx::query_as::<_, UsageTotals>(
            r#"
SELECT COUNT(*) AS count,
       COALESCE(SUM(cost_usd), 0.0) AS total_cost_usd,
       COALESCE(SUM(cost_dkk), 0.0) AS total_cost_dkk
FROM usage_records
WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(totals)
    }

    pub async fn summary_by_operation(
        pool: &Pool<Sqlite>,
        user_id: &str,
    ) -> Result<Vec<OperationSummary>, AppError> {
        let rows = sqlx::query_as::<_, OperationSummary>(
            r#"
SELECT operation,
       COUNT(*) AS count,
       SUM(cost_usd) AS total_cost_usd,
       SUM(cost_dkk) AS total_cost_dkk
FROM usage_records
WHERE user_id = ?
GROUP BY operation
ORDER BY operation ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Rows grouped by calendar month (YYYY-MM prefix of the RFC 3339
    /// timestamp), newest month first.
    pub async fn summary_by_month(
        pool: &Pool<Sqlite>,
        user_id: &str,
    ) -> Result<Vec<MonthlySummary>, AppError> {
        let rows = sqlx::query_as::<_, MonthlySummary>(
            r#"
SELECT substr(created_at, 1, 7) AS month,
       COUNT(*) AS count,
       SUM(cost_usd) AS total_cost_usd,
       SUM(cost_dkk) AS total_cost_dkk
FROM usage_records
WHERE user_id = ?
GROUP BY month
ORDER BY month DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{test_pool, test_user};

    const RATE: f64 = 7.0;

    async fn record_cost(
        pool: &Pool<Sqlite>,
        user_id: &str,
        operation: &'static str,
        cost_usd: f64,
    ) -> UsageRecord {
        UsageRepository::record(
            pool,
            user_id,
            NewUsageRecord {
                provider: "gemini",
                model: "gemini-3-flash-preview".to_string(),
                operation,
                cost_usd,
                ..Default::default()
            },
            RATE,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_totals_zero_before_first_billable_call() {
        let pool = test_pool().await;
        let user = test_user(&pool, "alice").await;

        let totals = UsageRepository::totals(&pool, &user.id).await.unwrap();
        assert_eq!(totals.count, 0);
        assert_eq!(totals.total_cost_usd, 0.0);
        assert_eq!(totals.total_cost_dkk, 0.0);
    }

    #[tokio::test]
    async fn test_dkk_fixed_at_write_time() {
        let pool = test_pool().await;
        let user = test_user(&pool, "alice").await;

        let row = record_cost(&pool, &user.id, "process", 1.5).await;
        assert!((row.cost_dkk - 10.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_summary_by_operation() {
        let pool = test_pool().await;
        let user = test_user(&pool, "alice").await;

        record_cost(&pool, &user.id, "transcribe", 1.0).await;
        record_cost(&pool, &user.id, "transcribe", 2.0).await;
        record_cost(&pool, &user.id, "process", 5.0).await;

        let by_op = UsageRepository::summary_by_operation(&pool, &user.id)
            .await
            .unwrap();
        assert_eq!(by_op.len(), 2);

        let process = by_op.iter().find(|s| s.operation == "process").unwrap();
        let transcribe = by_op.iter().find(|s| s.operation == "transcribe").unwrap();
        assert_eq!(process.count, 1);
        assert_eq!(transcribe.count, 2);
        assert!((transcribe.total_cost_usd - 3.0).abs() < 1e-9);

        let totals = UsageRepository::totals(&pool, &user.id).await.unwrap();
        assert_eq!(totals.count, 3);
        assert!((totals.total_cost_usd - 8.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_month_totals_sum_to_grand_total() {
        let pool = test_pool().await;
        let user = test_user(&pool, "alice").await;

        record_cost(&pool, &user.id, "transcribe", 1.0).await;
        record_cost(&pool, &user.id, "process", 2.5).await;
        record_cost(&pool, &user.id, "generate_image", 0.134).await;

        let by_month = UsageRepository::summary_by_month(&pool, &user.id)
            .await
            .unwrap();
        let monthly_sum: f64 = by_month.iter().map(|m| m.total_cost_usd).sum();

        let totals = UsageRepository::totals(&pool, &user.id).await.unwrap();
        assert!((monthly_sum - totals.total_cost_usd).abs() < 1e-9);

        // All rows written just now fall into the current month
        assert_eq!(by_month.len(), 1);
        assert_eq!(by_month[0].count, 3);
        assert_eq!(by_month[0].month.len(), 7);
    }

    #[tokio::test]
    async fn test_usage_scoped_per_user() {
        let pool = test_pool().await;
        let alice = test_user(&pool, "alice").await;
        let bob = test_user(&pool, "bob").await;

        record_cost(&pool, &alice.id, "transcribe", 1.0).await;

        let bobs = UsageRepository::list(&pool, &bob.id, 0, 100).await.unwrap();
        assert!(bobs.is_empty());
        let totals = UsageRepository::totals(&pool, &bob.id).await.unwrap();
        assert_eq!(totals.count, 0);
    }
}
