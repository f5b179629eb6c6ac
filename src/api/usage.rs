use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::transcriptions::ListQuery;
use crate::db::models::UsageRecord;
use crate::db::usage::{MonthlySummary, OperationSummary};
use crate::db::UsageRepository;
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct UsageSummaryResponse {
    pub total_cost_usd: f64,
    pub total_cost_dkk: f64,
    pub total_requests: i64,
    pub exchange_rate: f64,
    pub by_operation: Vec<OperationSummary>,
    pub by_month: Vec<MonthlySummary>,
}

/// GET /api/usage
pub async fn list(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<UsageRecord>>, AppError> {
    let skip = query.skip.max(0);
    let limit = query.limit.clamp(1, 500);

    let rows = UsageRepository::list(&state.db, &user_id, skip, limit).await?;
    Ok(Json(rows))
}

/// GET /api/usage/summary
pub async fn summary(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
) -> Result<Json<UsageSummaryResponse>, AppError> {
    let totals = UsageRepository::totals(&state.db, &user_id).await?;
    let by_operation = UsageRepository::summary_by_operation(&state.db, &user_id).await?;
    let by_month = UsageRepository::summary_by_month(&state.db, &user_id).await?;

    Ok(Json(UsageSummaryResponse {
        total_cost_usd: totals.total_cost_usd,
        total_cost_dkk: totals.total_cost_dkk,
        total_requests: totals.count,
        exchange_rate: state.config.usd_to_dkk,
        by_operation,
        by_month,
    }))
}
