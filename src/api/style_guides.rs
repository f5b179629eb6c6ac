use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::api::state::AppState;
use crate::cost;
use crate::db::models::StyleGuide;
use crate::db::{NewUsageRecord, StyleGuideRepository, UsageRepository};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub name: String,
    pub description: Option<String>,
    pub examples: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub examples: Option<String>,
    pub guide_content: Option<String>,
}

/// GET /api/settings/style-guides
pub async fn list(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
) -> Result<Json<Vec<StyleGuide>>, AppError> {
    let guides = StyleGuideRepository::list(&state.db, &user_id).await?;
    Ok(Json(guides))
}

/// POST /api/settings/style-guides
pub async fn create(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Json(req): Json<CreateRequest>,
) -> Result<Json<StyleGuide>, AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name must not be empty".to_string()));
    }

    let guide =
        StyleGuideRepository::create(&state.db, &user_id, name, req.description, req.examples)
            .await?;

    Ok(Json(guide))
}

/// GET /api/settings/style-guides/{id}
pub async fn get(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Path(id): Path<String>,
) -> Result<Json<StyleGuide>, AppError> {
    let guide = StyleGuideRepository::get(&state.db, &id, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Style guide not found".to_string()))?;

    Ok(Json(guide))
}

/// PUT /api/settings/style-guides/{id}
pub async fn update(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<StyleGuide>, AppError> {
    let guide = StyleGuideRepository::update(
        &state.db,
        &id,
        &user_id,
        req.name,
        req.description,
        req.examples,
        req.guide_content,
    )
    .await?
    .ok_or_else(|| AppError::NotFound("Style guide not found".to_string()))?;

    Ok(Json(guide))
}

/// DELETE /api/settings/style-guides/{id}
pub async fn delete(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = StyleGuideRepository::delete(&state.db, &id, &user_id).await?;
    if !deleted {
        return Err(AppError::NotFound("Style guide not found".to_string()));
    }

    Ok(Json(serde_json::json!({"status": "deleted"})))
}

/// POST /api/settings/style-guides/{id}/generate
///
/// Derive guide_content from the user's example texts.
pub async fn generate(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Path(id): Path<String>,
) -> Result<Json<StyleGuide>, AppError> {
    let guide = StyleGuideRepository::get(&state.db, &id, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Style guide not found".to_string()))?;

    let examples = guide
        .examples
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| {
            AppError::Validation("Style guide has no example texts to learn from".to_string())
        })?;

    let mut prompt = String::from(
        "Analyse the example texts below and write a concise style guide that \
         captures their tone, vocabulary, sentence structure and formatting. \
         The guide will be used to rewrite other texts in the same style.\n",
    );
    if let Some(description) = guide.description.as_deref().filter(|d| !d.trim().is_empty()) {
        prompt.push_str(&format!("\nKind of text: {}\n", description));
    }
    prompt.push_str(&format!("\nExample texts:\n{}\n", examples));

    let output = state.text.generate(&prompt, None, 0.4, 2000).await?;

    let updated = StyleGuideRepository::set_guide_content(&state.db, &id, &user_id, &output.text)
        .await?
        .ok_or_else(|| AppError::NotFound("Style guide not found".to_string()))?;

    UsageRepository::record(
        &state.db,
        &user_id,
        NewUsageRecord {
            provider: "gemini",
            model: state.config.gemini_model.clone(),
            operation: "generate_style",
            api_tier: Some(output.tier.as_str().to_string()),
            input_tokens: Some(output.input_tokens),
            output_tokens: Some(output.output_tokens),
            cost_usd: cost::text_generation_cost(output.input_tokens, output.output_tokens),
            style_guide_id: Some(id),
            ..Default::default()
        },
        state.config.usd_to_dkk,
    )
    .await?;

    Ok(Json(updated))
}

/// PUT /api/settings/style-guides/{id}/default
pub async fn set_default(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Path(id): Path<String>,
) -> Result<Json<StyleGuide>, AppError> {
    let guide = StyleGuideRepository::set_default(&state.db, &id, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Style guide not found".to_string()))?;

    Ok(Json(guide))
}
