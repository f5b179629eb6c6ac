use axum::{
    extract::{Path, Query, State},
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::state::AppState;
use crate::api::transcriptions::ListQuery;
use crate::cost;
use crate::db::models::ImageGeneration;
use crate::db::{
    ImageRepository, NewImageGeneration, NewUsageRecord, TranscriptionRepository, UsageRepository,
};
use crate::error::AppError;
use crate::providers::image::HistoryTurn;
use crate::providers::ImageRequest;

const ASPECT_RATIOS: &[&str] = &["1:1", "16:9", "9:16", "4:3", "3:4"];
const RESOLUTIONS: &[&str] = &["1k", "2k", "4k"];

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    /// Parent generation to continue editing from.
    pub session_id: Option<String>,
    pub transcription_id: Option<String>,
    pub aspect_ratio: Option<String>,
    pub resolution: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    #[serde(flatten)]
    pub generation: ImageGeneration,
    pub image_url: String,
}

impl From<ImageGeneration> for ImageResponse {
    fn from(generation: ImageGeneration) -> Self {
        let image_url = format!("/api/images/{}/data", generation.id);
        ImageResponse {
            generation,
            image_url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImageListResponse {
    pub items: Vec<ImageResponse>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

/// POST /api/images/generate
pub async fn generate(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<ImageResponse>, AppError> {
    let prompt = req.prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::Validation("Prompt must not be empty".to_string()));
    }

    let aspect_ratio = req.aspect_ratio.unwrap_or_else(|| "1:1".to_string());
    if !ASPECT_RATIOS.contains(&aspect_ratio.as_str()) {
        return Err(AppError::Validation(format!(
            "Aspect ratio must be one of {}",
            ASPECT_RATIOS.join(", ")
        )));
    }

    let resolution = req
        .resolution
        .map(|r| r.to_lowercase())
        .unwrap_or_else(|| "2k".to_string());
    if !RESOLUTIONS.contains(&resolution.as_str()) {
        return Err(AppError::Validation(format!(
            "Resolution must be one of {}",
            RESOLUTIONS.join(", ")
        )));
    }

    // Ownership check on the optional transcription link
    if let Some(transcription_id) = &req.transcription_id {
        TranscriptionRepository::get(&state.db, transcription_id, &user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Transcription not found".to_string()))?;
    }

    // Continuing an edit chain: replay the ancestry as provider context
    let (history, parent_id, turn_number) = match &req.session_id {
        Some(parent_id) => {
            let chain = ImageRepository::chain(&state.db, parent_id, &user_id).await?;
            let parent = chain
                .last()
                .ok_or_else(|| AppError::NotFound("Image generation not found".to_string()))?;
            let turn_number = parent.turn_number + 1;

            let history = chain
                .iter()
                .map(|row| HistoryTurn {
                    prompt: row.prompt.clone(),
                    image_data: row.image_data.clone(),
                    image_mime_type: row.image_mime_type.clone(),
                    continuation_token: row.continuation_token.clone(),
                })
                .collect();

            (history, Some(parent_id.clone()), turn_number)
        }
        None => (Vec::new(), None, 1),
    };

    let output = state
        .image
        .generate(&ImageRequest {
            prompt: prompt.to_string(),
            aspect_ratio,
            resolution: resolution.clone(),
            history,
        })
        .await?;

    let row = ImageRepository::create(
        &state.db,
        NewImageGeneration {
            user_id: user_id.clone(),
            prompt: prompt.to_string(),
            image_data: output.image_data,
            image_mime_type: output.image_mime_type,
            text_response: output.text_response,
            continuation_token: output.continuation_token,
            turn_number,
            parent_id,
            transcription_id: req.transcription_id,
        },
    )
    .await?;

    UsageRepository::record(
        &state.db,
        &user_id,
        NewUsageRecord {
            provider: "gemini",
            model: state.config.image_model.clone(),
            operation: "generate_image",
            api_tier: Some(output.tier.as_str().to_string()),
            input_tokens: Some(output.input_tokens),
            output_tokens: Some(output.output_tokens),
            images_generated: Some(output.images_generated),
            image_resolution: Some(resolution.clone()),
            cost_usd: cost::image_generation_cost(
                output.input_tokens,
                output.output_tokens,
                output.images_generated,
                &resolution,
            ),
            image_generation_id: Some(row.id.clone()),
            ..Default::default()
        },
        state.config.usd_to_dkk,
    )
    .await?;

    info!(id = %row.id, turn = turn_number, "image generated");

    Ok(Json(row.into()))
}

/// GET /api/images
pub async fn list(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ImageListResponse>, AppError> {
    let skip = query.skip.max(0);
    let limit = query.limit.clamp(1, 200);

    let (rows, total) = ImageRepository::list(&state.db, &user_id, skip, limit).await?;

    Ok(Json(ImageListResponse {
        items: rows.into_iter().map(Into::into).collect(),
        total,
        skip,
        limit,
    }))
}

/// GET /api/images/{id}
pub async fn get(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Path(id): Path<String>,
) -> Result<Json<ImageResponse>, AppError> {
    let row = ImageRepository::get(&state.db, &id, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Image generation not found".to_string()))?;

    Ok(Json(row.into()))
}

/// GET /api/images/{id}/data
pub async fn get_data(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let row = ImageRepository::get(&state.db, &id, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Image generation not found".to_string()))?;

    let data = row
        .image_data
        .ok_or_else(|| AppError::NotFound("Image has no stored data".to_string()))?;
    let mime = row
        .image_mime_type
        .unwrap_or_else(|| "image/png".to_string());

    Ok(([(CONTENT_TYPE, mime)], data))
}

/// GET /api/images/transcription/{id}
pub async fn list_by_transcription(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ImageResponse>>, AppError> {
    let rows = ImageRepository::list_by_transcription(&state.db, &user_id, &id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// DELETE /api/images/{id}
///
/// Descendant edits reference the deleted row and go with it.
pub async fn delete(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = ImageRepository::delete(&state.db, &id, &user_id).await?;
    if !deleted {
        return Err(AppError::NotFound("Image generation not found".to_string()));
    }

    Ok(Json(serde_json::json!({"status": "deleted"})))
}
