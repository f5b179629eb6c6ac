use std::path::{Path as FsPath, PathBuf};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

use crate::api::state::AppState;
use crate::config::ALLOWED_AUDIO_EXTENSIONS;
use crate::cost;
use crate::db::models::Transcription;
use crate::db::{
    NewUsageRecord, StyleGuideRepository, TranscriptionRepository, UsageRepository,
};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct TranscriptionResponse {
    #[serde(flatten)]
    pub transcription: Transcription,
    pub duration_formatted: String,
    pub has_audio: bool,
}

impl From<Transcription> for TranscriptionResponse {
    fn from(transcription: Transcription) -> Self {
        let duration_formatted = format_duration(transcription.duration_seconds);
        let has_audio = transcription.audio_path.is_some();
        TranscriptionResponse {
            transcription,
            duration_formatted,
            has_audio,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TranscriptionListResponse {
    pub items: Vec<TranscriptionResponse>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub raw_text: String,
}

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub instruction: String,
    pub style_guide_id: Option<String>,
}

/// MM:SS, rounded down to whole seconds.
fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as i64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Lowercased extension with the leading dot, e.g. ".m4a".
fn file_extension(filename: &str) -> Option<String> {
    let dot = filename.rfind('.')?;
    Some(filename[dot..].to_lowercase())
}

fn media_type_for_extension(ext: &str) -> &'static str {
    match ext {
        ".mp3" => "audio/mpeg",
        ".wav" => "audio/wav",
        ".ogg" => "audio/ogg",
        ".webm" => "audio/webm",
        ".mp4" => "audio/mp4",
        ".aac" => "audio/aac",
        ".flac" => "audio/flac",
        _ => "audio/mp4", // .m4a and anything unrecognized
    }
}

fn audio_file_path(audio_dir: &FsPath, user_id: &str, id: &str, ext: &str) -> PathBuf {
    audio_dir.join(user_id).join(format!("{}{}", id, ext))
}

/// POST /api/transcribe
pub async fn transcribe(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    mut multipart: Multipart,
) -> Result<Json<TranscriptionResponse>, AppError> {
    let mut filename = None;
    let mut audio = None;
    let mut context = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                filename = field.file_name().map(|name| name.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read upload: {}", e)))?;
                audio = Some(data.to_vec());
            }
            Some("context") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid context field: {}", e)))?;
                if !value.trim().is_empty() {
                    context = Some(value);
                }
            }
            _ => {}
        }
    }

    let audio = audio.ok_or_else(|| AppError::Validation("Missing file field".to_string()))?;
    let filename =
        filename.ok_or_else(|| AppError::Validation("Upload has no filename".to_string()))?;

    let ext = file_extension(&filename)
        .filter(|ext| ALLOWED_AUDIO_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| {
            AppError::Validation(format!(
                "Unsupported audio format; expected one of {}",
                ALLOWED_AUDIO_EXTENSIONS.join(", ")
            ))
        })?;

    if audio.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }
    if audio.len() > state.config.max_upload_bytes {
        return Err(AppError::Validation(format!(
            "File exceeds the {} byte upload limit",
            state.config.max_upload_bytes
        )));
    }

    let transcript = state
        .speech
        .transcribe(&filename, audio.clone(), context.as_deref())
        .await?;

    let row = TranscriptionRepository::create(
        &state.db,
        &user_id,
        Some(filename),
        transcript.duration_seconds,
        transcript.text,
    )
    .await?;

    // Keep the original audio on disk so it can be replayed later
    let path = audio_file_path(&state.config.audio_dir, &user_id, &row.id, &ext);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, &audio).await?;
    let path_str = path.to_string_lossy();
    TranscriptionRepository::set_audio_path(&state.db, &row.id, &user_id, Some(path_str.as_ref()))
        .await?;

    UsageRepository::record(
        &state.db,
        &user_id,
        transcribe_usage(
            state.config.whisper_model.clone(),
            transcript.duration_seconds,
            row.id.clone(),
        ),
        state.config.usd_to_dkk,
    )
    .await?;

    info!(id = %row.id, duration = transcript.duration_seconds, "transcription created");

    // Re-read so the response carries the audio path
    let row = TranscriptionRepository::get(&state.db, &row.id, &user_id)
        .await?
        .ok_or_else(|| AppError::Internal("Transcription vanished after insert".to_string()))?;

    Ok(Json(row.into()))
}

/// GET /api/transcriptions
pub async fn list(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<TranscriptionListResponse>, AppError> {
    let skip = query.skip.max(0);
    let limit = query.limit.clamp(1, 200);

    let (rows, total) = TranscriptionRepository::list(&state.db, &user_id, skip, limit).await?;

    Ok(Json(TranscriptionListResponse {
        items: rows.into_iter().map(Into::into).collect(),
        total,
        skip,
        limit,
    }))
}

/// GET /api/transcriptions/{id}
pub async fn get(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Path(id): Path<String>,
) -> Result<Json<TranscriptionResponse>, AppError> {
    let row = TranscriptionRepository::get(&state.db, &id, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Transcription not found".to_string()))?;

    Ok(Json(row.into()))
}

/// PUT /api/transcriptions/{id}
pub async fn update(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<TranscriptionResponse>, AppError> {
    let row = TranscriptionRepository::update_raw_text(&state.db, &id, &user_id, &req.raw_text)
        .await?
        .ok_or_else(|| AppError::NotFound("Transcription not found".to_string()))?;

    Ok(Json(row.into()))
}

/// DELETE /api/transcriptions/{id}
pub async fn delete(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let row = TranscriptionRepository::get(&state.db, &id, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Transcription not found".to_string()))?;

    if let Some(path) = &row.audio_path {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(%id, error = %e, "failed to remove audio file");
        }
    }

    TranscriptionRepository::delete(&state.db, &id, &user_id).await?;

    Ok(Json(serde_json::json!({"status": "deleted"})))
}

/// POST /api/transcriptions/{id}/process
pub async fn process(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Path(id): Path<String>,
    Json(req): Json<ProcessRequest>,
) -> Result<Json<TranscriptionResponse>, AppError> {
    let instruction = req.instruction.trim();
    if instruction.is_empty() {
        return Err(AppError::Validation(
            "Instruction must not be empty".to_string(),
        ));
    }

    let row = TranscriptionRepository::get(&state.db, &id, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Transcription not found".to_string()))?;

    // Optional style guide shaping the rewrite
    let (style_content, style_guide_id) =
        resolve_style_guide(&state.db, &user_id, req.style_guide_id.as_deref()).await?;

    let prompt = build_process_prompt(&row.raw_text, instruction, style_content.as_deref());
    let system = "You rewrite dictated text for a user. Follow the instruction exactly. \
                  Return only the rewritten text, without commentary.";

    let output = state.text.generate(&prompt, Some(system), 0.3, 8000).await?;

    let updated =
        TranscriptionRepository::set_processed(&state.db, &id, &user_id, instruction, &output.text)
            .await?
            .ok_or_else(|| AppError::NotFound("Transcription not found".to_string()))?;

    UsageRepository::record(
        &state.db,
        &user_id,
        NewUsageRecord {
            provider: "gemini",
            model: state.config.gemini_model.clone(),
            operation: "process",
            api_tier: Some(output.tier.as_str().to_string()),
            input_tokens: Some(output.input_tokens),
            output_tokens: Some(output.output_tokens),
            cost_usd: cost::text_generation_cost(output.input_tokens, output.output_tokens),
            transcription_id: Some(id.clone()),
            style_guide_id,
            ..Default::default()
        },
        state.config.usd_to_dkk,
    )
    .await?;

    Ok(Json(updated.into()))
}

/// Usage row for one speech-to-text call. Whisper has no free tier, so the
/// row is always logged as paid.
fn transcribe_usage(model: String, duration_seconds: f64, transcription_id: String) -> NewUsageRecord {
    NewUsageRecord {
        provider: "openai",
        model,
        operation: "transcribe",
        api_tier: Some("paid".to_string()),
        audio_seconds: Some(duration_seconds),
        cost_usd: cost::whisper_cost(duration_seconds),
        transcription_id: Some(transcription_id),
        ..Default::default()
    }
}

/// Resolve the style guide named in a process request. A guide that is
/// missing, owned by someone else, or has no generated content simply
/// contributes nothing; only a guide that actually resolved gets linked in
/// the usage log.
async fn resolve_style_guide(
    pool: &Pool<Sqlite>,
    user_id: &str,
    style_guide_id: Option<&str>,
) -> Result<(Option<String>, Option<String>), AppError> {
    let Some(guide_id) = style_guide_id else {
        return Ok((None, None));
    };

    match StyleGuideRepository::get(pool, guide_id, user_id).await? {
        Some(guide) => {
            let content = guide.guide_content.filter(|c| !c.trim().is_empty());
            Ok((content, Some(guide.id)))
        }
        None => Ok((None, None)),
    }
}

fn build_process_prompt(raw_text: &str, instruction: &str, style: Option<&str>) -> String {
    let mut prompt = format!(
        "Dictated text:\n{}\n\nInstruction:\n{}\n",
        raw_text, instruction
    );
    if let Some(style) = style {
        prompt.push_str(&format!("\nWriting style to follow:\n{}\n", style));
    }
    prompt
}

/// GET /api/transcriptions/{id}/audio
pub async fn get_audio(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let row = TranscriptionRepository::get(&state.db, &id, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Transcription not found".to_string()))?;

    let path = row
        .audio_path
        .ok_or_else(|| AppError::NotFound("No audio attached".to_string()))?;

    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        warn!(%id, error = %e, "audio file missing on disk");
        AppError::NotFound("No audio attached".to_string())
    })?;

    let ext = file_extension(&path).unwrap_or_else(|| ".m4a".to_string());
    let media_type = media_type_for_extension(&ext);
    let disposition = format!(
        "inline; filename=\"{}\"",
        row.filename.unwrap_or_else(|| format!("{}{}", id, ext))
    );

    Ok((
        [
            (CONTENT_TYPE, media_type.to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

/// DELETE /api/transcriptions/{id}/audio
pub async fn delete_audio(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
    Path(id): Path<String>,
) -> Result<Json<TranscriptionResponse>, AppError> {
    let row = TranscriptionRepository::get(&state.db, &id, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Transcription not found".to_string()))?;

    let path = row
        .audio_path
        .ok_or_else(|| AppError::NotFound("No audio attached".to_string()))?;

    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!(%id, error = %e, "failed to remove audio file");
    }
    TranscriptionRepository::set_audio_path(&state.db, &id, &user_id, None).await?;

    let row = TranscriptionRepository::get(&state.db, &id, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Transcription not found".to_string()))?;

    Ok(Json(row.into()))
}
