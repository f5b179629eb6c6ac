use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub expires_at: i64,
    pub created_at: i64,
}

/// An audio transcription with optional AI rewrite.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transcription {
    pub id: String,
    pub user_id: String,
    pub filename: Option<String>,
    pub duration_seconds: f64,
    pub raw_text: String,
    pub instruction: Option<String>,
    pub processed_text: Option<String>,
    pub audio_path: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A user-curated writing style, optionally auto-derived from examples.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StyleGuide {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub examples: Option<String>,
    pub guide_content: Option<String>,
    pub is_default: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Append-only log row for one billable provider call.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    pub model: String,
    pub operation: String,
    pub api_tier: Option<String>,
    pub audio_seconds: Option<f64>,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub images_generated: Option<i64>,
    pub image_resolution: Option<String>,
    pub cost_usd: f64,
    pub cost_dkk: f64,
    pub transcription_id: Option<String>,
    pub style_guide_id: Option<String>,
    pub image_generation_id: Option<String>,
    pub created_at: String,
}

/// One turn of an image-generation chain. Rows reference their parent by id,
/// matching the persisted representation directly.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ImageGeneration {
    pub id: String,
    pub user_id: String,
    pub prompt: String,
    #[serde(skip_serializing)]
    pub image_data: Option<Vec<u8>>,
    pub image_mime_type: Option<String>,
    pub text_response: Option<String>,
    #[serde(skip_serializing)]
    pub continuation_token: Option<String>,
    pub turn_number: i64,
    pub parent_id: Option<String>,
    pub transcription_id: Option<String>,
    pub created_at: String,
}
