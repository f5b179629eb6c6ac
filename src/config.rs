use std::path::PathBuf;

use crate::error::AppError;

/// API key tier for the text/image provider fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiTier {
    Free,
    Paid,
}

impl ApiTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiTier::Free => "free",
            ApiTier::Paid => "paid",
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub audio_dir: PathBuf,
    pub session_expiry_hours: i64,
    pub db_max_connections: u32,

    // Speech-to-text provider
    pub openai_api_key: Option<String>,
    pub speech_api_base: String,
    pub whisper_model: String,
    pub whisper_language: String,

    // Text/image generation provider (dual-tier keys)
    pub gemini_api_key_free: Option<String>,
    pub gemini_api_key_paid: Option<String>,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub image_model: String,

    pub usd_to_dkk: f64,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let shared_key = std::env::var("GEMINI_API_KEY").ok();

        Ok(Config {
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: std::env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8090".to_string())
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data/dikto.db".to_string()),
            audio_dir: std::env::var("AUDIO_DIR")
                .unwrap_or_else(|_| "data/audio".to_string())
                .into(),
            session_expiry_hours: std::env::var("SESSION_EXPIRY_HOURS")
                .unwrap_or_else(|_| "720".to_string())
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid SESSION_EXPIRY_HOURS: {}", e)))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid DB_MAX_CONNECTIONS: {}", e)))?,
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            speech_api_base: std::env::var("SPEECH_API_BASE")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            whisper_model: std::env::var("WHISPER_MODEL")
                .unwrap_or_else(|_| "whisper-1".to_string()),
            whisper_language: std::env::var("WHISPER_LANGUAGE")
                .unwrap_or_else(|_| "da".to_string()),
            gemini_api_key_free: std::env::var("GEMINI_API_KEY_FREE")
                .ok()
                .or_else(|| shared_key.clone()),
            gemini_api_key_paid: std::env::var("GEMINI_API_KEY_PAID").ok().or(shared_key),
            gemini_api_base: std::env::var("GEMINI_API_BASE")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            gemini_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-3-flash-preview".to_string()),
            image_model: std::env::var("IMAGE_MODEL")
                .unwrap_or_else(|_| "gemini-3-pro-image-preview".to_string()),
            usd_to_dkk: std::env::var("USD_TO_DKK")
                .unwrap_or_else(|_| "7.0".to_string())
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid USD_TO_DKK: {}", e)))?,
            max_upload_bytes: std::env::var("MAX_UPLOAD_SIZE")
                .unwrap_or_else(|_| (100 * 1024 * 1024).to_string())
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid MAX_UPLOAD_SIZE: {}", e)))?,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Ordered list of generation keys to try: free tier first, paid fallback.
    pub fn gemini_keys(&self) -> Vec<(ApiTier, String)> {
        let mut keys = Vec::new();
        if let Some(key) = &self.gemini_api_key_free {
            keys.push((ApiTier::Free, key.clone()));
        }
        if let Some(key) = &self.gemini_api_key_paid {
            // Skip the paid entry when both vars resolve to the same key
            if Some(key) != self.gemini_api_key_free.as_ref() {
                keys.push((ApiTier::Paid, key.clone()));
            }
        }
        keys
    }
}

/// Audio file extensions accepted for upload.
pub const ALLOWED_AUDIO_EXTENSIONS: &[&str] = &[
    ".m4a", ".mp3", ".wav", ".ogg", ".webm", ".mp4", ".aac", ".flac",
];
