//! Speech-to-text over the OpenAI-compatible transcription endpoint.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::AppError;

/// Transcript plus the audio duration reported by the provider.
#[derive(Debug, Clone)]
pub struct TranscriptOutput {
    pub text: String,
    pub duration_seconds: f64,
}

#[derive(Deserialize)]
struct VerboseTranscription {
    text: String,
    #[serde(default)]
    duration: f64,
}

pub struct SpeechClient {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    language: String,
}

impl SpeechClient {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_default();

        SpeechClient {
            client,
            api_base: config.speech_api_base.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.whisper_model.clone(),
            language: config.whisper_language.clone(),
        }
    }

    /// Transcribe an uploaded audio file. `prompt` biases the decoder toward
    /// domain vocabulary and is optional.
    pub async fn transcribe(
        &self,
        filename: &str,
        audio: Vec<u8>,
        prompt: Option<&str>,
    ) -> Result<TranscriptOutput, AppError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Upstream("Speech provider API key is not configured".into()))?;

        let file_part = reqwest::multipart::Part::bytes(audio).file_name(filename.to_string());
        let mut form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .text("language", self.language.clone())
            .text("response_format", "verbose_json")
            .part("file", file_part);
        if let Some(prompt) = prompt {
            form = form.text("prompt", prompt.to_string());
        }

        debug!(model = %self.model, filename, "sending audio for transcription");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.api_base))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Speech provider request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, %body, "speech provider returned an error");
            return Err(AppError::Upstream(format!(
                "Speech provider returned {}",
                status
            )));
        }

        let parsed: VerboseTranscription = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid speech provider response: {}", e)))?;

        Ok(TranscriptOutput {
            text: parsed.text,
            duration_seconds: parsed.duration,
        })
    }
}
