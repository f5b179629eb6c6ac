//! Text rewriting via the Gemini generateContent endpoint.
//!
//! Keys are tried in tier order (free first, then paid); the first key that
//! produces a successful response wins.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{ApiTier, Config};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct TextOutput {
    pub text: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub tier: ApiTier,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: UsageMetadata,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: i64,
    #[serde(default)]
    candidates_token_count: i64,
}

pub struct TextClient {
    client: reqwest::Client,
    api_base: String,
    model: String,
    keys: Vec<(ApiTier, String)>,
}

impl TextClient {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        TextClient {
            client,
            api_base: config.gemini_api_base.clone(),
            model: config.gemini_model.clone(),
            keys: config.gemini_keys(),
        }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
        temperature: f64,
        max_output_tokens: i64,
    ) -> Result<TextOutput, AppError> {
        if self.keys.is_empty() {
            return Err(AppError::Upstream(
                "Text provider API key is not configured".into(),
            ));
        }

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature,
                max_output_tokens,
            },
            system_instruction: system_instruction.map(|text| Content {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            }),
        };

        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let mut last_error = None;

        for (tier, key) in &self.keys {
            debug!(tier = tier.as_str(), model = %self.model, "sending text generation request");

            let attempt = self
                .client
                .post(&url)
                .header("x-goog-api-key", key)
                .json(&request)
                .send()
                .await;

            let response = match attempt {
                Ok(response) => response,
                Err(e) => {
                    warn!(tier = tier.as_str(), error = %e, "text provider request failed");
                    last_error = Some(format!("Text provider request failed: {}", e));
                    continue;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!(tier = tier.as_str(), %status, %body, "text provider returned an error");
                last_error = Some(format!("Text provider returned {}", status));
                continue;
            }

            let parsed: GenerateResponse = response.json().await.map_err(|e| {
                AppError::Upstream(format!("Invalid text provider response: {}", e))
            })?;

            let text = parsed
                .candidates
                .first()
                .and_then(|c| c.content.as_ref())
                .map(|c| {
                    c.parts
                        .iter()
                        .filter_map(|p| p.text.as_deref())
                        .collect::<Vec<_>>()
                        .join("")
                })
                .unwrap_or_default();

            if text.is_empty() {
                last_error = Some("Text provider returned an empty response".into());
                continue;
            }

            return Ok(TextOutput {
                text,
                input_tokens: parsed.usage_metadata.prompt_token_count,
                output_tokens: parsed.usage_metadata.candidates_token_count,
                tier: *tier,
            });
        }

        Err(AppError::Upstream(last_error.unwrap_or_else(|| {
            "All text provider keys failed".into()
        })))
    }
}
