//! Image generation via the Gemini generateContent endpoint.
//!
//! Multi-turn editing replays the chain history as alternating user/model
//! turns. Each model turn carries the previously generated image inline plus
//! the opaque continuation token the provider handed back, which lets the
//! model keep its reasoning state across turns.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{ApiTier, Config};
use crate::error::AppError;

/// One prior turn of an edit chain, oldest first.
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub prompt: String,
    pub image_data: Option<Vec<u8>>,
    pub image_mime_type: Option<String>,
    pub continuation_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    pub aspect_ratio: String,
    pub resolution: String,
    pub history: Vec<HistoryTurn>,
}

#[derive(Debug, Clone)]
pub struct ImageOutput {
    pub image_data: Vec<u8>,
    pub image_mime_type: String,
    pub text_response: Option<String>,
    pub continuation_token: Option<String>,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub images_generated: i64,
    pub tier: ApiTier,
}

/// Sent with every call so prompts taken from dictated text produce imagery,
/// not typography.
const SYSTEM_INSTRUCTION: &str =
    "Create an image inspired by the themes, mood and subject of the user's \
     prompt. Never render the prompt text, or any other written text, \
     literally in the image.";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: [&'static str; 2],
    image_config: ImageConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
    image_size: String,
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
#[serde(rename_all = "camelCase")]
struct CandidatePart {
    text: Option<String>,
    inline_data: Option<ResponseInlineData>,
    thought_signature: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseInlineData {
    mime_type: Option<String>,
    data: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: i64,
    #[serde(default)]
    candidates_token_count: i64,
}

pub struct ImageClient {
    client: reqwest::Client,
    api_base: String,
    model: String,
    keys: Vec<(ApiTier, String)>,
}

impl ImageClient {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_default();

        ImageClient {
            client,
            api_base: config.gemini_api_base.clone(),
            model: config.image_model.clone(),
            keys: config.gemini_keys(),
        }
    }

    pub async fn generate(&self, request: &ImageRequest) -> Result<ImageOutput, AppError> {
        if self.keys.is_empty() {
            return Err(AppError::Upstream(
                "Image provider API key is not configured".into(),
            ));
        }

        let body = build_body(request);

        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let mut last_error = None;

        for (tier, key) in &self.keys {
            debug!(
                tier = tier.as_str(),
                model = %self.model,
                turns = request.history.len() + 1,
                "sending image generation request"
            );

            let attempt = self
                .client
                .post(&url)
                .header("x-goog-api-key", key)
                .json(&body)
                .send()
                .await;

            let response = match attempt {
                Ok(response) => response,
                Err(e) => {
                    warn!(tier = tier.as_str(), error = %e, "image provider request failed");
                    last_error = Some(format!("Image provider request failed: {}", e));
                    continue;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!(tier = tier.as_str(), %status, %body, "image provider returned an error");
                last_error = Some(format!("Image provider returned {}", status));
                continue;
            }

            let parsed: GenerateResponse = response.json().await.map_err(|e| {
                AppError::Upstream(format!("Invalid image provider response: {}", e))
            })?;

            match extract_output(parsed, *tier)? {
                Some(output) => return Ok(output),
                None => {
                    last_error = Some("Image provider returned no image".into());
                    continue;
                }
            }
        }

        Err(AppError::Upstream(last_error.unwrap_or_else(|| {
            "All image provider keys failed".into()
        })))
    }
}

fn build_body(request: &ImageRequest) -> GenerateRequest {
    GenerateRequest {
        contents: build_contents(request),
        generation_config: GenerationConfig {
            response_modalities: ["TEXT", "IMAGE"],
            image_config: ImageConfig {
                aspect_ratio: request.aspect_ratio.clone(),
                image_size: request.resolution.to_ascii_uppercase(),
            },
        },
        system_instruction: SystemInstruction {
            parts: vec![Part {
                text: Some(SYSTEM_INSTRUCTION.to_string()),
                inline_data: None,
                thought_signature: None,
            }],
        },
    }
}

fn build_contents(request: &ImageRequest) -> Vec<Content> {
    let mut contents = Vec::with_capacity(request.history.len() * 2 + 1);

    for turn in &request.history {
        contents.push(Content {
            role: "user",
            parts: vec![Part {
                text: Some(turn.prompt.clone()),
                inline_data: None,
                thought_signature: None,
            }],
        });

        let mut model_parts = Vec::new();
        if let (Some(data), Some(mime)) = (&turn.image_data, &turn.image_mime_type) {
            model_parts.push(Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: mime.clone(),
                    data: base64_simd::STANDARD.encode_to_string(data),
                }),
                thought_signature: turn.continuation_token.clone(),
            });
        }
        if !model_parts.is_empty() {
            contents.push(Content {
                role: "model",
                parts: model_parts,
            });
        }
    }

    contents.push(Content {
        role: "user",
        parts: vec![Part {
            text: Some(request.prompt.clone()),
            inline_data: None,
            thought_signature: None,
        }],
    });

    contents
}

/// Pull the first inline image plus any accompanying text out of a response.
/// Returns `Ok(None)` when the candidate holds no image at all.
fn extract_output(
    response: GenerateResponse,
    tier: ApiTier,
) -> Result<Option<ImageOutput>, AppError> {
    let parts = match response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
    {
        Some(content) => content.parts,
        None => return Ok(None),
    };

    let mut image_data = None;
    let mut image_mime_type = None;
    let mut continuation_token = None;
    let mut text_fragments = Vec::new();
    let mut images_generated = 0i64;

    for part in parts {
        if let Some(text) = part.text {
            if !text.is_empty() {
                text_fragments.push(text);
            }
        }
        if let Some(inline) = part.inline_data {
            images_generated += 1;
            if image_data.is_none() {
                let decoded = base64_simd::STANDARD
                    .decode_to_vec(inline.data.as_bytes())
                    .map_err(|e| {
                        AppError::Upstream(format!("Invalid image data from provider: {}", e))
                    })?;
                image_data = Some(decoded);
                image_mime_type = Some(inline.mime_type.unwrap_or_else(|| "image/png".to_string()));
                continuation_token = part.thought_signature;
            }
        }
    }

    let Some(image_data) = image_data else {
        return Ok(None);
    };

    Ok(Some(ImageOutput {
        image_data,
        image_mime_type: image_mime_type.unwrap_or_else(|| "image/png".to_string()),
        text_response: if text_fragments.is_empty() {
            None
        } else {
            Some(text_fragments.join("\n"))
        },
        continuation_token,
        input_tokens: response.usage_metadata.prompt_token_count,
        output_tokens: response.usage_metadata.candidates_token_count,
        images_generated,
        tier,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_request(prompt: &str, history: Vec<HistoryTurn>) -> ImageRequest {
        ImageRequest {
            prompt: prompt.to_string(),
            aspect_ratio: "1:1".to_string(),
            resolution: "2K".to_string(),
            history,
        }
    }

    #[test]
    fn test_every_call_carries_the_system_instruction() {
        let body = build_body(&bare_request("a red barn", Vec::new()));
        let json = serde_json::to_value(&body).unwrap();

        let instruction = json["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap();
        assert!(instruction.contains("Never render"));
        assert_eq!(json["generationConfig"]["imageConfig"]["imageSize"], "2K");
    }

    #[test]
    fn test_first_turn_has_single_user_content() {
        let contents = build_contents(&bare_request("a red barn", Vec::new()));
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[0].parts[0].text.as_deref(), Some("a red barn"));
    }

    #[test]
    fn test_history_replays_as_alternating_turns() {
        let history = vec![HistoryTurn {
            prompt: "a red barn".to_string(),
            image_data: Some(vec![1, 2, 3]),
            image_mime_type: Some("image/png".to_string()),
            continuation_token: Some("sig-1".to_string()),
        }];
        let contents = build_contents(&bare_request("make it blue", history));

        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[1].role, "model");
        assert_eq!(contents[2].role, "user");

        let model_part = &contents[1].parts[0];
        assert_eq!(model_part.thought_signature.as_deref(), Some("sig-1"));
        assert_eq!(
            model_part.inline_data.as_ref().map(|d| d.data.as_str()),
            Some("AQID")
        );
    }

    #[test]
    fn test_history_turn_without_image_skips_model_content() {
        let history = vec![HistoryTurn {
            prompt: "a red barn".to_string(),
            image_data: None,
            image_mime_type: None,
            continuation_token: None,
        }];
        let contents = build_contents(&bare_request("make it blue", history));

        assert_eq!(contents.len(), 2);
        assert!(contents.iter().all(|c| c.role == "user"));
    }
}
