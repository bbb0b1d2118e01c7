// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Gemini API client for timetable extraction

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::AppConfig;
use crate::{Result, WeekcalError};

/// Something that turns an image plus instructions into the model's raw answer
#[async_trait]
pub trait ScheduleExtractor: Send + Sync {
    /// Send one request; no retry
    async fn extract(&self, image: &[u8], mime_type: &str, prompt: &str) -> Result<String>;
}

/// Gemini `generateContent` client
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        // Normalize URL
        let base_url = base_url
            .trim_end_matches('/')
            .trim_end_matches("/v1beta")
            .to_string();

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
            model: model.trim_start_matches("models/").to_string(),
        })
    }

    /// Build a client from configuration, reading the key from the environment
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = config.api_key()?;
        Self::new(
            &config.ai_engine.url,
            &api_key,
            &config.ai_engine.model,
            Duration::from_secs(config.ai_engine.timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check that the API answers with this key
    pub async fn health_check(&self) -> Result<()> {
        self.list_models().await.map(|_| ()).map_err(|e| {
            WeekcalError::Api(format!("Cannot reach Gemini at {}: {}", self.base_url, e))
        })
    }

    /// List available models (without the `models/` prefix)
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/v1beta/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WeekcalError::Api(format!(
                "Gemini returned status {}",
                response.status()
            )));
        }

        let models: ModelsResponse = response.json().await?;
        Ok(models
            .models
            .into_iter()
            .map(|m| m.name.trim_start_matches("models/").to_string())
            .collect())
    }

    /// Check if a specific model is available
    pub async fn model_available(&self, model: &str) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| m == model))
    }

    /// Generate text from an image plus a prompt
    pub async fn generate_with_image(
        &self,
        prompt: &str,
        image: &[u8],
        mime_type: &str,
    ) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: mime_type.to_string(),
                            data: general_purpose::STANDARD.encode(image),
                        },
                    },
                    RequestPart::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
            generation_config: GenerationConfig { temperature: 0.2 },
        };

        debug!(
            "Sending vision request to Gemini: model={}, image={} bytes",
            self.model,
            image.len()
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WeekcalError::Api(format!(
                "Gemini returned status {}: {}",
                status,
                body.trim()
            )));
        }

        let result: GenerateResponse = response.json().await?;
        let text = response_text(result);
        debug!("Gemini response: {}", text);

        if text.trim().is_empty() {
            return Err(WeekcalError::Api(
                "Received an empty response from the API.".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl ScheduleExtractor for GeminiClient {
    async fn extract(&self, image: &[u8], mime_type: &str, prompt: &str) -> Result<String> {
        self.generate_with_image(prompt, image, mime_type).await
    }
}

/// Concatenate the text parts of the first candidate
fn response_text(response: GenerateResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}
