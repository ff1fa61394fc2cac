//! HTTP client for the image and text generation service
//!
//! `POST {base}/images` takes `{"prompt"}` and returns
//! `{"mime_type", "image"}` with a base64 payload; `POST {base}/complete`
//! returns `{"text"}`. One attempt per call, no retries.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::AiServiceFailure;
use crate::network::create_client;
use crate::ports::{AiService, GeneratedImage};

#[derive(Serialize)]
struct PromptRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default = "default_mime", alias = "mimeType")]
    mime_type: String,
    image: String,
}

fn default_mime() -> String {
    "image/png".to_string()
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

impl ImageResponse {
    fn decode(self) -> Result<GeneratedImage> {
        // tolerate data URLs
        let payload = match self.image.split_once(";base64,") {
            Some((_, data)) => data,
            None => self.image.as_str(),
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| AiServiceFailure(format!("invalid image payload: {}", e)))?;
        Ok(GeneratedImage {
            mime_type: self.mime_type,
            bytes,
        })
    }
}

pub struct HttpAiService {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpAiService {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        HttpAiService {
            client: create_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, prompt: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        let mut req_builder = self.client.post(&url).json(&PromptRequest { prompt });
        if let Some(key) = &self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req_builder
            .send()
            .await
            .with_context(|| format!("ai request to {}", url))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AiServiceFailure(format!("{} returned {}: {}", path, status, body)).into());
        }
        resp.json()
            .await
            .map_err(|e| AiServiceFailure(format!("malformed {} response: {}", path, e)).into())
    }
}

#[async_trait]
impl AiService for HttpAiService {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage> {
        tracing::info!(prompt_len = prompt.len(), "Generating image");
        let response: ImageResponse = self.post("images", prompt).await?;
        response.decode()
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let response: CompletionResponse = self.post("complete", prompt).await?;
        Ok(response.text)
    }
}
