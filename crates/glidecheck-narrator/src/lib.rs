//! Multimodal language model narration of flight videos.

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use glidecheck_media::{encode_png, sample_evenly, FrameSource};
use glidecheck_types::{
    config::{MediaConfig, NarratorConfig},
    vision::Frame,
    GlideError, Result,
};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::info;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[async_trait]
pub trait VideoNarrator: Send + Sync {
    async fn narrate(&self, video: &Path) -> Result<String>;
}

/// Narrates a video by sending sampled keyframes to the Anthropic Messages API.
pub struct AnthropicNarrator<S: FrameSource> {
    source: S,
    client: Client,
    config: NarratorConfig,
    api_key: String,
    sample_fps: f64,
}

impl<S: FrameSource> AnthropicNarrator<S> {
    /// Reads the API key from the environment variable named in `config`.
    pub fn new(config: NarratorConfig, media: &MediaConfig, source: S) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            GlideError::Configuration(format!(
                "narrator API key missing: set {}",
                config.api_key_env
            ))
        })?;
        Ok(Self::with_api_key(config, media, source, api_key))
    }

    pub fn with_api_key(
        config: NarratorConfig,
        media: &MediaConfig,
        source: S,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            source,
            client: Client::new(),
            config,
            api_key: api_key.into(),
            sample_fps: media.sample_fps,
        }
    }

    fn build_request(&self, keyframes: &[Frame]) -> Result<Value> {
        let mut content = Vec::with_capacity(keyframes.len() + 1);
        for frame in keyframes {
            content.push(json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": "image/png",
                    "data": STANDARD.encode(encode_png(frame)?),
                }
            }));
        }
        content.push(json!({ "type": "text", "text": self.config.prompt }));

        Ok(json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [{ "role": "user", "content": content }],
        }))
    }
}

#[async_trait]
impl<S: FrameSource> VideoNarrator for AnthropicNarrator<S> {
    async fn narrate(&self, video: &Path) -> Result<String> {
        let frames = self.source.extract(video, self.sample_fps).await?;
        let keyframes = sample_evenly(frames, self.config.max_frames);
        if keyframes.is_empty() {
            return Err(narrator_error(format!(
                "no frames could be sampled from {}",
                video.display()
            )));
        }
        info!(
            "Narrating {} with {} keyframes via {}",
            video.display(),
            keyframes.len(),
            self.config.model
        );

        let body = self.build_request(&keyframes)?;
        let response = self
            .client
            .post(format!(
                "{}/messages",
                self.config.base_url.trim_end_matches('/')
            ))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|err| narrator_error(format!("request failed: {err}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(narrator_error("rate limited"));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(narrator_error("authentication failed"));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(500).collect();
            return Err(narrator_error(format!("HTTP {status}: {snippet}")));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|err| narrator_error(format!("invalid response body: {err}")))?;
        extract_text(&json)
    }
}

/// Concatenates the text blocks of a Messages API response.
pub fn extract_text(response: &Value) -> Result<String> {
    let blocks = response["content"]
        .as_array()
        .ok_or_else(|| narrator_error("response has no content"))?;
    let text: Vec<&str> = blocks
        .iter()
        .filter(|block| block["type"].as_str() == Some("text"))
        .filter_map(|block| block["text"].as_str())
        .collect();
    if text.is_empty() {
        Err(narrator_error("response contained no text"))
    } else {
        Ok(text.join("\n"))
    }
}

pub fn narrator_error(message: impl Into<String>) -> GlideError {
    GlideError::Narrator(message.into())
}
