use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use glidecheck_media::encode_png;
use glidecheck_types::{
    config::VisionConfig,
    vision::{split_concepts, BoundingBox, Detection, Frame},
    GlideError, Result,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{vision_error, Detector};

#[derive(Debug, Serialize)]
struct DetectRequest<'a> {
    prompts: Vec<String>,
    image: &'a str,
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    data: Vec<RawDetection>,
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    label: String,
    score: f32,
    bbox: [f32; 4],
}

/// Client for a hosted open-vocabulary detector (OWLv2 style endpoint).
pub struct HttpDetector {
    client: Client,
    endpoint: String,
    api_key: String,
    box_threshold: f32,
    timeout: Duration,
}

impl HttpDetector {
    /// Reads the API key from the environment variable named in `config`.
    pub fn new(config: &VisionConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            GlideError::Configuration(format!(
                "detector API key missing: set {}",
                config.api_key_env
            ))
        })?;
        Ok(Self::with_api_key(config, api_key))
    }

    pub fn with_api_key(config: &VisionConfig, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.endpoint.clone(),
            api_key: api_key.into(),
            box_threshold: config.box_threshold,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(&self, prompt: &str, frame: &Frame) -> Result<Vec<Detection>> {
        let prompts = split_concepts(prompt);
        if prompts.is_empty() {
            return Err(vision_error("empty detection prompt"));
        }
        let image = STANDARD.encode(encode_png(frame)?);
        let body = DetectRequest {
            prompts,
            image: &image,
            confidence: self.box_threshold,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|err| vision_error(format!("detector request failed: {err}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(vision_error("detector rejected the API key"));
        }
        let text = response
            .text()
            .await
            .map_err(|err| vision_error(format!("detector response unreadable: {err}")))?;
        if !status.is_success() {
            let snippet: String = text.chars().take(500).collect();
            return Err(vision_error(format!("detector HTTP {status}: {snippet}")));
        }

        let detections = parse_detections(&text, self.box_threshold)?;
        debug!(
            "Detector returned {} boxes for {}x{} frame",
            detections.len(),
            frame.width,
            frame.height
        );
        Ok(detections)
    }
}

/// Parses a detector response body, dropping boxes scored below `threshold`.
pub fn parse_detections(body: &str, threshold: f32) -> Result<Vec<Detection>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|err| vision_error(format!("detector returned invalid JSON: {err}")))?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(vision_error(format!("detector error: {error}")));
    }
    let parsed: DetectResponse = serde_json::from_value(value)
        .map_err(|err| vision_error(format!("unexpected detector payload: {err}")))?;
    Ok(parsed
        .data
        .into_iter()
        .filter(|raw| raw.score >= threshold)
        .map(|raw| Detection {
            label: raw.label.trim().to_string(),
            bbox: BoundingBox::new(raw.bbox[0], raw.bbox[1], raw.bbox[2], raw.bbox[3]),
            score: raw.score,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glidecheck_types::config::GlideConfig;

    fn config(endpoint: String) -> VisionConfig {
        VisionConfig {
            endpoint,
            ..GlideConfig::default().vision
        }
    }

    #[test]
    fn parse_filters_low_scores() {
        let body = r#"{"data":[
            {"label":"helmet","score":0.82,"bbox":[0.1,0.1,0.3,0.4]},
            {"label":" gloves","score":0.05,"bbox":[0.5,0.5,0.6,0.6]}
        ]}"#;
        let detections = parse_detections(body, 0.1).expect("parse");
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "helmet");
        assert_eq!(detections[0].bbox, BoundingBox::new(0.1, 0.1, 0.3, 0.4));
    }

    #[test]
    fn parse_surfaces_service_errors() {
        assert!(parse_detections(r#"{"error":"quota exceeded"}"#, 0.1).is_err());
        assert!(parse_detections("<html>", 0.1).is_err());
        assert!(parse_detections("{}", 0.1).expect("empty").is_empty());
    }

    #[tokio::test]
    async fn detect_posts_frame_and_parses_boxes() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/owlv2")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[{"label":"harness","score":0.6,"bbox":[0.2,0.2,0.8,0.9]}]}"#)
            .create_async()
            .await;

        let detector = HttpDetector::with_api_key(&config(format!("{}/owlv2", server.url())), "secret");
        let frame = Frame::from_rgba(2, 2, vec![128; 16]);
        let detections = detector
            .detect("helmet, harness", &frame)
            .await
            .expect("detect");
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "harness");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn detect_maps_http_failure_to_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/owlv2")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let detector = HttpDetector::with_api_key(&config(format!("{}/owlv2", server.url())), "k");
        let frame = Frame::from_rgba(1, 1, vec![0; 4]);
        let err = detector.detect("helmet", &frame).await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn detect_rejects_empty_prompt() {
        let detector = HttpDetector::with_api_key(&config("http://127.0.0.1:9".into()), "k");
        let frame = Frame::from_rgba(1, 1, vec![0; 4]);
        assert!(detector.detect(" , ", &frame).await.is_err());
    }
}
