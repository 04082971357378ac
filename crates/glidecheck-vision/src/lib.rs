//! Open-vocabulary detection and box overlays.

use std::sync::Arc;

use async_trait::async_trait;
use glidecheck_types::{
    vision::{Detection, Frame},
    GlideError, Result,
};

pub mod detector;
mod glyphs;
pub mod overlay;

pub use detector::HttpDetector;
pub use overlay::BoxOverlayAnnotator;

/// Finds the concepts named in `prompt` (comma separated) within a frame.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, prompt: &str, frame: &Frame) -> Result<Vec<Detection>>;
}

/// Renders detections onto a copy of the frame. Output keeps the input dimensions.
#[async_trait]
pub trait Annotator: Send + Sync {
    async fn annotate(&self, frame: &Frame, detections: &[Detection]) -> Result<Frame>;
}

#[async_trait]
impl<T: Detector + ?Sized> Detector for Arc<T> {
    async fn detect(&self, prompt: &str, frame: &Frame) -> Result<Vec<Detection>> {
        (**self).detect(prompt, frame).await
    }
}

#[async_trait]
impl<T: Annotator + ?Sized> Annotator for Arc<T> {
    async fn annotate(&self, frame: &Frame, detections: &[Detection]) -> Result<Frame> {
        (**self).annotate(frame, detections).await
    }
}

pub fn vision_error(message: impl Into<String>) -> GlideError {
    GlideError::Vision(message.into())
}
