//! Frame extraction and video serialization.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use glidecheck_types::{vision::Frame, GlideError, Result};

pub mod codec;
pub mod ffmpeg;

pub use codec::{decode_frame, encode_png, load_frame, save_png};
pub use ffmpeg::{FfmpegFrameSource, FfmpegVideoSink};

/// Produces the ordered, timestamped frames of a video.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn extract(&self, video: &Path, fps: f64) -> Result<Vec<Frame>>;
}

/// Serializes an ordered frame sequence into a playable artifact.
#[async_trait]
pub trait VideoSink: Send + Sync {
    async fn write(&self, frames: &[Frame], output: &Path) -> Result<PathBuf>;
}

/// Generate an error aligned with media semantics.
pub fn media_error(message: impl Into<String>) -> GlideError {
    GlideError::Media(message.into())
}

/// Ensures every frame shares the dimensions of the first one.
pub fn ensure_uniform_dimensions(frames: &[Frame]) -> Result<(u32, u32)> {
    let first = frames
        .first()
        .ok_or_else(|| media_error("no frames to encode"))?;
    let dims = (first.width, first.height);
    if let Some((index, frame)) = frames
        .iter()
        .enumerate()
        .find(|(_, f)| (f.width, f.height) != dims)
    {
        return Err(media_error(format!(
            "frame {index} is {}x{}, expected {}x{}",
            frame.width, frame.height, dims.0, dims.1
        )));
    }
    Ok(dims)
}

/// Thins `frames` to at most `max` entries, evenly spaced and keeping order.
pub fn sample_evenly(frames: Vec<Frame>, max: usize) -> Vec<Frame> {
    if max == 0 {
        return Vec::new();
    }
    let total = frames.len();
    if total <= max {
        return frames;
    }
    let picks: Vec<usize> = (0..max).map(|i| i * total / max).collect();
    frames
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| picks.contains(idx))
        .map(|(_, frame)| frame)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(w: u32, h: u32, ts: f64) -> Frame {
        Frame::from_rgba(w, h, vec![0; (w * h * 4) as usize]).with_timestamp(ts)
    }

    #[test]
    fn uniform_dimensions_rejects_mixed_sizes() {
        let frames = vec![frame(2, 2, 0.0), frame(2, 2, 1.0), frame(4, 2, 2.0)];
        let err = ensure_uniform_dimensions(&frames).unwrap_err();
        assert!(err.to_string().contains("frame 2"));
        assert_eq!(ensure_uniform_dimensions(&frames[..2]).unwrap(), (2, 2));
        assert!(ensure_uniform_dimensions(&[]).is_err());
    }

    #[test]
    fn sample_evenly_keeps_order_and_cap() {
        let frames: Vec<Frame> = (0..10).map(|i| frame(1, 1, i as f64)).collect();
        let picked = sample_evenly(frames.clone(), 4);
        let stamps: Vec<f64> = picked.iter().map(|f| f.timestamp).collect();
        assert_eq!(stamps, vec![0.0, 2.0, 5.0, 7.0]);
        assert_eq!(sample_evenly(frames.clone(), 20).len(), 10);
        assert!(sample_evenly(frames, 0).is_empty());
    }
}
