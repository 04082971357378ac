use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use async_trait::async_trait;
use glidecheck_types::{config::MediaConfig, vision::Frame, Result};
use tempfile::TempDir;
use tokio::process::Command;

use crate::{codec, ensure_uniform_dimensions, media_error, FrameSource, VideoSink};

const DEFAULT_FFMPEG: &str = "ffmpeg";
const FRAME_PATTERN: &str = "frame_%06d.png";

/// Runs file and codec work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| media_error(format!("blocking media task failed: {err}")))?
}

/// Shared process plumbing for the ffmpeg-backed source and sink.
#[derive(Debug, Clone)]
struct FfmpegRunner {
    ffmpeg_path: PathBuf,
    work_dir: Option<PathBuf>,
}

impl FfmpegRunner {
    fn new(config: &MediaConfig) -> Self {
        let ffmpeg_path = config
            .ffmpeg_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FFMPEG));
        Self {
            ffmpeg_path,
            work_dir: config.work_dir.as_ref().map(PathBuf::from),
        }
    }

    async fn scratch_dir(&self) -> Result<TempDir> {
        let work_dir = self.work_dir.clone();
        blocking(move || {
            let mut builder = tempfile::Builder::new();
            builder.prefix("glidecheck-");
            let dir = match &work_dir {
                Some(base) => {
                    std::fs::create_dir_all(base)?;
                    builder.tempdir_in(base)
                }
                None => builder.tempdir(),
            };
            dir.map_err(|err| media_error(format!("failed to create scratch dir: {err}")))
        })
        .await
    }

    async fn run(&self, args: &[String]) -> Result<()> {
        let started = Instant::now();
        let output = Command::new(&self.ffmpeg_path)
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .args(args)
            .output()
            .await
            .map_err(|err| {
                media_error(format!(
                    "ffmpeg launch failed ({}): {err}",
                    self.ffmpeg_path.display()
                ))
            })?;

        if output.status.success() {
            tracing::debug!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "ffmpeg {}",
                args.join(" ")
            );
            Ok(())
        } else {
            Err(media_error(format!(
                "ffmpeg exited with {} ({}): {}",
                output.status,
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

/// Decodes `frame_NNNNNN.png` files in name order, stamping `index / fps`.
fn load_sequence(dir: &Path, fps: f64) -> Result<Vec<Frame>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "png"))
        .collect();
    paths.sort();

    paths
        .iter()
        .enumerate()
        .map(|(index, path)| Ok(codec::load_frame(path)?.with_timestamp(index as f64 / fps)))
        .collect()
}

fn save_sequence(dir: &Path, frames: &[Frame]) -> Result<()> {
    for (index, frame) in frames.iter().enumerate() {
        codec::save_png(frame, &dir.join(format!("frame_{:06}.png", index + 1)))?;
    }
    Ok(())
}

/// Samples frames from a video file by shelling out to `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegFrameSource {
    runner: FfmpegRunner,
}

impl FfmpegFrameSource {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            runner: FfmpegRunner::new(config),
        }
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn extract(&self, video: &Path, fps: f64) -> Result<Vec<Frame>> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(media_error(format!("invalid sampling rate {fps}")));
        }
        if !video.exists() {
            return Err(media_error(format!("video not found: {}", video.display())));
        }

        let scratch = self.runner.scratch_dir().await?;
        let pattern = scratch.path().join(FRAME_PATTERN);
        self.runner
            .run(&[
                "-i".into(),
                video.display().to_string(),
                "-vf".into(),
                format!("fps={fps}"),
                pattern.display().to_string(),
            ])
            .await?;

        let dir = scratch.path().to_path_buf();
        let frames = blocking(move || load_sequence(&dir, fps)).await?;
        tracing::info!(
            "Extracted {} frames from {} at {} fps",
            frames.len(),
            video.display(),
            fps
        );
        Ok(frames)
    }
}

/// Encodes frames to an H.264 video with `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegVideoSink {
    runner: FfmpegRunner,
    fps: f64,
}

impl FfmpegVideoSink {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            runner: FfmpegRunner::new(config),
            fps: config.sample_fps,
        }
    }
}

#[async_trait]
impl VideoSink for FfmpegVideoSink {
    async fn write(&self, frames: &[Frame], output: &Path) -> Result<PathBuf> {
        let (width, height) = ensure_uniform_dimensions(frames)?;
        let scratch = self.runner.scratch_dir().await?;
        let dir = scratch.path().to_path_buf();
        let owned = frames.to_vec();
        blocking(move || save_sequence(&dir, &owned)).await?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        self.runner
            .run(&[
                "-y".into(),
                "-framerate".into(),
                self.fps.to_string(),
                "-i".into(),
                scratch.path().join(FRAME_PATTERN).display().to_string(),
                "-vf".into(),
                "pad=ceil(iw/2)*2:ceil(ih/2)*2".into(),
                "-c:v".into(),
                "libx264".into(),
                "-pix_fmt".into(),
                "yuv420p".into(),
                output.display().to_string(),
            ])
            .await?;

        tracing::info!(
            "Wrote {} frames ({}x{}) to {}",
            frames.len(),
            width,
            height,
            output.display()
        );
        Ok(output.to_path_buf())
    }
}
