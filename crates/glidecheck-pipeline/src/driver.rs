//! Frame-by-frame video annotation with per-frame failure isolation.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use glidecheck_media::{FrameSource, VideoSink};
use glidecheck_types::{
    report::{AnnotationRun, FailureStage, FrameFailure},
    vision::Frame,
    GlideError, Result,
};
use glidecheck_vision::{Annotator, Detector};
use tracing::info;

use crate::{
    isolate::{map_isolated, ItemTransform, MapObserver},
    observer::PipelineObserver,
};

/// Error from one collaborator on one frame.
#[derive(Debug)]
pub struct StageError {
    pub stage: FailureStage,
    pub error: GlideError,
}

impl StageError {
    pub fn to_failure(&self, index: usize) -> FrameFailure {
        FrameFailure {
            index,
            stage: self.stage,
            message: self.error.to_string(),
        }
    }
}

/// Detects `prompt` in a frame, then overlays the detections.
pub struct DetectAndAnnotate<'a, D: ?Sized, A: ?Sized> {
    pub detector: &'a D,
    pub annotator: &'a A,
    pub prompt: &'a str,
}

#[async_trait]
impl<'a, D, A> ItemTransform<Frame> for DetectAndAnnotate<'a, D, A>
where
    D: Detector + ?Sized,
    A: Annotator + ?Sized,
{
    type Error = StageError;

    async fn apply(&self, _index: usize, frame: &Frame) -> Result<Frame, StageError> {
        let detections = self
            .detector
            .detect(self.prompt, frame)
            .await
            .map_err(|error| StageError {
                stage: FailureStage::Detection,
                error,
            })?;
        self.annotator
            .annotate(frame, &detections)
            .await
            .map_err(|error| StageError {
                stage: FailureStage::Annotation,
                error,
            })
    }
}

/// Forwards isolation callbacks to a [`PipelineObserver`] as [`FrameFailure`]s.
struct ObserverBridge<O>(O);

impl<O: PipelineObserver> MapObserver<StageError> for ObserverBridge<O> {
    fn on_progress(&mut self, fraction: f64) {
        self.0.on_progress(fraction);
    }

    fn on_error(&mut self, index: usize, error: &StageError) {
        self.0.on_failure(&error.to_failure(index));
    }
}

/// Annotated frames in input order, with the indices that fell back to the original.
#[derive(Debug, Clone)]
pub struct AnnotatedSequence {
    pub frames: Vec<Frame>,
    pub failures: Vec<FrameFailure>,
}

/// Drives detection and annotation over a video's frames.
pub struct AnnotationDriver<S, D, A, K> {
    source: S,
    detector: D,
    annotator: A,
    sink: K,
    prompt: String,
    sample_fps: f64,
}

impl<S, D, A, K> AnnotationDriver<S, D, A, K>
where
    S: FrameSource,
    D: Detector,
    A: Annotator,
    K: VideoSink,
{
    pub fn new(
        source: S,
        detector: D,
        annotator: A,
        sink: K,
        prompt: impl Into<String>,
        sample_fps: f64,
    ) -> Self {
        Self {
            source,
            detector,
            annotator,
            sink,
            prompt: prompt.into(),
            sample_fps,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Annotates every frame in order. The output always has one frame per
    /// input frame; a frame whose detection or annotation failed is returned
    /// unchanged and reported to `observer`.
    pub async fn annotate_frames<O: PipelineObserver>(
        &self,
        frames: Vec<Frame>,
        observer: O,
    ) -> AnnotatedSequence {
        let transform = DetectAndAnnotate {
            detector: &self.detector,
            annotator: &self.annotator,
            prompt: &self.prompt,
        };
        let isolated = map_isolated(frames, &transform, ObserverBridge(observer)).await;
        AnnotatedSequence {
            frames: isolated.items,
            failures: isolated
                .failures
                .iter()
                .map(|(index, err)| err.to_failure(*index))
                .collect(),
        }
    }

    /// Annotates `frames` and serializes the result to `output`.
    ///
    /// An empty input is a no-op success: the sink is not invoked and the
    /// run carries no artifact. Sink failures are returned as errors.
    pub async fn annotate_and_write<O: PipelineObserver>(
        &self,
        frames: Vec<Frame>,
        output: &Path,
        observer: O,
    ) -> Result<AnnotationRun> {
        let started_at = Utc::now();
        let frame_count = frames.len();
        if frame_count == 0 {
            info!("No frames to annotate; skipping video sink");
            return Ok(AnnotationRun {
                output: None,
                frame_count,
                failures: Vec::new(),
                started_at,
                finished_at: Utc::now(),
            });
        }

        let sequence = self.annotate_frames(frames, observer).await;
        let artifact = self.sink.write(&sequence.frames, output).await?;
        info!(
            "Annotated {}/{} frames into {}",
            frame_count - sequence.failures.len(),
            frame_count,
            artifact.display()
        );

        Ok(AnnotationRun {
            output: Some(artifact),
            frame_count,
            failures: sequence.failures,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Samples `video`, annotates each frame and writes the annotated video.
    pub async fn annotate_video<O: PipelineObserver>(
        &self,
        video: &Path,
        output: &Path,
        observer: O,
    ) -> Result<AnnotationRun> {
        let frames = self.source.extract(video, self.sample_fps).await?;
        self.annotate_and_write(frames, output, observer).await
    }
}
