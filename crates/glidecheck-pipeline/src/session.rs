//! High-level session coordinating inspection, annotation and narration.

use std::path::{Path, PathBuf};

use glidecheck_bus::EventBus;
use glidecheck_media::{FrameSource, VideoSink};
use glidecheck_narrator::VideoNarrator;
use glidecheck_ops::{write_run_report, ReportStore};
use glidecheck_types::{
    events::{EventPayload, LifecyclePhase, NarrationEvent, PipelineEvent},
    report::AnnotationRun,
    GlideError, Result,
};
use glidecheck_vision::{Annotator, Detector};
use tracing::{error, info, warn};

use crate::{
    driver::AnnotationDriver,
    inspect::{GearInspector, Inspection},
    observer::BusObserver,
};

/// Everything produced by one [`Session::review`].
#[derive(Debug, Default)]
pub struct ReviewSummary {
    pub inspection: Option<Inspection>,
    pub run: Option<AnnotationRun>,
    pub story: Option<String>,
}

pub struct Session<S, D, A, K, N, B> {
    driver: AnnotationDriver<S, D, A, K>,
    inspector: GearInspector<D, A>,
    narrator: Option<N>,
    bus: B,
    store: ReportStore,
    report_dir: Option<PathBuf>,
}

impl<S, D, A, K, N, B> Session<S, D, A, K, N, B>
where
    S: FrameSource,
    D: Detector,
    A: Annotator,
    K: VideoSink,
    N: VideoNarrator,
    B: EventBus,
{
    pub fn new(
        driver: AnnotationDriver<S, D, A, K>,
        inspector: GearInspector<D, A>,
        narrator: Option<N>,
        bus: B,
        store: ReportStore,
    ) -> Self {
        Self {
            driver,
            inspector,
            narrator,
            bus,
            store,
            report_dir: None,
        }
    }

    /// Persist a JSON report of every annotation run under `dir`.
    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(dir.into());
        self
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    pub async fn inspect_image(&self, image: &Path, save_to: Option<&Path>) -> Result<Inspection> {
        let bytes = tokio::fs::read(image).await.map_err(|err| {
            GlideError::Pipeline(format!("unable to read image {}: {err}", image.display()))
        })?;
        self.publish(PipelineEvent::lifecycle(
            LifecyclePhase::InspectionStart,
            Some(image.display().to_string()),
        ))
        .await?;

        let inspection = self.inspector.inspect_bytes(&bytes, save_to).await?;

        self.publish(PipelineEvent::new(EventPayload::Checklist(
            inspection.checklist.clone(),
        )))
        .await?;
        self.publish(PipelineEvent::lifecycle(LifecyclePhase::InspectionEnd, None))
            .await?;
        Ok(inspection)
    }

    pub async fn annotate_video(&self, video: &Path, output: &Path) -> Result<AnnotationRun> {
        self.publish(PipelineEvent::lifecycle(
            LifecyclePhase::AnnotationStart,
            Some(format!("{} [{}]", video.display(), self.driver.prompt())),
        ))
        .await?;

        let run = self
            .driver
            .annotate_video(video, output, BusObserver::new(&self.bus))
            .await?;

        if !run.failures.is_empty() {
            warn!(
                "{} of {} frames were left unannotated",
                run.failures.len(),
                run.frame_count
            );
        }
        if let Some(dir) = &self.report_dir {
            if let Err(err) = write_run_report(dir, &run) {
                warn!("run report not written: {err}");
            }
        }
        self.store.record_run(run.clone()).await?;

        self.publish(PipelineEvent::lifecycle(
            LifecyclePhase::AnnotationEnd,
            Some(format!(
                "{}/{} frames annotated",
                run.annotated_count(),
                run.frame_count
            )),
        ))
        .await?;
        Ok(run)
    }

    /// Narration failures are logged and yield `None`.
    pub async fn narrate(&self, video: &Path) -> Option<String> {
        let narrator = self.narrator.as_ref()?;
        self.emit(PipelineEvent::lifecycle(LifecyclePhase::NarrationStart, None))
            .await;
        let story = match narrator.narrate(video).await {
            Ok(text) => {
                self.emit(PipelineEvent::new(EventPayload::Narration(NarrationEvent {
                    text: text.clone(),
                })))
                .await;
                Some(text)
            }
            Err(err) => {
                error!("Error during analysis: {err}");
                None
            }
        };
        self.emit(PipelineEvent::lifecycle(LifecyclePhase::NarrationEnd, None))
            .await;
        story
    }

    /// Runs whichever steps have input, in order: gear check, video
    /// annotation, narration.
    pub async fn review(
        &self,
        image: Option<&Path>,
        video: Option<&Path>,
        image_output: Option<&Path>,
        video_output: &Path,
    ) -> Result<ReviewSummary> {
        let mut summary = ReviewSummary::default();
        if let Some(image) = image {
            summary.inspection = Some(self.inspect_image(image, image_output).await?);
        }
        if let Some(video) = video {
            summary.run = Some(self.annotate_video(video, video_output).await?);
            summary.story = self.narrate(video).await;
        }
        info!(
            "Review finished: inspection={} video={} story={}",
            summary.inspection.is_some(),
            summary.run.is_some(),
            summary.story.is_some()
        );
        Ok(summary)
    }

    async fn publish(&self, event: PipelineEvent) -> Result<()> {
        let cloned = event.clone();
        self.bus.publish(event).await?;
        self.store.record_event(cloned).await?;
        Ok(())
    }

    async fn emit(&self, event: PipelineEvent) {
        if let Err(err) = self.publish(event).await {
            warn!("event publication failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use async_trait::async_trait;
    use futures::StreamExt;
    use glidecheck_bus::LocalBus;
    use glidecheck_media::encode_png;
    use glidecheck_narrator::narrator_error;
    use glidecheck_types::{
        events::EventKind,
        vision::{BoundingBox, Detection, Frame},
    };
    use glidecheck_vision::{vision_error, BoxOverlayAnnotator};

    fn frame(tag: u8) -> Frame {
        Frame::from_rgba(4, 4, vec![tag; 64])
    }

    struct ScriptedSource;

    #[async_trait]
    impl FrameSource for ScriptedSource {
        async fn extract(&self, _video: &Path, fps: f64) -> Result<Vec<Frame>> {
            Ok((1..=3)
                .map(|i| frame(i).with_timestamp(i as f64 / fps))
                .collect())
        }
    }

    /// Fails on frames filled with 2.
    struct FlakyDetector;

    #[async_trait]
    impl Detector for FlakyDetector {
        async fn detect(&self, _prompt: &str, frame: &Frame) -> Result<Vec<Detection>> {
            if frame.data[0] == 2 {
                return Err(vision_error("timeout"));
            }
            Ok(vec![Detection {
                label: "helmet".into(),
                bbox: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
                score: 0.7,
            }])
        }
    }

    #[derive(Clone, Default)]
    struct MemorySink {
        frames: Arc<Mutex<Vec<Frame>>>,
    }

    #[async_trait]
    impl VideoSink for MemorySink {
        async fn write(&self, frames: &[Frame], output: &Path) -> Result<PathBuf> {
            self.frames.lock().unwrap().extend_from_slice(frames);
            Ok(output.to_path_buf())
        }
    }

    struct StoryTeller {
        fail: bool,
    }

    #[async_trait]
    impl VideoNarrator for StoryTeller {
        async fn narrate(&self, _video: &Path) -> Result<String> {
            if self.fail {
                Err(narrator_error("model unavailable"))
            } else {
                Ok("A calm ridge soar.".into())
            }
        }
    }

    type TestSession = Session<
        ScriptedSource,
        Arc<FlakyDetector>,
        Arc<BoxOverlayAnnotator>,
        MemorySink,
        StoryTeller,
        LocalBus,
    >;

    fn session(bus: LocalBus, sink: MemorySink, narrator: Option<StoryTeller>) -> TestSession {
        let detector = Arc::new(FlakyDetector);
        let annotator = Arc::new(BoxOverlayAnnotator::with_thickness(1));
        let driver = AnnotationDriver::new(
            ScriptedSource,
            detector.clone(),
            annotator.clone(),
            sink,
            "wing over",
            1.0,
        );
        let inspector = GearInspector::new(detector, annotator, "helmet, gloves");
        Session::new(driver, inspector, narrator, bus, ReportStore::new())
    }

    #[tokio::test]
    async fn annotate_video_publishes_progress_and_writes_report() {
        let bus = LocalBus::new(64);
        let events = bus.subscribe();
        let sink = MemorySink::default();
        let dir = tempfile::tempdir().expect("tempdir");
        let session = session(bus, sink.clone(), None).with_report_dir(dir.path());

        let run = session
            .annotate_video(Path::new("flight.mp4"), Path::new("annotated.mp4"))
            .await
            .expect("run");

        assert_eq!(run.frame_count, 3);
        assert_eq!(run.failures.len(), 1);
        assert_eq!(run.failures[0].index, 1);
        let written = sink.frames.lock().unwrap().clone();
        assert_eq!(written.len(), 3);
        assert_eq!(written[1], frame(2).with_timestamp(2.0));
        assert_ne!(written[0], frame(1).with_timestamp(1.0));

        let reports = std::fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(reports, 1);
        assert_eq!(session.store().snapshot_runs().await.len(), 1);

        drop(session);
        let kinds: Vec<EventKind> = events.map(|e| e.kind).collect().await;
        assert_eq!(
            kinds,
            vec![
                EventKind::Lifecycle,
                EventKind::Progress,
                EventKind::FrameFailed,
                EventKind::Progress,
                EventKind::Progress,
                EventKind::Lifecycle,
            ]
        );
    }

    #[tokio::test]
    async fn unwritable_report_dir_keeps_the_run() {
        let bus = LocalBus::new(64);
        let sink = MemorySink::default();
        let dir = tempfile::tempdir().expect("tempdir");
        let not_a_dir = dir.path().join("reports");
        std::fs::write(&not_a_dir, b"occupied").expect("write file");
        let session = session(bus, sink.clone(), None).with_report_dir(&not_a_dir);

        let run = session
            .annotate_video(Path::new("flight.mp4"), Path::new("annotated.mp4"))
            .await
            .expect("report failure is not fatal");

        assert_eq!(run.output, Some(PathBuf::from("annotated.mp4")));
        assert_eq!(sink.frames.lock().unwrap().len(), 3);
        assert_eq!(session.store().snapshot_runs().await.len(), 1);
        let events = session.store().snapshot_events().await;
        let last = events.last().expect("events recorded");
        assert!(matches!(
            &last.payload,
            EventPayload::Lifecycle(l) if l.phase == LifecyclePhase::AnnotationEnd
        ));
    }

    #[tokio::test]
    async fn narration_failure_does_not_fail_review() {
        let dir = tempfile::tempdir().expect("tempdir");
        let image = dir.path().join("pilot.png");
        std::fs::write(&image, encode_png(&frame(9)).expect("encode")).expect("write image");

        let session = session(
            LocalBus::new(64),
            MemorySink::default(),
            Some(StoryTeller { fail: true }),
        );
        let summary = session
            .review(
                Some(image.as_path()),
                Some(Path::new("flight.mp4")),
                None,
                Path::new("annotated.mp4"),
            )
            .await
            .expect("review");

        let inspection = summary.inspection.expect("inspection");
        assert_eq!(inspection.checklist.missing().collect::<Vec<_>>(), vec!["gloves"]);
        assert_eq!(summary.run.expect("run").frame_count, 3);
        assert!(summary.story.is_none());
    }

    #[tokio::test]
    async fn narration_success_is_recorded() {
        let session = session(
            LocalBus::new(8),
            MemorySink::default(),
            Some(StoryTeller { fail: false }),
        );
        let story = session.narrate(Path::new("flight.mp4")).await;
        assert_eq!(story.as_deref(), Some("A calm ridge soar."));
        let kinds: Vec<EventKind> = session
            .store()
            .snapshot_events()
            .await
            .into_iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![EventKind::Lifecycle, EventKind::Narration, EventKind::Lifecycle]
        );
    }

    #[tokio::test]
    async fn missing_image_is_a_pipeline_error() {
        let session = session(LocalBus::new(8), MemorySink::default(), None);
        let err = session
            .inspect_image(Path::new("/nonexistent/pilot.png"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GlideError::Pipeline(_)));
        assert!(session.narrate(Path::new("flight.mp4")).await.is_none());
    }
}
