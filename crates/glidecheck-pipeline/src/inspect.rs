//! Single-image safety gear verification.

use std::path::Path;

use glidecheck_media::{decode_frame, save_png};
use glidecheck_types::{
    vision::{split_concepts, Detection, Frame, GearChecklist},
    Result,
};
use glidecheck_vision::{Annotator, Detector};
use tracing::info;

#[derive(Debug, Clone)]
pub struct Inspection {
    pub annotated: Frame,
    pub detections: Vec<Detection>,
    pub checklist: GearChecklist,
}

impl Inspection {
    pub fn detected_labels(&self) -> Vec<String> {
        self.detections.iter().map(|d| d.label.clone()).collect()
    }
}

/// Checks an image for every configured safety item.
pub struct GearInspector<D, A> {
    detector: D,
    annotator: A,
    safety_items: String,
}

impl<D: Detector, A: Annotator> GearInspector<D, A> {
    pub fn new(detector: D, annotator: A, safety_items: impl Into<String>) -> Self {
        Self {
            detector,
            annotator,
            safety_items: safety_items.into(),
        }
    }

    pub async fn inspect(&self, image: &Frame) -> Result<Inspection> {
        let detections = self.detector.detect(&self.safety_items, image).await?;
        let annotated = self.annotator.annotate(image, &detections).await?;
        let labels: Vec<String> = detections.iter().map(|d| d.label.clone()).collect();
        let checklist = GearChecklist::evaluate(split_concepts(&self.safety_items), &labels);
        info!(
            "Gear check: {}/{} items detected",
            checklist.entries.iter().filter(|e| e.detected).count(),
            checklist.entries.len()
        );
        Ok(Inspection {
            annotated,
            detections,
            checklist,
        })
    }

    /// Decodes an uploaded image, inspects it and optionally saves the overlay as PNG.
    pub async fn inspect_bytes(&self, bytes: &[u8], save_to: Option<&Path>) -> Result<Inspection> {
        let image = decode_frame(bytes)?;
        let inspection = self.inspect(&image).await?;
        if let Some(path) = save_to {
            save_png(&inspection.annotated, path)?;
            info!("Annotated image saved to {}", path.display());
        }
        Ok(inspection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use glidecheck_media::encode_png;
    use glidecheck_types::vision::BoundingBox;
    use glidecheck_vision::{vision_error, BoxOverlayAnnotator};

    struct LabelDetector {
        labels: Vec<&'static str>,
    }

    #[async_trait]
    impl Detector for LabelDetector {
        async fn detect(&self, prompt: &str, _frame: &Frame) -> Result<Vec<Detection>> {
            assert!(prompt.contains("helmet"));
            Ok(self
                .labels
                .iter()
                .map(|label| Detection {
                    label: label.to_string(),
                    bbox: BoundingBox::new(0.1, 0.1, 0.9, 0.9),
                    score: 0.5,
                })
                .collect())
        }
    }

    struct BrokenDetector;

    #[async_trait]
    impl Detector for BrokenDetector {
        async fn detect(&self, _prompt: &str, _frame: &Frame) -> Result<Vec<Detection>> {
            Err(vision_error("service down"))
        }
    }

    fn image() -> Frame {
        Frame::from_rgba(8, 8, vec![200; 256])
    }

    #[tokio::test]
    async fn checklist_reflects_detected_labels() {
        let inspector = GearInspector::new(
            LabelDetector {
                labels: vec!["Helmet", "parachute"],
            },
            BoxOverlayAnnotator::with_thickness(1),
            "helmet, harness, footwear, gloves, parachute",
        );
        let inspection = inspector.inspect(&image()).await.expect("inspect");

        let flags: Vec<bool> = inspection
            .checklist
            .entries
            .iter()
            .map(|e| e.detected)
            .collect();
        assert_eq!(flags, vec![true, false, false, false, true]);
        assert_eq!(inspection.detected_labels(), vec!["Helmet", "parachute"]);
        assert_ne!(inspection.annotated, image());
    }

    #[tokio::test]
    async fn inspect_bytes_saves_overlay() {
        let inspector = GearInspector::new(
            LabelDetector {
                labels: vec!["harness"],
            },
            BoxOverlayAnnotator::default(),
            "helmet, harness",
        );
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("annotated_image.png");
        let bytes = encode_png(&image()).expect("encode");

        let inspection = inspector
            .inspect_bytes(&bytes, Some(out.as_path()))
            .await
            .expect("inspect");

        assert!(out.exists());
        assert_eq!(inspection.checklist.missing().collect::<Vec<_>>(), vec!["helmet"]);
    }

    #[tokio::test]
    async fn detector_failure_propagates() {
        let inspector = GearInspector::new(BrokenDetector, BoxOverlayAnnotator::default(), "helmet");
        assert!(inspector.inspect(&image()).await.is_err());
    }
}
