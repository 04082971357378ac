use std::{fmt, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which collaborator rejected a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Detection,
    Annotation,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Detection => f.write_str("detection"),
            FailureStage::Annotation => f.write_str("annotation"),
        }
    }
}

/// A frame that was passed through unannotated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameFailure {
    pub index: usize,
    pub stage: FailureStage,
    pub message: String,
}

impl fmt::Display for FrameFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {} {} failed: {}",
            self.index, self.stage, self.message
        )
    }
}

/// Summary of one video annotation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationRun {
    /// Serialized artifact; `None` when the input had no frames.
    pub output: Option<PathBuf>,
    pub frame_count: usize,
    pub failures: Vec<FrameFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AnnotationRun {
    pub fn annotated_count(&self) -> usize {
        self.frame_count - self.failures.len()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
