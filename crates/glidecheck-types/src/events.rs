use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{report::FrameFailure, vision::GearChecklist};

/// High-level event bus message kinds moving through the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Lifecycle,
    Progress,
    FrameFailed,
    Checklist,
    Narration,
}

/// Immutable event envelope for logging and subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Lifecycle(LifecycleEvent),
    Progress(ProgressEvent),
    FrameFailed(FrameFailure),
    Checklist(GearChecklist),
    Narration(NarrationEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub phase: LifecyclePhase,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LifecyclePhase {
    InspectionStart,
    InspectionEnd,
    AnnotationStart,
    AnnotationEnd,
    NarrationStart,
    NarrationEnd,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    /// Completed frames over total, in `(0, 1]`.
    pub fraction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationEvent {
    pub text: String,
}

impl PipelineEvent {
    pub fn new(payload: EventPayload) -> Self {
        let kind = match &payload {
            EventPayload::Lifecycle(_) => EventKind::Lifecycle,
            EventPayload::Progress(_) => EventKind::Progress,
            EventPayload::FrameFailed(_) => EventKind::FrameFailed,
            EventPayload::Checklist(_) => EventKind::Checklist,
            EventPayload::Narration(_) => EventKind::Narration,
        };
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn lifecycle(phase: LifecyclePhase, details: Option<String>) -> Self {
        Self::new(EventPayload::Lifecycle(LifecycleEvent {
            phase,
            details,
        }))
    }

    pub fn progress(fraction: f64) -> Self {
        Self::new(EventPayload::Progress(ProgressEvent { fraction }))
    }
}
