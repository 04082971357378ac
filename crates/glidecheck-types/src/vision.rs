use serde::{Deserialize, Serialize};

/// One still image sampled from a video (or loaded from disk).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Raw RGBA pixel buffer, row-major.
    pub data: Vec<u8>,
    /// Seconds from the start of the source video. Zero for still images.
    pub timestamp: f64,
}

impl Frame {
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
            timestamp: 0.0,
        }
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

}

/// Axis-aligned box in normalized `[0, 1]` frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Pixel rectangle `(left, top, right, bottom)`, inclusive and clamped to
    /// the frame. `None` when the frame is empty or the box collapses.
    pub fn to_pixels(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        if width == 0 || height == 0 {
            return None;
        }
        let scale = |v: f32, max: u32| -> u32 {
            let px = (v.clamp(0.0, 1.0) * max as f32).round() as u32;
            px.min(max - 1)
        };
        let (lx, rx) = (self.x1.min(self.x2), self.x1.max(self.x2));
        let (ty, by) = (self.y1.min(self.y2), self.y1.max(self.y2));
        let left = scale(lx, width);
        let right = scale(rx, width);
        let top = scale(ty, height);
        let bottom = scale(by, height);
        if right < left || bottom < top {
            None
        } else {
            Some((left, top, right, bottom))
        }
    }
}

/// A labeled region recognised in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub bbox: BoundingBox,
    pub score: f32,
}

/// Presence report for a single configured safety item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistEntry {
    pub item: String,
    pub detected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GearChecklist {
    pub entries: Vec<ChecklistEntry>,
}

impl GearChecklist {
    /// Builds the checklist for `items`, in order, matching labels without
    /// regard to case or surrounding whitespace.
    pub fn evaluate<I, S>(items: I, detected_labels: &[String]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels: Vec<String> = detected_labels
            .iter()
            .map(|l| l.trim().to_lowercase())
            .collect();
        let entries = items
            .into_iter()
            .map(|item| {
                let item = item.as_ref().trim().to_string();
                let detected = labels.contains(&item.to_lowercase());
                ChecklistEntry { item, detected }
            })
            .collect();
        Self { entries }
    }

    pub fn all_present(&self) -> bool {
        self.entries.iter().all(|e| e.detected)
    }

    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| !e.detected)
            .map(|e| e.item.as_str())
    }
}

/// Splits a comma separated concept prompt into trimmed, non-empty items.
pub fn split_concepts(prompt: &str) -> Vec<String> {
    prompt
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
