use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{vision::split_concepts, GlideError, Result};

pub const DEFAULT_SAFETY_ITEMS: &str = "helmet, harness, footwear, gloves, parachute";
pub const DEFAULT_MANEUVERS: &str = "spiral dive, wing over, full stall, asymmetric collapse";
pub const DEFAULT_STORY_PROMPT: &str = "Describe the video in detail as a story of paragliding.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub ffmpeg_path: Option<String>,
    /// Frames sampled per second of source video.
    pub sample_fps: f64,
    pub output_path: String,
    /// Scratch space for extracted and encoded frames. System temp dir when unset.
    pub work_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    pub endpoint: String,
    pub api_key_env: String,
    pub box_threshold: f32,
    pub timeout_secs: u64,
    pub safety_items: String,
    pub maneuvers: String,
    pub overlay_thickness: u32,
    /// Draw a label tag above each box.
    #[serde(default = "default_overlay_labels")]
    pub overlay_labels: bool,
}

fn default_overlay_labels() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarratorConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub prompt: String,
    pub max_tokens: u32,
    /// Upper bound on keyframes attached to a single request.
    pub max_frames: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    pub log_level: String,
    pub report_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlideConfig {
    pub media: MediaConfig,
    pub vision: VisionConfig,
    pub narrator: NarratorConfig,
    pub ops: OpsConfig,
}

impl Default for GlideConfig {
    fn default() -> Self {
        Self {
            media: MediaConfig {
                ffmpeg_path: None,
                sample_fps: 1.0,
                output_path: "annotated_paragliding.mp4".into(),
                work_dir: None,
            },
            vision: VisionConfig {
                endpoint: "https://api.landing.ai/v1/tools/owlv2".into(),
                api_key_env: "VISION_AGENT_API_KEY".into(),
                box_threshold: 0.1,
                timeout_secs: 60,
                safety_items: DEFAULT_SAFETY_ITEMS.into(),
                maneuvers: DEFAULT_MANEUVERS.into(),
                overlay_thickness: 3,
                overlay_labels: true,
            },
            narrator: NarratorConfig {
                base_url: "https://api.anthropic.com/v1".into(),
                model: "claude-3-5-sonnet-20240620".into(),
                api_key_env: "ANTHROPIC_API_KEY".into(),
                prompt: DEFAULT_STORY_PROMPT.into(),
                max_tokens: 1024,
                max_frames: 10,
                timeout_secs: 120,
            },
            ops: OpsConfig {
                log_level: "info".into(),
                report_dir: "reports".into(),
            },
        }
    }
}

impl GlideConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            GlideError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            GlideError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.media.sample_fps.is_finite() && self.media.sample_fps > 0.0) {
            return Err(GlideError::Configuration(
                "media.sample_fps must be greater than zero".into(),
            ));
        }
        if self.media.output_path.trim().is_empty() {
            return Err(GlideError::Configuration(
                "media.output_path must not be empty".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.vision.box_threshold) {
            return Err(GlideError::Configuration(
                "vision.box_threshold must be between 0.0 and 1.0".into(),
            ));
        }
        if split_concepts(&self.vision.safety_items).is_empty() {
            return Err(GlideError::Configuration(
                "vision.safety_items must name at least one item".into(),
            ));
        }
        if split_concepts(&self.vision.maneuvers).is_empty() {
            return Err(GlideError::Configuration(
                "vision.maneuvers must name at least one maneuver".into(),
            ));
        }
        if self.vision.overlay_thickness == 0 {
            return Err(GlideError::Configuration(
                "vision.overlay_thickness must be greater than zero".into(),
            ));
        }
        if self.narrator.max_frames == 0 {
            return Err(GlideError::Configuration(
                "narrator.max_frames must be greater than zero".into(),
            ));
        }
        if self.narrator.max_tokens == 0 {
            return Err(GlideError::Configuration(
                "narrator.max_tokens must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
