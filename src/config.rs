//! Pipeline configuration.
//!
//! One settings struct drives the whole pipeline: where the vision engine
//! lives, which models are acceptable, how long a request may run, where
//! scratch artifacts land, and where the optional detector models are found.
//! `from_env()` reads `IDVAULT_*` overrides; `Default` is a working local
//! setup.

use std::path::PathBuf;

use crate::pipeline::face::cascade::CascadeParams;

/// Preferred vision-capable models, best first. The capability probe picks
/// the first one the engine actually serves.
const VISION_MODELS: &[&str] = &[
    "llava",
    "llava:13b",
    "llama3.2-vision",
    "minicpm-v",
    "moondream",
];

/// Default request timeout. Streamed responses must finish within this
/// bound; a slow model surfaces as a timeout inside the stage result, not
/// as a hang.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Base URL of the local Ollama instance.
    pub base_url: String,
    /// Vision model preference list, best first.
    pub vision_models: Vec<String>,
    /// Upper bound on any single engine request, in seconds.
    pub request_timeout_secs: u64,
    /// Directory for request-scoped artifacts (face crops, probe markers).
    pub scratch_dir: PathBuf,
    /// Minimum landmark-detection confidence. Detections below this are
    /// discarded before the best-box selection.
    pub min_detection_confidence: f32,
    /// Classical cascade detector tuning.
    pub cascade: CascadeParams,
    /// Path to the ONNX landmark-detection model, if installed.
    pub landmark_model_path: Option<PathBuf>,
    /// Path to the SeetaFace cascade model, if installed.
    pub cascade_model_path: Option<PathBuf>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            vision_models: VISION_MODELS.iter().map(|m| m.to_string()).collect(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            scratch_dir: std::env::temp_dir().join("idvault"),
            min_detection_confidence: 0.5,
            cascade: CascadeParams::default(),
            landmark_model_path: None,
            cascade_model_path: None,
        }
    }
}

impl PipelineSettings {
    /// Build settings from the environment, falling back to defaults.
    ///
    /// Recognized variables: `IDVAULT_OLLAMA_URL`, `IDVAULT_VISION_MODEL`
    /// (prepended to the preference list), `IDVAULT_TIMEOUT_SECS`,
    /// `IDVAULT_SCRATCH_DIR`, `IDVAULT_LANDMARK_MODEL`,
    /// `IDVAULT_CASCADE_MODEL`.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(url) = std::env::var("IDVAULT_OLLAMA_URL") {
            if !url.trim().is_empty() {
                settings.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(model) = std::env::var("IDVAULT_VISION_MODEL") {
            if !model.trim().is_empty() {
                settings.vision_models.insert(0, model.trim().to_string());
            }
        }
        if let Ok(secs) = std::env::var("IDVAULT_TIMEOUT_SECS") {
            if let Ok(parsed) = secs.trim().parse::<u64>() {
                if parsed > 0 {
                    settings.request_timeout_secs = parsed;
                }
            }
        }
        if let Ok(dir) = std::env::var("IDVAULT_SCRATCH_DIR") {
            if !dir.trim().is_empty() {
                settings.scratch_dir = PathBuf::from(dir.trim());
            }
        }
        if let Ok(path) = std::env::var("IDVAULT_LANDMARK_MODEL") {
            if !path.trim().is_empty() {
                settings.landmark_model_path = Some(PathBuf::from(path.trim()));
            }
        }
        if let Ok(path) = std::env::var("IDVAULT_CASCADE_MODEL") {
            if !path.trim().is_empty() {
                settings.cascade_model_path = Some(PathBuf::from(path.trim()));
            }
        }

        settings
    }
}
