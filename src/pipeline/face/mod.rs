pub mod cascade;
pub mod geometry;
pub mod landmark;
pub mod locator;

pub use cascade::*;
pub use geometry::*;
pub use landmark::*;
pub use locator::*;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::PipelineSettings;

#[derive(Error, Debug)]
pub enum FaceError {
    #[error("detector model not found at {0}")]
    ModelNotFound(PathBuf),

    #[error("detector initialization failed: {0}")]
    DetectorInit(String),

    #[error("detection failed: {0}")]
    Detection(String),
}

/// Which detector layer produced a crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceMethod {
    Landmark,
    Cascade,
}

impl std::fmt::Display for FaceMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Landmark => write!(f, "landmark"),
            Self::Cascade => write!(f, "cascade"),
        }
    }
}

/// A persisted face crop.
///
/// The file exists and is non-empty at the moment this is returned; its
/// lifetime is request-scoped and cleanup is the caller's responsibility.
#[derive(Debug, Clone, Serialize)]
pub struct FaceCrop {
    pub path: PathBuf,
    pub method: FaceMethod,
}

/// Loaded detector backends. The landmark layer is the accurate one; the
/// cascade layer keeps baseline availability when it is absent.
pub struct DetectorSet {
    pub landmark: Option<Arc<dyn LandmarkDetector>>,
    pub cascade: Option<Arc<dyn CascadeDetector>>,
}

impl DetectorSet {
    /// Load whichever backends the settings point at. A backend that fails
    /// to load is logged and skipped, never an error.
    pub fn load(settings: &PipelineSettings) -> Self {
        Self {
            landmark: load_landmark(settings),
            cascade: load_cascade(settings),
        }
    }

    pub fn empty() -> Self {
        Self {
            landmark: None,
            cascade: None,
        }
    }

    pub fn any_loaded(&self) -> bool {
        self.landmark.is_some() || self.cascade.is_some()
    }
}

#[cfg(feature = "onnx-face")]
fn load_landmark(settings: &PipelineSettings) -> Option<Arc<dyn LandmarkDetector>> {
    let path = settings.landmark_model_path.as_ref()?;
    match OnnxLandmarkDetector::load(path) {
        Ok(detector) => {
            info!(model = %path.display(), "landmark detector loaded");
            Some(Arc::new(detector))
        }
        Err(e) => {
            debug!(error = %e, "landmark detector unavailable");
            None
        }
    }
}

#[cfg(not(feature = "onnx-face"))]
fn load_landmark(settings: &PipelineSettings) -> Option<Arc<dyn LandmarkDetector>> {
    if settings.landmark_model_path.is_some() {
        debug!("landmark model configured but crate built without the onnx-face feature");
    }
    None
}

fn load_cascade(settings: &PipelineSettings) -> Option<Arc<dyn CascadeDetector>> {
    let path = settings.cascade_model_path.as_ref()?;
    match SeetaCascadeDetector::load(path, &settings.cascade) {
        Ok(detector) => {
            info!(model = %path.display(), "cascade detector loaded");
            Some(Arc::new(detector))
        }
        Err(e) => {
            debug!(error = %e, "cascade detector unavailable");
            None
        }
    }
}
