//! Layer-2 classical cascade face detection.
//!
//! The availability layer of the fallback chain: a funnel-structured
//! SeetaFace cascade running on the grayscale image. Less accurate than the
//! landmark layer, but needs only a small model file and no runtime.

use std::path::Path;
use std::sync::Mutex;

use image::GrayImage;

use super::geometry::{pixel_box, CropRegion};
use super::FaceError;

/// Classical detector tuning, shared by all backends.
#[derive(Debug, Clone)]
pub struct CascadeParams {
    /// Scale step between detection pyramid levels.
    pub scale_factor: f32,
    /// Neighbor agreement required to accept a window.
    pub min_neighbors: u32,
    /// Smallest face considered, in pixels.
    pub min_face_size: u32,
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.2,
            min_neighbors: 5,
            min_face_size: 20,
        }
    }
}

pub trait CascadeDetector: Send + Sync {
    /// Face regions in pixel coordinates, strongest first.
    fn detect(&self, gray: &GrayImage) -> Result<Vec<CropRegion>, FaceError>;
}

// ──────────────────────────────────────────────
// SeetaCascadeDetector
// ──────────────────────────────────────────────

/// SeetaFace cascade backend.
///
/// The backend's `detect` needs `&mut self`, so the state lives behind a
/// Mutex and the trait keeps its shared `&self` surface.
pub struct SeetaCascadeDetector {
    detector: Mutex<Box<dyn rustface::Detector>>,
}

// The SeetaFace state is owned exclusively behind the Mutex and holds no
// thread-affine resources; the lock serializes every access.
unsafe impl Send for SeetaCascadeDetector {}
unsafe impl Sync for SeetaCascadeDetector {}

// The inner `Box<dyn rustface::Detector>` is not `Debug`, so the derive can't
// reach it; an opaque impl lets the detector appear in `Result::unwrap_err`.
impl std::fmt::Debug for SeetaCascadeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeetaCascadeDetector").finish_non_exhaustive()
    }
}

impl SeetaCascadeDetector {
    /// Load the cascade model and apply the fixed detection parameters.
    pub fn load(model_path: &Path, params: &CascadeParams) -> Result<Self, FaceError> {
        if !model_path.exists() {
            return Err(FaceError::ModelNotFound(model_path.to_path_buf()));
        }
        let path = model_path.to_str().ok_or_else(|| {
            FaceError::DetectorInit("model path is not valid UTF-8".to_string())
        })?;

        let mut detector = rustface::create_detector(path)
            .map_err(|e| FaceError::DetectorInit(e.to_string()))?;

        // SeetaFace walks its pyramid by a shrink factor rather than a Haar
        // scale step: 1/scale_factor is the equivalent stride. Neighbor
        // agreement maps onto the classifier score threshold.
        detector.set_min_face_size(params.min_face_size);
        detector.set_pyramid_scale_factor(1.0 / params.scale_factor);
        detector.set_score_thresh(params.min_neighbors as f64);
        detector.set_slide_window_step(4, 4);

        Ok(Self {
            detector: Mutex::new(detector),
        })
    }
}

impl CascadeDetector for SeetaCascadeDetector {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<CropRegion>, FaceError> {
        let mut image = rustface::ImageData::new(gray.as_raw(), gray.width(), gray.height());

        let mut detector = self
            .detector
            .lock()
            .map_err(|_| FaceError::Detection("detector lock poisoned".to_string()))?;

        let faces = detector.detect(&mut image);
        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                pixel_box(
                    bbox.x(),
                    bbox.y(),
                    bbox.width(),
                    bbox.height(),
                    gray.width(),
                    gray.height(),
                )
            })
            .collect())
    }
}

// ──────────────────────────────────────────────
// MockCascadeDetector (testing)
// ──────────────────────────────────────────────

/// Mock cascade detector — replays configured pixel regions.
pub struct MockCascadeDetector {
    regions: Vec<(i32, i32, u32, u32)>,
}

impl MockCascadeDetector {
    pub fn new(regions: Vec<(i32, i32, u32, u32)>) -> Self {
        Self { regions }
    }

    /// Detector that never finds a face.
    pub fn finding_nothing() -> Self {
        Self { regions: vec![] }
    }
}

impl CascadeDetector for MockCascadeDetector {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<CropRegion>, FaceError> {
        Ok(self
            .regions
            .iter()
            .map(|&(x, y, w, h)| pixel_box(x, y, w, h, gray.width(), gray.height()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn default_params_match_fixed_tuning() {
        let params = CascadeParams::default();
        assert!((params.scale_factor - 1.2).abs() < f32::EPSILON);
        assert_eq!(params.min_neighbors, 5);
        assert_eq!(params.min_face_size, 20);
    }

    #[test]
    fn missing_model_file_reports_not_found() {
        let err = SeetaCascadeDetector::load(
            Path::new("/nonexistent/seeta.bin"),
            &CascadeParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FaceError::ModelNotFound(_)));
    }

    #[test]
    fn mock_reports_regions_in_order() {
        let detector = MockCascadeDetector::new(vec![(10, 10, 50, 50), (70, 5, 20, 20)]);
        let gray = GrayImage::from_pixel(100, 100, Luma([128]));
        let regions = detector.detect(&gray).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0], CropRegion { x1: 10, y1: 10, x2: 60, y2: 60 });
    }

    #[test]
    fn mock_finding_nothing_is_empty() {
        let detector = MockCascadeDetector::finding_nothing();
        let gray = GrayImage::from_pixel(50, 50, Luma([128]));
        assert!(detector.detect(&gray).unwrap().is_empty());
    }
}
