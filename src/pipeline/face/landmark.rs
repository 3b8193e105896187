//! Layer-1 landmark-based face detection.
//!
//! The accurate layer of the fallback chain. The production backend is an
//! UltraFace-style ONNX model behind the optional `onnx-face` feature; the
//! trait keeps the locator testable without model files on disk.

use image::RgbImage;

use super::geometry::RelativeBox;
use super::FaceError;

/// One landmark-model detection: relative box plus confidence.
#[derive(Debug, Clone, Copy)]
pub struct LandmarkDetection {
    pub bbox: RelativeBox,
    pub confidence: f32,
}

pub trait LandmarkDetector: Send + Sync {
    /// Detections with confidence at or above `min_confidence`.
    fn detect(
        &self,
        image: &RgbImage,
        min_confidence: f32,
    ) -> Result<Vec<LandmarkDetection>, FaceError>;
}

// ──────────────────────────────────────────────
// ONNX backend — behind `onnx-face` feature
// ──────────────────────────────────────────────

#[cfg(feature = "onnx-face")]
mod onnx {
    use std::path::Path;
    use std::sync::Mutex;

    use image::imageops::FilterType;
    use image::RgbImage;
    use ort::session::Session;

    use super::{LandmarkDetection, LandmarkDetector};
    use crate::pipeline::face::geometry::RelativeBox;
    use crate::pipeline::face::FaceError;

    /// Fixed input size of the RFB-320 face detection model.
    const INPUT_W: u32 = 320;
    const INPUT_H: u32 = 240;

    /// UltraFace-style ONNX face detector.
    ///
    /// The model takes a 320x240 RGB tensor and emits per-anchor scores
    /// `[1, N, 2]` and boxes `[1, N, 4]` whose corner coordinates are
    /// already normalized to `[0, 1]`.
    ///
    /// Uses interior mutability (Mutex) because `ort::Session::run` requires
    /// `&mut self` while the detector trait exposes `&self` for shared use.
    pub struct OnnxLandmarkDetector {
        session: Mutex<Session>,
    }

    impl OnnxLandmarkDetector {
        /// Load the detection model from an `.onnx` file.
        pub fn load(model_path: &Path) -> Result<Self, FaceError> {
            if !model_path.exists() {
                return Err(FaceError::ModelNotFound(model_path.to_path_buf()));
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| FaceError::DetectorInit(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| FaceError::DetectorInit(e.to_string()))?
                .commit_from_file(model_path)
                .map_err(|e: ort::Error| {
                    FaceError::DetectorInit(format!("ONNX load failed: {e}"))
                })?;

            Ok(Self {
                session: Mutex::new(session),
            })
        }

        fn infer(
            &self,
            image: &RgbImage,
            min_confidence: f32,
        ) -> Result<Vec<LandmarkDetection>, FaceError> {
            use ort::value::TensorRef;

            let resized =
                image::imageops::resize(image, INPUT_W, INPUT_H, FilterType::Triangle);

            let mut input =
                ndarray::Array4::<f32>::zeros((1, 3, INPUT_H as usize, INPUT_W as usize));
            for (x, y, pixel) in resized.enumerate_pixels() {
                for channel in 0..3 {
                    input[[0, channel, y as usize, x as usize]] =
                        (pixel.0[channel] as f32 - 127.0) / 128.0;
                }
            }

            let tensor = TensorRef::from_array_view(&input)
                .map_err(|e| FaceError::Detection(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| FaceError::Detection("Session lock poisoned".to_string()))?;

            let outputs = session
                .run(ort::inputs![tensor])
                .map_err(|e| FaceError::Detection(format!("ONNX inference failed: {e}")))?;

            let (score_shape, scores) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| FaceError::Detection(format!("score extraction: {e}")))?;
            let (box_shape, boxes) = outputs[1]
                .try_extract_tensor::<f32>()
                .map_err(|e| FaceError::Detection(format!("box extraction: {e}")))?;

            if score_shape.len() != 3
                || score_shape[2] != 2
                || box_shape.len() != 3
                || box_shape[2] != 4
            {
                return Err(FaceError::Detection(format!(
                    "unexpected output shapes: scores {score_shape:?}, boxes {box_shape:?}"
                )));
            }

            let count = score_shape[1] as usize;
            let mut detections = Vec::new();
            for i in 0..count {
                let confidence = scores[i * 2 + 1];
                if confidence < min_confidence {
                    continue;
                }
                let x1 = boxes[i * 4];
                let y1 = boxes[i * 4 + 1];
                let x2 = boxes[i * 4 + 2];
                let y2 = boxes[i * 4 + 3];
                detections.push(LandmarkDetection {
                    bbox: RelativeBox {
                        xmin: x1,
                        ymin: y1,
                        width: (x2 - x1).max(0.0),
                        height: (y2 - y1).max(0.0),
                    },
                    confidence,
                });
            }

            Ok(detections)
        }
    }

    impl LandmarkDetector for OnnxLandmarkDetector {
        fn detect(
            &self,
            image: &RgbImage,
            min_confidence: f32,
        ) -> Result<Vec<LandmarkDetection>, FaceError> {
            self.infer(image, min_confidence)
        }
    }
}

#[cfg(feature = "onnx-face")]
pub use onnx::OnnxLandmarkDetector;

// ──────────────────────────────────────────────
// MockLandmarkDetector (testing)
// ──────────────────────────────────────────────

/// Mock landmark detector — replays configured detections, or fails.
pub struct MockLandmarkDetector {
    detections: Vec<LandmarkDetection>,
    fail: bool,
}

impl MockLandmarkDetector {
    pub fn new(detections: Vec<LandmarkDetection>) -> Self {
        Self {
            detections,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            detections: vec![],
            fail: true,
        }
    }
}

impl LandmarkDetector for MockLandmarkDetector {
    fn detect(
        &self,
        _image: &RgbImage,
        min_confidence: f32,
    ) -> Result<Vec<LandmarkDetection>, FaceError> {
        if self.fail {
            return Err(FaceError::Detection("mock detector failure".into()));
        }
        Ok(self
            .detections
            .iter()
            .copied()
            .filter(|d| d.confidence >= min_confidence)
            .collect())
    }
}
