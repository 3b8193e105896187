//! Layered face location.
//!
//! Layer 1 (landmark) is tried first when its backend is loaded; on any
//! failure there (backend error, nothing detected, empty expanded region,
//! write failure) the chain falls through to layer 2 (cascade), which takes
//! the first reported region with no padding. Either layer persists the
//! crop as a JPEG named after the invocation id. The whole chain degrades
//! to absent; it never raises.

use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Arc;

use image::RgbImage;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::pipeline::imaging;

use super::cascade::CascadeDetector;
use super::geometry::{expand_relative, CropRegion};
use super::landmark::LandmarkDetector;
use super::{DetectorSet, FaceCrop, FaceMethod};

pub struct FaceLocator {
    landmark: Option<Arc<dyn LandmarkDetector>>,
    cascade: Option<Arc<dyn CascadeDetector>>,
    min_confidence: f32,
    scratch_dir: PathBuf,
}

impl FaceLocator {
    pub fn new(detectors: DetectorSet, min_confidence: f32, scratch_dir: PathBuf) -> Self {
        Self {
            landmark: detectors.landmark,
            cascade: detectors.cascade,
            min_confidence,
            scratch_dir,
        }
    }

    /// Locate and persist the document holder's face.
    ///
    /// Absent when the image is unusable, no layer detects anything, or the
    /// crop cannot be written.
    pub fn locate(&self, image_bytes: &[u8], job_id: Uuid) -> Option<FaceCrop> {
        let _span = tracing::info_span!("locate_face", %job_id).entered();

        let image = match imaging::load_oriented(image_bytes) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                debug!(error = %e, "face location skipped: image unusable");
                return None;
            }
        };
        if image.width() == 0 || image.height() == 0 {
            return None;
        }

        if let Some(crop) = self.try_landmark(&image, job_id) {
            return Some(crop);
        }
        self.try_cascade(&image, job_id)
    }

    fn try_landmark(&self, image: &RgbImage, job_id: Uuid) -> Option<FaceCrop> {
        let detector = self.landmark.as_ref()?;

        let detections = match detector.detect(image, self.min_confidence) {
            Ok(d) => d,
            Err(e) => {
                debug!(error = %e, "landmark detection failed, falling through");
                return None;
            }
        };

        let best = detections.into_iter().max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(Ordering::Equal)
        })?;

        let region = expand_relative(&best.bbox, image.width(), image.height());
        if region.is_empty() {
            debug!("expanded landmark box collapsed to an empty region");
            return None;
        }

        self.persist(image, &region, FaceMethod::Landmark, job_id)
    }

    fn try_cascade(&self, image: &RgbImage, job_id: Uuid) -> Option<FaceCrop> {
        let detector = self.cascade.as_ref()?;

        let gray = image::imageops::grayscale(image);
        let regions = match detector.detect(&gray) {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "cascade detection failed");
                return None;
            }
        };

        let region = regions.into_iter().next()?;
        if region.is_empty() {
            return None;
        }

        self.persist(image, &region, FaceMethod::Cascade, job_id)
    }

    fn persist(
        &self,
        image: &RgbImage,
        region: &CropRegion,
        method: FaceMethod,
        job_id: Uuid,
    ) -> Option<FaceCrop> {
        let crop = image::imageops::crop_imm(
            image,
            region.x1,
            region.y1,
            region.width(),
            region.height(),
        )
        .to_image();

        if let Err(e) = std::fs::create_dir_all(&self.scratch_dir) {
            warn!(error = %e, "cannot create scratch directory");
            return None;
        }

        // Named after the invocation, never the input file: two concurrent
        // documents sharing a name must not clobber each other's crops.
        let path = self.scratch_dir.join(format!("face_{job_id}.jpg"));
        if let Err(e) = crop.save(&path) {
            warn!(error = %e, path = %path.display(), "face crop write failed");
            return None;
        }

        // Contract: the returned file exists and is non-empty.
        match std::fs::metadata(&path) {
            Ok(meta) if meta.len() > 0 => {
                info!(path = %path.display(), method = %method, "face crop saved");
                Some(FaceCrop { path, method })
            }
            _ => None,
        }
    }
}
