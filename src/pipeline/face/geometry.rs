//! Bounding-box math for face crops.
//!
//! Detection boxes arrive either normalized (landmark layer) or in pixels
//! (cascade layer). Everything funnels through `CropRegion`, which is
//! clamped to image bounds at construction, so downstream cropping can
//! never read outside the image.

/// Horizontal padding added on each side: 25 % of box width.
pub const PAD_X_RATIO: f32 = 0.25;

/// Vertical padding added on each side: 28 % of box height. Taller than
/// wide so forehead and chin stay inside the crop.
pub const PAD_Y_RATIO: f32 = 0.28;

/// Detection box with coordinates normalized to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeBox {
    pub xmin: f32,
    pub ymin: f32,
    pub width: f32,
    pub height: f32,
}

/// Pixel-space crop region clamped to image bounds. `x2`/`y2` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl CropRegion {
    /// Build from corner coordinates, clamping into `[0, w] × [0, h]`.
    pub fn from_corners(x1: i64, y1: i64, x2: i64, y2: i64, img_w: u32, img_h: u32) -> Self {
        let cx = |v: i64| v.clamp(0, img_w as i64) as u32;
        let cy = |v: i64| v.clamp(0, img_h as i64) as u32;
        Self {
            x1: cx(x1),
            y1: cy(y1),
            x2: cx(x2),
            y2: cy(y2),
        }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn is_empty(&self) -> bool {
        self.x2 <= self.x1 || self.y2 <= self.y1
    }
}

/// Convert a relative detection box to pixels and expand it asymmetrically.
pub fn expand_relative(rel: &RelativeBox, img_w: u32, img_h: u32) -> CropRegion {
    let x = (rel.xmin * img_w as f32) as i64;
    let y = (rel.ymin * img_h as f32) as i64;
    let bw = (rel.width * img_w as f32) as i64;
    let bh = (rel.height * img_h as f32) as i64;

    let pad_x = (bw as f32 * PAD_X_RATIO) as i64;
    let pad_y = (bh as f32 * PAD_Y_RATIO) as i64;

    CropRegion::from_corners(
        x - pad_x,
        y - pad_y,
        x + bw + pad_x,
        y + bh + pad_y,
        img_w,
        img_h,
    )
}

/// Pixel box exactly as reported, no padding (cascade layer).
pub fn pixel_box(x: i32, y: i32, w: u32, h: u32, img_w: u32, img_h: u32) -> CropRegion {
    CropRegion::from_corners(
        x as i64,
        y as i64,
        x as i64 + w as i64,
        y as i64 + h as i64,
        img_w,
        img_h,
    )
}
