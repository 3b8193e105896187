//! Summary report synthesis.
//!
//! Lays out a fixed rounded card on an A4 page: optional face thumbnail in
//! the card's top-left, labeled identity fields beside it, a word-wrapped
//! address block, and a truncated footer with the extra bag. This is the
//! one place where capability absence is fatal, since the component exists
//! to produce the artifact. Everything below that is soft: a missing field
//! renders as an empty string, a broken thumbnail is logged and skipped.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use printpdf::image_crate::GenericImageView;
use printpdf::{
    image_crate, BuiltinFont, Color, ImageTransform, Line, Mm, PdfDocument, PdfLayerReference,
    Point, Rgb,
};
use tracing::{info, warn};

use crate::capabilities::CapabilityRegistry;
use crate::pipeline::vision::ExtractedFields;

use super::layout::{footer_lines, wrap_text, ADDRESS_WRAP_WIDTH};
use super::ReportError;

// ──────────────────────────────────────────────
// Page geometry (mm, origin bottom-left)
// ──────────────────────────────────────────────

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;

const CARD_X: f32 = 24.7;
const CARD_Y: f32 = 158.8;
const CARD_W: f32 = 169.3;
const CARD_H: f32 = 88.2;
const CARD_RADIUS: f32 = 7.1;

/// Face thumbnail slot in the card's top-left.
const PHOTO_X: f32 = CARD_X + 7.1;
const PHOTO_Y: f32 = CARD_Y + CARD_H - 52.9;
const PHOTO_SIZE: f32 = 42.3;

/// Labeled fields to the right of the photo.
const TEXT_X: f32 = CARD_X + 60.0;
const TEXT_Y: f32 = CARD_Y + CARD_H - 31.8;
const FIELD_LINE_STEP: f32 = 7.1;

/// Address block in the card's lower half.
const ADDRESS_X: f32 = CARD_X + 8.8;
const ADDRESS_LABEL_Y: f32 = CARD_Y + 14.1;
const ADDRESS_LINE_STEP: f32 = 5.3;

/// Footer block near the bottom of the page.
const FOOTER_X: f32 = 24.7;
const FOOTER_Y: f32 = 28.2;
const FOOTER_LINE_STEP: f32 = 4.2;

/// Cubic-bezier circle approximation constant for the card corners.
const CORNER_KAPPA: f32 = 0.5523;

pub struct ReportSynthesizer {
    renderer_available: bool,
}

impl ReportSynthesizer {
    pub fn new(registry: &CapabilityRegistry) -> Self {
        Self {
            renderer_available: registry.flags().renderer,
        }
    }

    /// Render the summary PDF to `output`.
    ///
    /// Always writes a document when the renderer is available, even when
    /// every input is empty. Renderer absence is the pipeline's single hard
    /// failure.
    pub fn render(
        &self,
        fields: &ExtractedFields,
        face_path: Option<&Path>,
        output: &Path,
    ) -> Result<(), ReportError> {
        if !self.renderer_available {
            return Err(ReportError::RendererUnavailable);
        }
        let _span = tracing::info_span!("render_report", output = %output.display()).entered();

        let (doc, page, layer) =
            PdfDocument::new("Identity Document Summary", Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);

        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ReportError::Pdf(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ReportError::Pdf(e.to_string()))?;
        let mono = doc
            .add_builtin_font(BuiltinFont::Courier)
            .map_err(|e| ReportError::Pdf(e.to_string()))?;

        draw_card_outline(&layer);

        // Face thumbnail: a drawing failure is logged and the layout
        // continues without the image.
        if let Some(path) = face_path {
            if path.exists() {
                if let Err(e) = draw_face_thumbnail(&layer, path) {
                    warn!(error = %e, "face thumbnail draw failed; continuing without image");
                }
            }
        }

        // Labeled fields. Absent values render as empty strings.
        let text = |value: &Option<String>| value.as_deref().unwrap_or("").to_string();
        layer.use_text(text(&fields.name), 16.0, Mm(TEXT_X), Mm(TEXT_Y), &bold);
        layer.use_text(
            format!("DOB: {}", text(&fields.dob)),
            12.0,
            Mm(TEXT_X),
            Mm(TEXT_Y - FIELD_LINE_STEP),
            &font,
        );
        layer.use_text(
            format!("Gender: {}", text(&fields.gender)),
            12.0,
            Mm(TEXT_X),
            Mm(TEXT_Y - 2.0 * FIELD_LINE_STEP),
            &font,
        );
        layer.use_text(
            format!("ID No: {}", text(&fields.id_number)),
            12.0,
            Mm(TEXT_X),
            Mm(TEXT_Y - 3.0 * FIELD_LINE_STEP),
            &font,
        );

        // Address block, wrapped at a fixed column width.
        layer.use_text("Address:", 13.0, Mm(ADDRESS_X), Mm(ADDRESS_LABEL_Y), &bold);
        let address = text(&fields.address);
        for (i, line) in wrap_text(&address, ADDRESS_WRAP_WIDTH).iter().enumerate() {
            layer.use_text(line.as_str(), 12.0, Mm(ADDRESS_X), Mm(address_line_y(i)), &font);
        }

        // Footer: bounded dump of the extra bag.
        for (i, line) in footer_lines(&fields.extra).iter().enumerate() {
            layer.use_text(line.as_str(), 10.0, Mm(FOOTER_X), Mm(footer_line_y(i)), &mono);
        }

        let file = File::create(output)?;
        doc.save(&mut BufWriter::new(file))
            .map_err(|e| ReportError::Pdf(e.to_string()))?;

        info!(output = %output.display(), "report written");
        Ok(())
    }
}

/// Baseline of the i-th wrapped address line. Strictly descending on the
/// page: each wrapped segment lands below the previous one.
fn address_line_y(index: usize) -> f32 {
    ADDRESS_LABEL_Y - FIELD_LINE_STEP - ADDRESS_LINE_STEP * index as f32
}

/// Baseline of the i-th footer line.
fn footer_line_y(index: usize) -> f32 {
    FOOTER_Y - FOOTER_LINE_STEP * index as f32
}

fn draw_card_outline(layer: &PdfLayerReference) {
    layer.set_outline_color(Color::Rgb(Rgb::new(0.1, 0.1, 0.1, None)));
    layer.set_outline_thickness(1.0);
    layer.add_line(rounded_rect(CARD_X, CARD_Y, CARD_W, CARD_H, CARD_RADIUS));
}

/// Rounded-rectangle outline. Corners are quarter-circle cubic beziers; a
/// `true` flag on the anchor opening a corner and on its two control points
/// is what makes the path writer emit a curve instead of line segments.
fn rounded_rect(x: f32, y: f32, w: f32, h: f32, r: f32) -> Line {
    let k = r * CORNER_KAPPA;
    let pt = |px: f32, py: f32, curve: bool| (Point::new(Mm(px), Mm(py)), curve);

    let points = vec![
        pt(x + r, y, false),
        // bottom edge, bottom-right corner
        pt(x + w - r, y, true),
        pt(x + w - r + k, y, true),
        pt(x + w, y + r - k, true),
        pt(x + w, y + r, false),
        // right edge, top-right corner
        pt(x + w, y + h - r, true),
        pt(x + w, y + h - r + k, true),
        pt(x + w - r + k, y + h, true),
        pt(x + w - r, y + h, false),
        // top edge, top-left corner
        pt(x + r, y + h, true),
        pt(x + r - k, y + h, true),
        pt(x, y + h - r + k, true),
        pt(x, y + h - r, false),
        // left edge, bottom-left corner
        pt(x, y + r, true),
        pt(x, y + r - k, true),
        pt(x + r - k, y, true),
        pt(x + r, y, false),
    ];

    Line {
        points,
        is_closed: true,
    }
}

/// Decode the face crop and place it into the fixed photo slot.
fn draw_face_thumbnail(layer: &PdfLayerReference, path: &Path) -> Result<(), ReportError> {
    let decoded = image_crate::open(path).map_err(|e| ReportError::Thumbnail(e.to_string()))?;
    let (px_w, px_h) = decoded.dimensions();
    if px_w == 0 || px_h == 0 {
        return Err(ReportError::Thumbnail("face crop is empty".into()));
    }

    // printpdf places images at their 300-dpi natural size; scale the crop
    // into the fixed square slot.
    let natural_w = px_w as f32 * 25.4 / 300.0;
    let natural_h = px_h as f32 * 25.4 / 300.0;

    let image = printpdf::Image::from_dynamic_image(&decoded);
    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(PHOTO_X)),
            translate_y: Some(Mm(PHOTO_Y)),
            scale_x: Some(PHOTO_SIZE / natural_w),
            scale_y: Some(PHOTO_SIZE / natural_h),
            ..Default::default()
        },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};
    use tempfile::TempDir;

    fn synthesizer(renderer: bool) -> ReportSynthesizer {
        ReportSynthesizer::new(&CapabilityRegistry::with_flags(false, false, renderer))
    }

    fn sample_fields() -> ExtractedFields {
        let mut extra = Map::new();
        extra.insert("issuer".into(), Value::String("Transport Dept".into()));
        ExtractedFields {
            name: Some("Jane Doe".into()),
            dob: Some("1990-01-01".into()),
            gender: Some("F".into()),
            id_number: Some("1234 5678 9012".into()),
            address: Some("42 Elm Street, Springfield".into()),
            father_name: Some("John Doe".into()),
            extra,
            error: None,
        }
    }

    #[test]
    fn renderer_absence_is_a_hard_failure() {
        let out = TempDir::new().unwrap();
        let result = synthesizer(false).render(
            &ExtractedFields::default(),
            None,
            &out.path().join("report.pdf"),
        );
        assert!(matches!(result, Err(ReportError::RendererUnavailable)));
    }

    #[test]
    fn empty_inputs_still_produce_a_nonempty_file() {
        let out = TempDir::new().unwrap();
        let path = out.path().join("report.pdf");
        synthesizer(true)
            .render(&ExtractedFields::default(), None, &path)
            .unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn full_fields_produce_a_nonempty_file() {
        let out = TempDir::new().unwrap();
        let path = out.path().join("report.pdf");
        synthesizer(true).render(&sample_fields(), None, &path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn missing_face_file_is_skipped_silently() {
        let out = TempDir::new().unwrap();
        let path = out.path().join("report.pdf");
        synthesizer(true)
            .render(
                &sample_fields(),
                Some(Path::new("/nonexistent/face.jpg")),
                &path,
            )
            .unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn corrupt_face_file_does_not_abort_synthesis() {
        let out = TempDir::new().unwrap();
        let face = out.path().join("face.jpg");
        std::fs::write(&face, b"not actually a jpeg").unwrap();

        let path = out.path().join("report.pdf");
        synthesizer(true)
            .render(&sample_fields(), Some(&face), &path)
            .unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn long_address_and_huge_extra_bag_render() {
        let mut fields = sample_fields();
        fields.address = Some("a".repeat(200));
        for i in 0..50 {
            fields
                .extra
                .insert(format!("k{i}"), Value::String("v".repeat(300)));
        }

        let out = TempDir::new().unwrap();
        let path = out.path().join("report.pdf");
        synthesizer(true).render(&fields, None, &path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn address_baselines_descend_strictly() {
        let ys: Vec<f32> = (0..4).map(address_line_y).collect();
        for pair in ys.windows(2) {
            assert!(pair[1] < pair[0], "baselines must descend: {ys:?}");
        }
        // All address lines stay inside the card.
        assert!(ys.iter().all(|&y| y > CARD_Y && y < CARD_Y + CARD_H));
    }

    #[test]
    fn footer_baselines_descend_and_stay_on_page() {
        let ys: Vec<f32> = (0..super::super::layout::FOOTER_MAX_LINES)
            .map(footer_line_y)
            .collect();
        for pair in ys.windows(2) {
            assert!(pair[1] < pair[0]);
        }
        assert!(ys.iter().all(|&y| y > 0.0));
    }
}
