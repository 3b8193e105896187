//! Pipeline orchestration.
//!
//! One invocation runs the stages in order: field extraction, authenticity
//! scoring, face location, report synthesis. The first three degrade on any
//! failure and the pipeline proceeds with what it has; only report
//! synthesis can surface an error, and only when the renderer capability is
//! absent or the artifact cannot be written.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::capabilities::CapabilityRegistry;
use crate::config::PipelineSettings;

use super::face::{DetectorSet, FaceCrop, FaceLocator};
use super::report::{ReportError, ReportSynthesizer};
use super::vision::{
    AuthenticityReport, AuthenticityScorer, ExtractedFields, FieldExtractor, ImagePayload,
    OllamaVisionClient, VisionClient,
};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("report synthesis failed: {0}")]
    Report(#[from] ReportError),
}

/// Input document: a file on disk or an in-memory buffer with a MIME type.
#[derive(Debug, Clone)]
pub enum DocumentImage {
    Path(PathBuf),
    Bytes { data: Vec<u8>, mime: String },
}

impl DocumentImage {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn from_bytes(data: Vec<u8>, mime: impl Into<String>) -> Self {
        Self::Bytes {
            data,
            mime: mime.into(),
        }
    }

    /// MIME type, inferred from the extension for path inputs.
    pub fn mime(&self) -> String {
        match self {
            Self::Path(path) => mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
            Self::Bytes { mime, .. } => mime.clone(),
        }
    }

    fn read_bytes(&self) -> std::io::Result<Cow<'_, [u8]>> {
        match self {
            Self::Path(path) => Ok(Cow::Owned(std::fs::read(path)?)),
            Self::Bytes { data, .. } => Ok(Cow::Borrowed(data)),
        }
    }
}

/// Everything one invocation produced.
#[derive(Debug)]
pub struct ProcessedDocument {
    pub job_id: Uuid,
    pub fields: ExtractedFields,
    pub authenticity: AuthenticityReport,
    pub face_crop: Option<FaceCrop>,
    pub report_path: PathBuf,
}

pub struct DocumentProcessor {
    fields: FieldExtractor,
    authenticity: AuthenticityScorer,
    locator: FaceLocator,
    synthesizer: ReportSynthesizer,
}

impl DocumentProcessor {
    /// Production wiring: build the client and detectors from settings,
    /// probe capabilities once, assemble the stages.
    pub fn from_settings(settings: PipelineSettings) -> Self {
        let client: Arc<dyn VisionClient> = Arc::new(OllamaVisionClient::new(
            &settings.base_url,
            settings.request_timeout_secs,
        ));
        let detectors = DetectorSet::load(&settings);
        let registry = Arc::new(CapabilityRegistry::probe(
            &settings,
            client.as_ref(),
            &detectors,
        ));
        Self::assemble(settings, client, detectors, registry)
    }

    /// Explicit wiring, for tests and alternative engines.
    pub fn assemble(
        settings: PipelineSettings,
        client: Arc<dyn VisionClient>,
        detectors: DetectorSet,
        registry: Arc<CapabilityRegistry>,
    ) -> Self {
        Self {
            fields: FieldExtractor::new(client.clone(), registry.clone()),
            authenticity: AuthenticityScorer::new(client, registry.clone()),
            locator: FaceLocator::new(
                detectors,
                settings.min_detection_confidence,
                settings.scratch_dir.clone(),
            ),
            synthesizer: ReportSynthesizer::new(&registry),
        }
    }

    /// Run the full pipeline over one document.
    pub fn process(
        &self,
        input: &DocumentImage,
        report_out: &Path,
    ) -> Result<ProcessedDocument, PipelineError> {
        let job_id = Uuid::new_v4();
        let _span = tracing::info_span!("process_document", %job_id).entered();

        let bytes = match input.read_bytes() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(error = %e, "document image unreadable; downstream stages degrade");
                None
            }
        };

        let (fields, authenticity, face_crop) = match bytes.as_deref() {
            Some(data) => {
                let payload = ImagePayload::encode(data, &input.mime());
                let fields = self.fields.extract(&payload);
                let authenticity = self.authenticity.score(&payload);
                let face_crop = self.locator.locate(data, job_id);
                (fields, authenticity, face_crop)
            }
            None => (
                ExtractedFields::degraded("document image unreadable"),
                AuthenticityReport::degraded("document image unreadable"),
                None,
            ),
        };

        self.synthesizer.render(
            &fields,
            face_crop.as_ref().map(|c| c.path.as_path()),
            report_out,
        )?;

        info!(
            face = face_crop.is_some(),
            score = authenticity.score,
            "document processed"
        );

        Ok(ProcessedDocument {
            job_id,
            fields,
            authenticity,
            face_crop,
            report_path: report_out.to_path_buf(),
        })
    }
}
