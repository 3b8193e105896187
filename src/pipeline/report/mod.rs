pub mod layout;
pub mod synthesizer;

pub use layout::*;
pub use synthesizer::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("document renderer is unavailable")]
    RendererUnavailable,

    #[error("PDF generation failed: {0}")]
    Pdf(String),

    #[error("thumbnail embedding failed: {0}")]
    Thumbnail(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
