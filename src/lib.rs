//! Identity-document processing pipeline.
//!
//! Takes a photographed or scanned identity document and produces a
//! structured field extraction, an authenticity assessment, an optional
//! cropped face image, and a synthesized PDF summary combining all three.
//!
//! Every stage except report synthesis degrades instead of failing: with
//! engines missing the pipeline yields emptier results, and transport
//! failures are folded into the stage result. Which engines are usable is
//! decided once at startup by [`CapabilityRegistry`] and never re-probed.

pub mod capabilities;
pub mod config;
pub mod pipeline;

pub use capabilities::{CapabilityFlags, CapabilityRegistry};
pub use config::PipelineSettings;
pub use pipeline::processor::{
    DocumentImage, DocumentProcessor, PipelineError, ProcessedDocument,
};
