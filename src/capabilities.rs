//! Capability registry.
//!
//! Probes each optional engine once at startup and records three immutable
//! flags. Every stage consults the registry before doing work that needs a
//! flag and substitutes a neutral result when it is off: capability absence
//! is a reduction in populated output, never an error, except for the
//! renderer whose absence makes report synthesis pointless.
//!
//! The registry is an explicit constructed object passed into each stage,
//! so tests force flag combinations with `with_flags` instead of depending
//! on what happens to be installed.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::PipelineSettings;
use crate::pipeline::face::DetectorSet;
use crate::pipeline::vision::VisionClient;

/// Immutable view of what the process can do. Computed once, shared across
/// concurrent invocations, never re-probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityFlags {
    /// A vision-capable model is served by a reachable engine.
    pub vision_model: bool,
    /// At least one face-detector backend loaded.
    pub face_detector: bool,
    /// The report output location is writable.
    pub renderer: bool,
}

pub struct CapabilityRegistry {
    flags: CapabilityFlags,
    /// Resolved vision model name; `Some` exactly when the flag is set.
    vision_model: Option<String>,
}

impl CapabilityRegistry {
    /// Probe every optional engine once.
    pub fn probe(
        settings: &PipelineSettings,
        client: &dyn VisionClient,
        detectors: &DetectorSet,
    ) -> Self {
        let vision_model = resolve_vision_model(client, &settings.vision_models);
        let face_detector = detectors.any_loaded();
        let renderer = probe_renderer(&settings.scratch_dir);

        let flags = CapabilityFlags {
            vision_model: vision_model.is_some(),
            face_detector,
            renderer,
        };
        info!(
            vision_model = flags.vision_model,
            face_detector = flags.face_detector,
            renderer = flags.renderer,
            model = vision_model.as_deref().unwrap_or("-"),
            "capability probe complete"
        );

        Self {
            flags,
            vision_model,
        }
    }

    /// Registry with forced flags, for deterministic tests.
    pub fn with_flags(vision_model: bool, face_detector: bool, renderer: bool) -> Self {
        Self {
            flags: CapabilityFlags {
                vision_model,
                face_detector,
                renderer,
            },
            vision_model: vision_model.then(|| "mock-vision".to_string()),
        }
    }

    pub fn flags(&self) -> CapabilityFlags {
        self.flags
    }

    /// The resolved vision model, when the vision flag is set.
    pub fn vision_model(&self) -> Option<&str> {
        self.vision_model.as_deref()
    }
}

/// First preferred model the engine actually serves.
fn resolve_vision_model(client: &dyn VisionClient, preferred: &[String]) -> Option<String> {
    let available = match client.list_models() {
        Ok(models) => models,
        Err(e) => {
            debug!(error = %e, "vision engine unreachable");
            return None;
        }
    };

    preferred
        .iter()
        .find(|p| available.iter().any(|m| m.starts_with(p.as_str())))
        .cloned()
}

/// The renderer itself is compiled in; what can actually fail at runtime is
/// writing the artifact. Writable scratch location is the probe.
fn probe_renderer(scratch_dir: &Path) -> bool {
    if let Err(e) = std::fs::create_dir_all(scratch_dir) {
        debug!(error = %e, dir = %scratch_dir.display(), "scratch directory unavailable");
        return false;
    }
    let marker = scratch_dir.join(format!(".renderer_probe_{}", Uuid::new_v4()));
    match std::fs::write(&marker, b"probe") {
        Ok(()) => {
            let _ = std::fs::remove_file(&marker);
            true
        }
        Err(e) => {
            debug!(error = %e, "scratch directory not writable");
            false
        }
    }
}
