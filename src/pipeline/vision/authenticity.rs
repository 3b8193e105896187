//! Authenticity scoring engine.
//!
//! Same capability gate, streamed-response fold, and degrade-on-failure
//! contract as field extraction, with a different request schema: the model
//! judges how likely the document is genuine and enumerates its concerns.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::capabilities::CapabilityRegistry;
use crate::pipeline::json_repair::extract_json_object;

use super::client::{collect_fragments, VisionClient};
use super::types::{AuthenticityReport, ImagePayload};

const AUTHENTICITY_PROMPT: &str = "\
Return ONLY JSON:
{
  \"authenticity_score\": 0,
  \"verdict\": \"\",
  \"issues\": []
}
Provide a score 0-100 for how likely the document is genuine and list any issues found.";

pub struct AuthenticityScorer {
    client: Arc<dyn VisionClient>,
    registry: Arc<CapabilityRegistry>,
}

impl AuthenticityScorer {
    pub fn new(client: Arc<dyn VisionClient>, registry: Arc<CapabilityRegistry>) -> Self {
        Self { client, registry }
    }

    /// Score the document's likely genuineness.
    pub fn score(&self, image: &ImagePayload) -> AuthenticityReport {
        let _span = tracing::info_span!("score_authenticity", image_size = image.base64.len())
            .entered();

        let Some(model) = self.registry.vision_model() else {
            debug!("vision model unavailable — returning empty authenticity report");
            return AuthenticityReport::default();
        };

        let response = self
            .client
            .submit(model, AUTHENTICITY_PROMPT, image)
            .and_then(collect_fragments);

        match response {
            Ok(text) => {
                let report = parse_authenticity(&text);
                info!(
                    model,
                    score = report.score,
                    issues = report.issues.len(),
                    "authenticity scoring complete"
                );
                report
            }
            Err(e) => {
                warn!(model, error = %e, "authenticity scoring failed");
                AuthenticityReport::degraded(e.to_string())
            }
        }
    }
}

/// Map repaired model output onto the authenticity schema.
pub(crate) fn parse_authenticity(text: &str) -> AuthenticityReport {
    let map = extract_json_object(text);

    AuthenticityReport {
        score: map.get("authenticity_score").and_then(score_value),
        verdict: verdict_value(&map),
        issues: issue_values(&map),
        error: None,
    }
}

/// Clamp a model-reported score into 0–100. Absent when not numeric.
fn score_value(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then(|| n.clamp(0.0, 100.0).round() as u8)
}

fn verdict_value(map: &Map<String, Value>) -> Option<String> {
    match map.get("verdict")? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

/// String entries of the issues array, order preserved; other value kinds
/// are skipped.
fn issue_values(map: &Map<String, Value>) -> Vec<String> {
    map.get("issues")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::vision::client::MockVisionClient;

    fn payload() -> ImagePayload {
        ImagePayload::encode(b"fake-image", "image/jpeg")
    }

    // ── parse_authenticity ──

    #[test]
    fn parse_full_report() {
        let text = r#"{"authenticity_score": 82, "verdict": "likely genuine",
            "issues": ["low photo resolution", "hologram not visible"]}"#;
        let report = parse_authenticity(text);
        assert_eq!(report.score, Some(82));
        assert_eq!(report.verdict.as_deref(), Some("likely genuine"));
        assert_eq!(
            report.issues,
            vec!["low photo resolution", "hologram not visible"]
        );
    }

    #[test]
    fn issue_order_is_preserved() {
        let text = r#"{"issues": ["first", "second", "third"]}"#;
        let report = parse_authenticity(text);
        assert_eq!(report.issues, vec!["first", "second", "third"]);
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        assert_eq!(parse_authenticity(r#"{"authenticity_score": 250}"#).score, Some(100));
        assert_eq!(parse_authenticity(r#"{"authenticity_score": -5}"#).score, Some(0));
    }

    #[test]
    fn stringified_score_is_accepted() {
        assert_eq!(parse_authenticity(r#"{"authenticity_score": "73"}"#).score, Some(73));
    }

    #[test]
    fn missing_score_stays_absent() {
        let report = parse_authenticity(r#"{"verdict": "unclear"}"#);
        assert_eq!(report.score, None);
        assert_eq!(report.verdict.as_deref(), Some("unclear"));
    }

    #[test]
    fn non_string_issues_are_skipped() {
        let report = parse_authenticity(r#"{"issues": ["real", 42, null, "also real"]}"#);
        assert_eq!(report.issues, vec!["real", "also real"]);
    }

    #[test]
    fn garbage_yields_empty_report() {
        assert_eq!(parse_authenticity("no json at all"), AuthenticityReport::default());
    }

    // ── AuthenticityScorer ──

    #[test]
    fn capability_off_returns_empty_without_network() {
        let client = Arc::new(MockVisionClient::with_response(
            r#"{"authenticity_score": 90}"#,
        ));
        let registry = Arc::new(CapabilityRegistry::with_flags(false, false, false));
        let scorer = AuthenticityScorer::new(client.clone(), registry);

        let report = scorer.score(&payload());
        assert_eq!(report, AuthenticityReport::default());
        assert_eq!(client.submit_count(), 0);
    }

    #[test]
    fn single_quoted_response_is_repaired() {
        let client = Arc::new(MockVisionClient::with_response(
            "Here you go: {'authenticity_score': 64, 'verdict': 'plausible', 'issues': []}",
        ));
        let registry = Arc::new(CapabilityRegistry::with_flags(true, false, false));
        let scorer = AuthenticityScorer::new(client, registry);

        let report = scorer.score(&payload());
        assert_eq!(report.score, Some(64));
        assert_eq!(report.verdict.as_deref(), Some("plausible"));
    }

    #[test]
    fn prompt_requests_the_authenticity_schema() {
        assert!(AUTHENTICITY_PROMPT.contains("authenticity_score"));
        assert!(AUTHENTICITY_PROMPT.contains("verdict"));
        assert!(AUTHENTICITY_PROMPT.contains("issues"));
        assert!(AUTHENTICITY_PROMPT.contains("0-100"));
    }
}
