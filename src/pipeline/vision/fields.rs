//! Field extraction engine.
//!
//! Asks the vision model for a fixed JSON schema of identity-document
//! fields, folds the streamed answer, and repair-parses it. The engine
//! never fails: with the vision capability off it returns an empty result
//! without touching the network, and any transport or model failure comes
//! back as a result whose `error` field carries the message.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::capabilities::CapabilityRegistry;
use crate::pipeline::json_repair::extract_json_object;

use super::client::{collect_fragments, VisionClient};
use super::types::{ExtractedFields, ImagePayload};

/// Keys claimed by the fixed schema; any other top-level key the model
/// returns is folded into the extra bag.
const RESERVED_KEYS: &[&str] = &[
    "name",
    "dob",
    "gender",
    "id_number",
    "aadhaar",
    "address",
    "father_name",
    "extra",
];

const FIELD_PROMPT: &str = "\
Return ONLY JSON with these fields:
{
 \"name\": \"\",
 \"dob\": \"\",
 \"gender\": \"\",
 \"id_number\": \"\",
 \"address\": \"\",
 \"father_name\": \"\",
 \"extra\": {}
}
Fill values from the document. Keep values as short strings.";

pub struct FieldExtractor {
    client: Arc<dyn VisionClient>,
    registry: Arc<CapabilityRegistry>,
}

impl FieldExtractor {
    pub fn new(client: Arc<dyn VisionClient>, registry: Arc<CapabilityRegistry>) -> Self {
        Self { client, registry }
    }

    /// Extract the fixed field schema from a document image.
    pub fn extract(&self, image: &ImagePayload) -> ExtractedFields {
        let _span = tracing::info_span!("extract_fields", image_size = image.base64.len())
            .entered();

        let Some(model) = self.registry.vision_model() else {
            debug!("vision model unavailable — returning empty fields");
            return ExtractedFields::default();
        };

        let response = self
            .client
            .submit(model, FIELD_PROMPT, image)
            .and_then(collect_fragments);

        match response {
            Ok(text) => {
                let fields = parse_fields(&text);
                info!(
                    model,
                    response_len = text.len(),
                    named_fields = count_named(&fields),
                    extra_keys = fields.extra.len(),
                    "field extraction complete"
                );
                fields
            }
            Err(e) => {
                warn!(model, error = %e, "field extraction failed");
                ExtractedFields::degraded(e.to_string())
            }
        }
    }
}

fn count_named(fields: &ExtractedFields) -> usize {
    [
        &fields.name,
        &fields.dob,
        &fields.gender,
        &fields.id_number,
        &fields.address,
        &fields.father_name,
    ]
    .iter()
    .filter(|f| f.is_some())
    .count()
}

/// Map repaired model output onto the field schema.
pub(crate) fn parse_fields(text: &str) -> ExtractedFields {
    let map = extract_json_object(text);

    let mut fields = ExtractedFields {
        name: string_field(&map, "name"),
        dob: string_field(&map, "dob"),
        gender: string_field(&map, "gender"),
        // Some documents label the identifier by scheme name instead.
        id_number: string_field(&map, "id_number").or_else(|| string_field(&map, "aadhaar")),
        address: string_field(&map, "address"),
        father_name: string_field(&map, "father_name"),
        extra: Map::new(),
        error: None,
    };

    if let Some(Value::Object(extra)) = map.get("extra") {
        fields.extra = extra.clone();
    }

    // Models sometimes put supplementary fields at the top level instead of
    // inside "extra"; keep those too. Declared extras win on key clashes.
    for (key, value) in &map {
        if !RESERVED_KEYS.contains(&key.as_str()) {
            fields.extra.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    fields
}

/// Non-empty string value for a key; numbers are stringified.
fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::vision::client::MockVisionClient;
    use crate::pipeline::vision::VisionError;
    use crate::pipeline::vision::FragmentStream;

    fn payload() -> ImagePayload {
        ImagePayload::encode(b"fake-image", "image/jpeg")
    }

    // ── parse_fields ──

    #[test]
    fn parse_full_schema() {
        let text = r#"{"name": "Jane Doe", "dob": "1990-01-01", "gender": "F",
            "id_number": "1234 5678 9012", "address": "42 Elm Street",
            "father_name": "John Doe", "extra": {"issuer": "UIDAI"}}"#;
        let fields = parse_fields(text);
        assert_eq!(fields.name.as_deref(), Some("Jane Doe"));
        assert_eq!(fields.dob.as_deref(), Some("1990-01-01"));
        assert_eq!(fields.gender.as_deref(), Some("F"));
        assert_eq!(fields.id_number.as_deref(), Some("1234 5678 9012"));
        assert_eq!(fields.address.as_deref(), Some("42 Elm Street"));
        assert_eq!(fields.father_name.as_deref(), Some("John Doe"));
        assert_eq!(
            fields.extra.get("issuer").and_then(Value::as_str),
            Some("UIDAI")
        );
        assert!(fields.error.is_none());
    }

    #[test]
    fn parse_prose_wrapped_single_quotes() {
        let text =
            "Sure! Here is the data: {'name': 'Jane Doe', 'dob': '1990-01-01'} — let me know!";
        let fields = parse_fields(text);
        assert_eq!(fields.name.as_deref(), Some("Jane Doe"));
        assert_eq!(fields.dob.as_deref(), Some("1990-01-01"));
        assert!(fields.id_number.is_none());
    }

    #[test]
    fn parse_garbage_yields_empty_fields() {
        let fields = parse_fields("No data found.");
        assert_eq!(fields, ExtractedFields::default());
    }

    #[test]
    fn empty_string_values_become_absent() {
        let fields = parse_fields(r#"{"name": "", "dob": "  "}"#);
        assert!(fields.name.is_none());
        assert!(fields.dob.is_none());
    }

    #[test]
    fn scheme_named_identifier_maps_to_id_number() {
        let fields = parse_fields(r#"{"aadhaar": "9999 0000 1111"}"#);
        assert_eq!(fields.id_number.as_deref(), Some("9999 0000 1111"));
    }

    #[test]
    fn numeric_id_is_stringified() {
        let fields = parse_fields(r#"{"id_number": 123456}"#);
        assert_eq!(fields.id_number.as_deref(), Some("123456"));
    }

    #[test]
    fn unknown_top_level_keys_fold_into_extra() {
        let fields = parse_fields(
            r#"{"name": "X", "blood_group": "O+", "extra": {"issue_date": "2011"}}"#,
        );
        assert_eq!(
            fields.extra.get("blood_group").and_then(Value::as_str),
            Some("O+")
        );
        assert_eq!(
            fields.extra.get("issue_date").and_then(Value::as_str),
            Some("2011")
        );
    }

    #[test]
    fn declared_extra_wins_over_top_level_duplicate() {
        let fields =
            parse_fields(r#"{"extra": {"note": "declared"}, "note": "stray"}"#);
        assert_eq!(
            fields.extra.get("note").and_then(Value::as_str),
            Some("declared")
        );
    }

    // ── FieldExtractor ──

    #[test]
    fn capability_off_returns_empty_without_network() {
        let client = Arc::new(MockVisionClient::with_response(r#"{"name": "X"}"#));
        let registry = Arc::new(CapabilityRegistry::with_flags(false, false, false));
        let extractor = FieldExtractor::new(client.clone(), registry);

        let fields = extractor.extract(&payload());
        assert_eq!(fields, ExtractedFields::default());
        assert_eq!(client.submit_count(), 0);
    }

    #[test]
    fn streamed_fragments_are_folded_before_parsing() {
        let client = Arc::new(MockVisionClient::new(&[
            "{\"name\": \"Ja",
            "ne Doe\", \"dob\"",
            ": \"1990-01-01\"}",
        ]));
        let registry = Arc::new(CapabilityRegistry::with_flags(true, false, false));
        let extractor = FieldExtractor::new(client, registry);

        let fields = extractor.extract(&payload());
        assert_eq!(fields.name.as_deref(), Some("Jane Doe"));
        assert_eq!(fields.dob.as_deref(), Some("1990-01-01"));
    }

    #[test]
    fn transport_failure_degrades_with_reason() {
        struct TimingOutClient;
        impl VisionClient for TimingOutClient {
            fn submit(
                &self,
                _model: &str,
                _prompt: &str,
                _image: &ImagePayload,
            ) -> Result<FragmentStream, VisionError> {
                Err(VisionError::Timeout(120))
            }
            fn list_models(&self) -> Result<Vec<String>, VisionError> {
                Ok(vec![])
            }
        }

        let registry = Arc::new(CapabilityRegistry::with_flags(true, false, false));
        let extractor = FieldExtractor::new(Arc::new(TimingOutClient), registry);

        let fields = extractor.extract(&payload());
        let error = fields.error.as_deref().unwrap();
        assert!(error.contains("timed out"), "error was: {error}");
        assert!(fields.name.is_none());
    }

    #[test]
    fn prompt_requests_json_only_with_full_schema() {
        for key in ["name", "dob", "gender", "id_number", "address", "father_name", "extra"] {
            assert!(FIELD_PROMPT.contains(key), "prompt missing {key}");
        }
        assert!(FIELD_PROMPT.contains("ONLY JSON"));
    }
}
