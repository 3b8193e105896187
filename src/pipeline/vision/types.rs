use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Image handed to the vision engine: base64 body plus MIME type.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub base64: String,
    pub mime: String,
}

impl ImagePayload {
    pub fn encode(bytes: &[u8], mime: &str) -> Self {
        use base64::Engine as _;
        Self {
            base64: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime: mime.to_string(),
        }
    }
}

/// Structured fields read off an identity document.
///
/// Always well-formed: a fully empty value serializes to `{}`. When a stage
/// degrades instead of extracting, `error` carries the reason and every
/// other field stays empty, so callers inspect the outcome instead of
/// catching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_name: Option<String>,
    /// Open-ended supplementary key/value pairs beyond the fixed schema.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractedFields {
    /// Result for a stage that could not run; the reason is inspectable.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::default()
        }
    }
}

/// Authenticity verdict for a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthenticityReport {
    /// 0–100. Absent means the score was not computed, not that it is zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthenticityReport {
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_serialize_to_empty_object() {
        let json = serde_json::to_string(&ExtractedFields::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn empty_report_serializes_to_empty_object() {
        let json = serde_json::to_string(&AuthenticityReport::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn degraded_fields_carry_only_the_reason() {
        let fields = ExtractedFields::degraded("engine timed out");
        assert_eq!(fields.error.as_deref(), Some("engine timed out"));
        assert!(fields.name.is_none());
        assert!(fields.extra.is_empty());
    }

    #[test]
    fn payload_encodes_base64() {
        let payload = ImagePayload::encode(b"abc", "image/jpeg");
        assert_eq!(payload.base64, "YWJj");
        assert_eq!(payload.mime, "image/jpeg");
    }
}
