//! Best-effort extraction of a JSON object from free-form model output.
//!
//! Vision models rarely answer with clean JSON: the object is usually
//! wrapped in prose, sometimes quoted with single quotes. This module is a
//! hard boundary. Whatever the input, the caller gets a map back, possibly
//! empty, and never a panic.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Greedy span from the first `{` to the last `}`, across newlines.
/// Deliberately not the minimal bracket pair: nested objects must stay
/// inside the span.
static JSON_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Pull a JSON object out of arbitrary text.
///
/// Tries a strict parse of the brace span first; on failure applies one
/// repair heuristic (single quotes become double quotes) and parses again.
/// Returns an empty map when no span exists or both parses fail.
pub fn extract_json_object(text: &str) -> Map<String, Value> {
    let Some(span) = JSON_SPAN.find(text) else {
        return Map::new();
    };
    let candidate = span.as_str();

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(candidate) {
        return map;
    }

    let repaired = candidate.replace('\'', "\"");
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&repaired) {
        return map;
    }

    Map::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_json_parses() {
        let map = extract_json_object(r#"{"name": "Jane Doe", "dob": "1990-01-01"}"#);
        assert_eq!(map.get("name").and_then(Value::as_str), Some("Jane Doe"));
        assert_eq!(map.get("dob").and_then(Value::as_str), Some("1990-01-01"));
    }

    #[test]
    fn prose_around_single_quoted_object_is_repaired() {
        let text = "Sure! Here is the data: {'name': 'Jane Doe', 'dob': '1990-01-01'} — let me know if you need anything else.";
        let map = extract_json_object(text);
        assert_eq!(map.get("name").and_then(Value::as_str), Some("Jane Doe"));
        assert_eq!(map.get("dob").and_then(Value::as_str), Some("1990-01-01"));
    }

    #[test]
    fn no_braces_yields_empty_map() {
        assert!(extract_json_object("No data found.").is_empty());
    }

    #[test]
    fn empty_input_yields_empty_map() {
        assert!(extract_json_object("").is_empty());
    }

    #[test]
    fn unparseable_span_yields_empty_map() {
        assert!(extract_json_object("{this is not json, not even close}").is_empty());
    }

    #[test]
    fn reversed_braces_yield_empty_map() {
        assert!(extract_json_object("} nothing here {").is_empty());
    }

    #[test]
    fn span_is_greedy_not_minimal() {
        // Two objects in one response: the greedy span covers both, fails to
        // parse as one object, and the repair cannot save it. Empty map,
        // never a partial parse of just the first object.
        let text = r#"{"a": 1} and also {"b": 2}"#;
        assert!(extract_json_object(text).is_empty());
    }

    #[test]
    fn nested_objects_survive() {
        let text = r#"Result: {"name": "X", "extra": {"issuer": "Dept", "serial": "77"}} done"#;
        let map = extract_json_object(text);
        let extra = map.get("extra").and_then(Value::as_object).unwrap();
        assert_eq!(extra.get("issuer").and_then(Value::as_str), Some("Dept"));
    }

    #[test]
    fn top_level_array_is_not_an_object() {
        assert!(extract_json_object(r#"[{"name": "Jane"}]"#)
            .get("name")
            .is_none());
    }

    #[test]
    fn never_panics_on_adversarial_input() {
        for text in [
            "{",
            "}",
            "{}",
            "{{{{",
            "}}}}",
            "{\"a\": }",
            "{'a': 'b\u{0000}'}",
            "\u{FFFD}{\u{FFFD}}",
            "{\"a\": \"b\"",
        ] {
            let _ = extract_json_object(text);
        }
    }
}
