//! Structural snapshots.
//!
//! The snapshot endpoint answers `{"data": {...}}`, while the diff endpoint
//! expects the inner document. Unwrapping happens once at capture, and the
//! client re-checks before every diff submission.

use serde_json::{Map, Value};

use crate::error::SchemaError;

/// Top-level keys a structural document is recognized by.
const RECOGNIZED_KEYS: &[&str] = &["collections", "version"];

/// An immutable, unwrapped structural document.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaSnapshot {
    document: Value,
}

impl SchemaSnapshot {
    /// Parse a response body, unwrap any envelope, and shape-check the result.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MalformedSnapshot`] if the body is not a JSON
    /// object or lacks a recognizable top-level key.
    pub fn from_body(body: &str) -> Result<Self, SchemaError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| SchemaError::MalformedSnapshot(format!("not JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Unwrap and shape-check an already-parsed document.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_body`].
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        let document = unwrap_envelope(value);
        let Some(map) = document.as_object() else {
            return Err(SchemaError::MalformedSnapshot(
                "top level is not an object".into(),
            ));
        };
        if !has_recognized_key(map) {
            return Err(SchemaError::MalformedSnapshot(format!(
                "none of the expected keys ({}) present",
                RECOGNIZED_KEYS.join(", ")
            )));
        }
        if let Some(collections) = map.get("collections")
            && !collections.is_array()
        {
            return Err(SchemaError::MalformedSnapshot(
                "'collections' is not an array".into(),
            ));
        }
        Ok(Self { document })
    }

    /// The unwrapped document, as submitted to the diff endpoint.
    #[must_use]
    pub const fn document(&self) -> &Value {
        &self.document
    }

    /// Whether the document still carries a transport envelope.
    #[must_use]
    pub fn is_enveloped(&self) -> bool {
        is_envelope(&self.document)
    }

    #[must_use]
    pub fn collection_count(&self) -> usize {
        self.section_len("collections")
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.section_len("fields")
    }

    #[must_use]
    pub fn relation_count(&self) -> usize {
        self.section_len("relations")
    }

    /// Platform version recorded in the snapshot, if any.
    #[must_use]
    pub fn platform_version(&self) -> Option<&str> {
        self.document.get("directus").and_then(Value::as_str)
    }

    /// Pretty JSON suitable for an on-disk artifact.
    ///
    /// # Errors
    ///
    /// Returns the serializer error, which only happens for non-string map keys.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.document)
    }

    fn section_len(&self, key: &str) -> usize {
        self.document
            .get(key)
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }
}

fn has_recognized_key(map: &Map<String, Value>) -> bool {
    RECOGNIZED_KEYS.iter().any(|k| map.contains_key(*k))
}

/// An object with a `data` member and none of the recognized keys.
pub(crate) fn is_envelope(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.contains_key("data") && !has_recognized_key(map))
}

/// Peel `{"data": ...}` layers until a non-envelope remains.
pub(crate) fn unwrap_envelope(mut value: Value) -> Value {
    while is_envelope(&value) {
        value = match value {
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
            other => return other,
        };
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn inner() -> Value {
        json!({
            "version": 1,
            "directus": "10.10.4",
            "vendor": "postgres",
            "collections": [{"collection": "articles"}, {"collection": "pages"}],
            "fields": [{"collection": "articles", "field": "title"}],
            "relations": []
        })
    }

    #[test]
    fn unwraps_data_envelope() {
        let snapshot = SchemaSnapshot::from_value(json!({ "data": inner() })).unwrap();
        assert_eq!(snapshot.document(), &inner());
        assert!(!snapshot.is_enveloped());
        assert_eq!(snapshot.collection_count(), 2);
        assert_eq!(snapshot.field_count(), 1);
        assert_eq!(snapshot.relation_count(), 0);
        assert_eq!(snapshot.platform_version(), Some("10.10.4"));
    }

    #[test]
    fn unwraps_nested_envelopes() {
        let snapshot =
            SchemaSnapshot::from_value(json!({ "data": { "data": inner() } })).unwrap();
        assert_eq!(snapshot.document(), &inner());
    }

    #[test]
    fn accepts_already_unwrapped_document() {
        let snapshot = SchemaSnapshot::from_value(inner()).unwrap();
        assert_eq!(snapshot.document(), &inner());
    }

    #[test]
    fn rejects_unrecognized_shape() {
        let err = SchemaSnapshot::from_value(json!({ "data": { "hello": "world" } })).unwrap_err();
        assert!(matches!(err, SchemaError::MalformedSnapshot(_)));
    }

    #[test]
    fn rejects_non_object() {
        assert!(SchemaSnapshot::from_body("[1, 2, 3]").is_err());
        assert!(SchemaSnapshot::from_body("<html>login</html>").is_err());
        assert!(SchemaSnapshot::from_value(json!({ "data": null })).is_err());
    }

    #[test]
    fn rejects_non_array_collections() {
        let err = SchemaSnapshot::from_value(json!({ "collections": "oops" })).unwrap_err();
        assert!(matches!(err, SchemaError::MalformedSnapshot(_)));
    }
}
