//! Schema diffs returned by a target's diff endpoint.
//!
//! A diff document looks like
//! `{"hash": "...", "diff": {"collections": [...], "fields": [...], "relations": [...]}}`,
//! where each entry names its collection/field and carries a list of
//! change records (`kind`: `N` new, `D` deleted, `E` edited, `A` array change).

use serde::Serialize;
use serde_json::Value;

use crate::error::SchemaError;
use crate::snapshot::unwrap_envelope;

const SECTIONS: [DiffSection; 3] = [
    DiffSection::Collections,
    DiffSection::Fields,
    DiffSection::Relations,
];

/// Result of diffing a snapshot against a target's live structure.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffOutcome {
    /// Schemas already match; apply is skipped.
    Identical,
    /// Structural changes to apply.
    Changes(SchemaDiff),
}

impl DiffOutcome {
    /// Interpret a successful diff response.
    ///
    /// `204 No Content`, an empty body, `data: null`, or a diff whose
    /// sections are all empty map to [`DiffOutcome::Identical`].
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MalformedDiff`] if a non-empty body is not a
    /// diff document.
    pub fn from_response(status: u16, body: &str) -> Result<Self, SchemaError> {
        if status == 204 || body.trim().is_empty() {
            return Ok(Self::Identical);
        }
        let value: Value = serde_json::from_str(body)
            .map_err(|e| SchemaError::MalformedDiff(format!("not JSON: {e}")))?;
        let payload = unwrap_envelope(value);
        if payload.is_null() {
            return Ok(Self::Identical);
        }
        let diff = SchemaDiff::from_value(payload)?;
        if diff.is_empty() {
            Ok(Self::Identical)
        } else {
            Ok(Self::Changes(diff))
        }
    }
}

/// Section of the structural model a change belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffSection {
    Collections,
    Fields,
    Relations,
}

impl DiffSection {
    const fn key(self) -> &'static str {
        match self {
            Self::Collections => "collections",
            Self::Fields => "fields",
            Self::Relations => "relations",
        }
    }
}

/// What a change does to its subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Add,
    Remove,
    Modify,
}

impl ChangeKind {
    fn from_records(records: Option<&Value>) -> Self {
        let first_kind = records
            .and_then(Value::as_array)
            .and_then(|r| r.first())
            .and_then(|r| r.get("kind"))
            .and_then(Value::as_str);
        match first_kind {
            Some("N") => Self::Add,
            Some("D") => Self::Remove,
            _ => Self::Modify,
        }
    }
}

/// One structural change, in the order the target reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeOperation {
    pub section: DiffSection,
    /// `collection`, `collection.field`, or `collection.field -> related`.
    pub subject: String,
    pub kind: ChangeKind,
}

/// A diff payload ready for the apply endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDiff {
    payload: Value,
}

impl SchemaDiff {
    /// Wrap an unwrapped diff payload.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MalformedDiff`] if `payload` has no `diff` object.
    pub fn from_value(payload: Value) -> Result<Self, SchemaError> {
        if !payload.get("diff").is_some_and(Value::is_object) {
            return Err(SchemaError::MalformedDiff(
                "response has no 'diff' object".into(),
            ));
        }
        Ok(Self { payload })
    }

    /// The body submitted to the apply endpoint.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Hash of the target schema the diff was computed against.
    #[must_use]
    pub fn hash(&self) -> Option<&str> {
        self.payload.get("hash").and_then(Value::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        SECTIONS.iter().all(|s| self.entries(*s).is_empty())
    }

    /// Ordered change operations across all sections.
    #[must_use]
    pub fn operations(&self) -> Vec<ChangeOperation> {
        SECTIONS
            .iter()
            .flat_map(|section| {
                self.entries(*section).iter().map(|entry| ChangeOperation {
                    section: *section,
                    subject: subject_of(*section, entry),
                    kind: ChangeKind::from_records(entry.get("diff")),
                })
            })
            .collect()
    }

    /// Pretty JSON suitable for an on-disk artifact.
    ///
    /// # Errors
    ///
    /// Returns the serializer error, which only happens for non-string map keys.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.payload)
    }

    fn entries(&self, section: DiffSection) -> &[Value] {
        self.payload
            .get("diff")
            .and_then(|d| d.get(section.key()))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn subject_of(section: DiffSection, entry: &Value) -> String {
    let get = |key: &str| entry.get(key).and_then(Value::as_str).unwrap_or("?");
    match section {
        DiffSection::Collections => get("collection").to_string(),
        DiffSection::Fields => format!("{}.{}", get("collection"), get("field")),
        DiffSection::Relations => match entry.get("related_collection").and_then(Value::as_str) {
            Some(related) => format!("{}.{} -> {related}", get("collection"), get("field")),
            None => format!("{}.{}", get("collection"), get("field")),
        },
    }
}
