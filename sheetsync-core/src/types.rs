//! Domain types for sheetsync snapshots and change-sets.
//!
//! All timestamps are `chrono::DateTime<Utc>`; field values round-trip
//! through JSON with numbers as numbers and timestamps as ISO-8601 strings.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed column/field name within a sheet schema.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldName(pub String);

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for FieldName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for FieldName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Canonical identity of a record, unique within one snapshot.
///
/// Built from the schema's identity field via [`RecordId::from_value`];
/// integral numeric identities render without a fractional part so that
/// `12` and `12.0` key the same record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl RecordId {
    /// Canonical identity string for a field value, or `None` when the value
    /// cannot identify a record (null, empty text, tag lists).
    pub fn from_value(value: &FieldValue) -> Option<RecordId> {
        match value {
            FieldValue::Number(n) if n.fract() == 0.0 && n.is_finite() => {
                Some(Self(format!("{}", *n as i64)))
            }
            FieldValue::Number(n) if n.is_finite() => Some(Self(n.to_string())),
            FieldValue::Text(s) if !s.is_empty() => Some(Self(s.clone())),
            FieldValue::Timestamp(t) => Some(Self(t.to_rfc3339())),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Field values
// ---------------------------------------------------------------------------

/// A single typed cell value.
///
/// Serializes untagged: `Null` → JSON null, `Number` → JSON number,
/// `Timestamp` → ISO-8601 string, `Tags` → array of strings, `Text` →
/// string. Deserialization is shape-driven (every JSON string loads as
/// `Text`); re-typing string values against a declared schema is the
/// normalizer's job, so a timestamp never silently changes type depending
/// on what its text happens to look like.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Number(f64),
    Timestamp(DateTime<Utc>),
    Tags(Vec<String>),
    Text(String),
}

impl FieldValue {
    /// Map a raw JSON value into the closest typed form.
    pub fn from_json(value: serde_json::Value) -> FieldValue {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Text(b.to_string()),
            serde_json::Value::Number(n) => {
                n.as_f64().map(FieldValue::Number).unwrap_or(FieldValue::Null)
            }
            serde_json::Value::String(s) => FieldValue::Text(s),
            serde_json::Value::Array(items) => FieldValue::Tags(
                items
                    .into_iter()
                    .map(|item| match item {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            // Nested objects do not occur in tabular data.
            serde_json::Value::Object(_) => FieldValue::Null,
        }
    }

    /// True for the "absent" sentinels the completeness filter rejects:
    /// null and empty text.
    pub fn is_blank(&self) -> bool {
        matches!(self, FieldValue::Null) || matches!(self, FieldValue::Text(s) if s.is_empty())
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(FieldValue::from_json(value))
    }
}

// ---------------------------------------------------------------------------
// Records and snapshots
// ---------------------------------------------------------------------------

/// A typed record: canonical identity plus named field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub fields: BTreeMap<FieldName, FieldValue>,
}

impl Record {
    pub fn get(&self, name: &FieldName) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// Full ordered record set from the source at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub records: Vec<Record>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

// ---------------------------------------------------------------------------
// Change-sets
// ---------------------------------------------------------------------------

/// Identity plus only the fields whose values changed, in the compare-field
/// declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    pub id: RecordId,
    pub fields: Vec<(FieldName, FieldValue)>,
}

/// The {inserts, updates, deletes} triple produced by reconciliation.
///
/// Invariant: an identity appears in at most one of the three collections.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    pub inserts: Vec<Record>,
    pub updates: Vec<RecordPatch>,
    pub deletes: Vec<RecordId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn total_ops(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
