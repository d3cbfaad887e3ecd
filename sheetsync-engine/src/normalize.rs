//! Normalizer — raw cells to typed, validated records.
//!
//! Zips each data row against the header row and coerces every declared
//! field by its schema kind. Parse failures become the `Null` sentinel,
//! never zero: zero is a valid value distinct from "absent". Rows shorter
//! than the header are padded with absent cells, not rejected outright.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use sheetsync_core::schema::{FieldKind, SheetSchema};
use sheetsync_core::types::{FieldName, FieldValue, Record, RecordId};

/// Why a row was excluded from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The identity field was absent or blank.
    MissingIdentity,
    /// An earlier row in the same snapshot already carries this identity.
    DuplicateIdentity,
    /// Strict completeness: the named field was null, absent or empty.
    Incomplete { field: FieldName },
}

impl RejectReason {
    pub fn describe(&self) -> String {
        match self {
            RejectReason::MissingIdentity => "missing identity field".to_owned(),
            RejectReason::DuplicateIdentity => "duplicate identity".to_owned(),
            RejectReason::Incomplete { field } => format!("incomplete field '{field}'"),
        }
    }
}

/// A rejected source row, with enough context to find it in the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// 1-based sheet row number (the header is row 1).
    pub row: usize,
    pub id: Option<RecordId>,
    pub reason: RejectReason,
}

/// Normalization output: the typed snapshot records plus every rejection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Normalized {
    pub records: Vec<Record>,
    pub rejected: Vec<RejectedRow>,
}

impl Normalized {
    /// Identities of rejected rows. The diff must not emit deletes for
    /// these: a rejected record neither triggers deletes nor is retried in
    /// the same run.
    pub fn rejected_ids(&self) -> HashSet<RecordId> {
        self.rejected
            .iter()
            .filter_map(|r| r.id.clone())
            .collect()
    }
}

/// Normalize raw header/rows into typed records under `schema`.
pub fn normalize(
    schema: &SheetSchema,
    headers: &[String],
    rows: &[Vec<Option<String>>],
) -> Normalized {
    let columns: Vec<Option<usize>> = schema
        .fields
        .iter()
        .map(|spec| headers.iter().position(|h| h == &spec.name.0))
        .collect();

    let mut out = Normalized::default();
    let mut seen = HashSet::new();

    for (index, row) in rows.iter().enumerate() {
        let sheet_row = index + 2;
        let mut fields = BTreeMap::new();
        for (spec, column) in schema.fields.iter().zip(&columns) {
            let raw = column
                .and_then(|c| row.get(c))
                .and_then(|cell| cell.as_deref());
            fields.insert(
                spec.name.clone(),
                coerce(spec.kind, raw, schema.empty_tags_as_null),
            );
        }

        let id = fields
            .get(&schema.identity)
            .and_then(RecordId::from_value);
        let Some(id) = id else {
            tracing::warn!(row = sheet_row, "rejected row: missing identity field");
            out.rejected.push(RejectedRow {
                row: sheet_row,
                id: None,
                reason: RejectReason::MissingIdentity,
            });
            continue;
        };

        if !seen.insert(id.clone()) {
            tracing::warn!(row = sheet_row, id = %id, "rejected row: duplicate identity");
            out.rejected.push(RejectedRow {
                row: sheet_row,
                id: Some(id),
                reason: RejectReason::DuplicateIdentity,
            });
            continue;
        }

        if schema.strict {
            if let Some((name, _)) = fields.iter().find(|(_, value)| value.is_blank()) {
                tracing::warn!(
                    row = sheet_row,
                    id = %id,
                    field = %name,
                    "rejected row: incomplete under strict mode"
                );
                out.rejected.push(RejectedRow {
                    row: sheet_row,
                    id: Some(id.clone()),
                    reason: RejectReason::Incomplete {
                        field: name.clone(),
                    },
                });
                seen.remove(&id);
                continue;
            }
        }

        out.records.push(Record { id, fields });
    }

    out
}

/// Coerce one raw cell by declared kind.
fn coerce(kind: FieldKind, raw: Option<&str>, empty_tags_as_null: bool) -> FieldValue {
    match kind {
        FieldKind::Text => match raw {
            Some(s) => FieldValue::Text(s.to_owned()),
            None => FieldValue::Null,
        },
        FieldKind::Number => raw
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<f64>().ok())
            .map(FieldValue::Number)
            .unwrap_or(FieldValue::Null),
        FieldKind::Timestamp => raw
            .and_then(parse_timestamp)
            .map(FieldValue::Timestamp)
            .unwrap_or(FieldValue::Null),
        FieldKind::Tags => {
            let elements: Vec<String> = raw
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|e| !e.is_empty())
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default();
            if elements.is_empty() && empty_tags_as_null {
                FieldValue::Null
            } else {
                FieldValue::Tags(elements)
            }
        }
    }
}

/// Accepts RFC 3339 plus the date shapes spreadsheets commonly emit.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    for format in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
        }
    }
    None
}

/// Re-type a loaded record against the schema.
///
/// JSON deserialization is shape-driven, so a persisted timestamp comes
/// back as text; this restores the declared in-memory type before the
/// record is used as a diff baseline.
pub fn conform_record(schema: &SheetSchema, mut record: Record) -> Record {
    for spec in &schema.fields {
        let Some(value) = record.fields.get_mut(&spec.name) else {
            continue;
        };
        if spec.kind == FieldKind::Timestamp {
            if let FieldValue::Text(s) = value {
                if let Some(ts) = parse_timestamp(s) {
                    *value = FieldValue::Timestamp(ts);
                }
            }
        }
    }
    record
}
