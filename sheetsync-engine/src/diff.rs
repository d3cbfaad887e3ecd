//! Diff engine — identity-keyed reconciliation between snapshots.
//!
//! `reconcile` compares the current snapshot against a baseline and
//! produces the minimal {inserts, updates, deletes} triple. Whole-snapshot
//! equality short-circuits before any per-record work, mirroring the
//! digest gate the pipeline applies against the persisted baseline.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};
use similar::TextDiff;

use sheetsync_core::schema::{FieldKind, SheetSchema};
use sheetsync_core::types::{ChangeSet, FieldName, FieldValue, Record, RecordId, RecordPatch};

// ---------------------------------------------------------------------------
// Snapshot digest
// ---------------------------------------------------------------------------

/// SHA-256 hex digest over the canonically serialized record sequence.
///
/// Record fields live in a `BTreeMap`, so serialization order is stable and
/// the digest is structural: equal snapshots hash equal regardless of how
/// they were produced.
pub fn snapshot_digest(records: &[Record]) -> String {
    let canonical = serde_json::to_vec(records).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Field comparators
// ---------------------------------------------------------------------------

/// Field-level equality check. Returns true when the values are equal.
pub type FieldComparator = fn(&FieldValue, &FieldValue) -> bool;

/// Structural equality, the default for every field.
pub fn value_eq(a: &FieldValue, b: &FieldValue) -> bool {
    a == b
}

/// Order-insensitive comparison for tag lists; falls back to structural
/// equality for any other value pair.
pub fn tags_unordered_eq(a: &FieldValue, b: &FieldValue) -> bool {
    match (a, b) {
        (FieldValue::Tags(left), FieldValue::Tags(right)) => {
            if left.len() != right.len() {
                return false;
            }
            let mut left = left.clone();
            let mut right = right.clone();
            left.sort_unstable();
            right.sort_unstable();
            left == right
        }
        _ => value_eq(a, b),
    }
}

/// Pluggable per-field comparator registry, defaulting to value equality.
#[derive(Debug, Clone, Default)]
pub struct ComparatorRegistry {
    by_field: HashMap<FieldName, FieldComparator>,
}

impl ComparatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry derived from the schema: tags fields compare
    /// order-insensitively unless declared `order_sensitive`.
    pub fn for_schema(schema: &SheetSchema) -> Self {
        let mut registry = Self::new();
        for spec in &schema.fields {
            if spec.kind == FieldKind::Tags && !spec.order_sensitive {
                registry = registry.with_comparator(spec.name.clone(), tags_unordered_eq);
            }
        }
        registry
    }

    pub fn with_comparator(mut self, field: FieldName, comparator: FieldComparator) -> Self {
        self.by_field.insert(field, comparator);
        self
    }

    fn equals(&self, field: &FieldName, a: &FieldValue, b: &FieldValue) -> bool {
        self.by_field.get(field).copied().unwrap_or(value_eq)(a, b)
    }
}

// ---------------------------------------------------------------------------
// Reconcile
// ---------------------------------------------------------------------------

/// Knobs for one reconciliation.
#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    /// Fields considered for update detection, in declaration order. The
    /// update payload carries differing fields in this order.
    pub fields_to_compare: Vec<FieldName>,
    pub comparators: ComparatorRegistry,
    /// Explicit signal that a zero-record current snapshot is the true
    /// source state. Without it an empty current snapshot yields no deletes.
    pub authoritative_empty: bool,
    /// Identities that must not be deleted this run (rows rejected during
    /// normalization still exist in the source).
    pub protected_ids: HashSet<RecordId>,
}

impl DiffOptions {
    pub fn for_schema(schema: &SheetSchema) -> Self {
        Self {
            fields_to_compare: schema.effective_compare_fields(),
            comparators: ComparatorRegistry::for_schema(schema),
            authoritative_empty: false,
            protected_ids: HashSet::new(),
        }
    }
}

// Stand-in for fields absent from one side of a comparison.
static NULL: FieldValue = FieldValue::Null;

/// Compare `current` against `baseline` and produce the change-set.
///
/// Output order: inserts and updates follow current-snapshot traversal
/// order; deletes follow baseline traversal order.
pub fn reconcile(baseline: &[Record], current: &[Record], options: &DiffOptions) -> ChangeSet {
    // Short-circuit: structurally identical snapshots need no per-record work.
    if baseline == current {
        return ChangeSet::default();
    }

    if current.is_empty() && !options.authoritative_empty && !baseline.is_empty() {
        tracing::warn!(
            baseline = baseline.len(),
            "current snapshot is empty without an authoritative-empty signal; refusing to emit deletes"
        );
        return ChangeSet::default();
    }

    let by_id: HashMap<&RecordId, &Record> =
        baseline.iter().map(|record| (&record.id, record)).collect();
    let current_ids: HashSet<&RecordId> = current.iter().map(|record| &record.id).collect();

    let mut change_set = ChangeSet::default();

    for record in current {
        match by_id.get(&record.id) {
            None => change_set.inserts.push(record.clone()),
            Some(existing) => {
                let changed: Vec<(FieldName, FieldValue)> = options
                    .fields_to_compare
                    .iter()
                    .filter_map(|field| {
                        let old = existing.get(field).unwrap_or(&NULL);
                        let new = record.get(field).unwrap_or(&NULL);
                        (!options.comparators.equals(field, old, new))
                            .then(|| (field.clone(), new.clone()))
                    })
                    .collect();
                if !changed.is_empty() {
                    change_set.updates.push(RecordPatch {
                        id: record.id.clone(),
                        fields: changed,
                    });
                }
            }
        }
    }

    for record in baseline {
        if !current_ids.contains(&record.id) && !options.protected_ids.contains(&record.id) {
            change_set.deletes.push(record.id.clone());
        }
    }

    change_set
}

// ---------------------------------------------------------------------------
// Unified diff rendering
// ---------------------------------------------------------------------------

/// Render a unified diff of the two snapshots' pretty-printed JSON.
///
/// Presentation only; the change-set is authoritative.
pub fn unified_snapshot_diff(baseline: &[Record], current: &[Record]) -> String {
    let old = pretty_records(baseline);
    let new = pretty_records(current);
    TextDiff::from_lines(&old, &new)
        .unified_diff()
        .header("a/snapshot.json", "b/snapshot.json")
        .context_radius(3)
        .to_string()
}

fn pretty_records(records: &[Record]) -> String {
    let mut out = serde_json::to_string_pretty(records).unwrap_or_default();
    out.push('\n');
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
