//! Sheet schema: declared fields, kinds and diffing knobs.
//!
//! The schema is the single source of typing truth: the normalizer coerces
//! raw cells by declared kind, and loaded snapshots are re-typed against it
//! so persisted values keep their declared shape across runs.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::FieldName;

/// Declared type of a sheet column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Number,
    Timestamp,
    Tags,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Text => write!(f, "text"),
            FieldKind::Number => write!(f, "number"),
            FieldKind::Timestamp => write!(f, "timestamp"),
            FieldKind::Tags => write!(f, "tags"),
        }
    }
}

/// One declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: FieldName,
    #[serde(default)]
    pub kind: FieldKind,
    /// Tags fields only: when true, element order counts as a change.
    #[serde(default)]
    pub order_sensitive: bool,
}

/// Schema for one sheet-backed dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetSchema {
    /// Field whose value uniquely determines a record within a snapshot.
    pub identity: FieldName,
    pub fields: Vec<FieldSpec>,
    /// Reject records with any null/absent/empty-string field.
    #[serde(default)]
    pub strict: bool,
    /// Absent tags cells become `Null` instead of an empty list.
    #[serde(default)]
    pub empty_tags_as_null: bool,
    /// Fields considered by the diff; defaults to every declared
    /// non-identity field in declaration order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_fields: Option<Vec<FieldName>>,
}

impl SheetSchema {
    /// Structural validation: identity must be declared, field names unique,
    /// compare_fields a subset of the declared fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for spec in &self.fields {
            if !seen.insert(&spec.name) {
                return Err(ConfigError::DuplicateField {
                    field: spec.name.0.clone(),
                });
            }
        }
        if !seen.contains(&self.identity) {
            return Err(ConfigError::IdentityNotDeclared {
                field: self.identity.0.clone(),
            });
        }
        if let Some(compare) = &self.compare_fields {
            for name in compare {
                if !seen.contains(name) {
                    return Err(ConfigError::UnknownCompareField {
                        field: name.0.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn field(&self, name: &FieldName) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| &spec.name == name)
    }

    /// Effective compare-field list in declaration order, identity excluded.
    pub fn effective_compare_fields(&self) -> Vec<FieldName> {
        match &self.compare_fields {
            Some(fields) => fields.clone(),
            None => self
                .fields
                .iter()
                .filter(|spec| spec.name != self.identity)
                .map(|spec| spec.name.clone())
                .collect(),
        }
    }
}
