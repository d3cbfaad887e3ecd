//! Local JSON document store.
//!
//! Persists the table as a single document `{"records": [...]}` with raw
//! field maps, the way a document database holds the synced rows. Writes
//! use the same atomic `.tmp` + rename pattern as the snapshot store.
//! Doubles as the offline destination for tests and small deployments.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sheetsync_core::types::{FieldName, FieldValue, Record, RecordId};
use sheetsync_engine::store::{DownstreamStore, StoreError};

type Document = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct DocumentFile {
    #[serde(default)]
    records: Vec<Document>,
}

/// File-backed document store keyed by the schema's identity field.
pub struct JsonFileStore {
    path: PathBuf,
    identity: FieldName,
}

impl JsonFileStore {
    pub fn new(path: PathBuf, identity: FieldName) -> Self {
        Self { path, identity }
    }

    fn load(&self) -> Result<Vec<Document>, StoreError> {
        if !self.path.exists() {
            return Ok(vec![]);
        }
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| StoreError::Transport(format!("read {}: {e}", self.path.display())))?;
        let file: DocumentFile = serde_json::from_str(&contents)
            .map_err(|e| StoreError::Payload(format!("{}: {e}", self.path.display())))?;
        Ok(file.records)
    }

    fn save(&self, records: Vec<Document>) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| StoreError::Transport(format!("mkdir {}: {e}", dir.display())))?;
        }
        let json = serde_json::to_string_pretty(&DocumentFile { records })
            .map_err(|e| StoreError::Payload(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)
            .map_err(|e| StoreError::Transport(format!("write {}: {e}", tmp.display())))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(StoreError::Transport(format!(
                "rename {}: {e}",
                self.path.display()
            )));
        }
        Ok(())
    }

    fn doc_id(&self, doc: &Document) -> Option<RecordId> {
        doc.get(&self.identity.0)
            .map(|value| FieldValue::from_json(value.clone()))
            .as_ref()
            .and_then(RecordId::from_value)
    }
}

fn to_document(record: &Record) -> Result<Document, StoreError> {
    match serde_json::to_value(&record.fields) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(StoreError::Payload("record fields must be an object".into())),
        Err(e) => Err(StoreError::Payload(e.to_string())),
    }
}

#[async_trait]
impl DownstreamStore for JsonFileStore {
    async fn select_all(&self) -> Result<Vec<Record>, StoreError> {
        self.load()?
            .into_iter()
            .map(|doc| {
                let id = self.doc_id(&doc).ok_or_else(|| {
                    StoreError::Payload(format!(
                        "document missing identity field '{}'",
                        self.identity
                    ))
                })?;
                let fields: BTreeMap<FieldName, FieldValue> = doc
                    .into_iter()
                    .map(|(name, value)| (FieldName(name), FieldValue::from_json(value)))
                    .collect();
                Ok(Record { id, fields })
            })
            .collect()
    }

    async fn insert_many(&self, records: &[Record]) -> Result<(), StoreError> {
        let mut docs = self.load()?;
        for record in records {
            if docs.iter().any(|doc| self.doc_id(doc).as_ref() == Some(&record.id)) {
                return Err(StoreError::Payload(format!(
                    "duplicate id '{}' in store",
                    record.id
                )));
            }
            docs.push(to_document(record)?);
        }
        self.save(docs)
    }

    async fn update_one(
        &self,
        id: &RecordId,
        fields: &[(FieldName, FieldValue)],
    ) -> Result<(), StoreError> {
        let mut docs = self.load()?;
        let doc = docs
            .iter_mut()
            .find(|doc| self.doc_id(doc).as_ref() == Some(id))
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
        for (name, value) in fields {
            let json = serde_json::to_value(value).map_err(|e| StoreError::Payload(e.to_string()))?;
            doc.insert(name.0.clone(), json);
        }
        self.save(docs)
    }

    async fn delete_many(&self, ids: &[RecordId]) -> Result<(), StoreError> {
        let mut docs = self.load()?;
        docs.retain(|doc| {
            self.doc_id(doc)
                .map(|id| !ids.contains(&id))
                .unwrap_or(true)
        });
        self.save(docs)
    }
}
