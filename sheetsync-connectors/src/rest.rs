//! PostgREST-style downstream store (Supabase and compatible endpoints).
//!
//! Wire conventions:
//! - `GET    {endpoint}/{table}?select=*`            — select_all
//! - `POST   {endpoint}/{table}`                     — insert batch (JSON array)
//! - `PATCH  {endpoint}/{table}?{id}=eq.{value}`     — update one, changed fields only
//! - `DELETE {endpoint}/{table}?{id}=in.(...)`       — batched delete

use std::collections::BTreeMap;

use async_trait::async_trait;

use sheetsync_core::error::ConfigError;
use sheetsync_core::types::{FieldName, FieldValue, Record, RecordId};
use sheetsync_engine::store::{DownstreamStore, StoreError};

/// Row-level REST store keyed by the schema's identity column.
pub struct RestStore {
    client: reqwest::Client,
    endpoint: String,
    table: String,
    key: String,
    identity: FieldName,
}

impl RestStore {
    pub fn new(endpoint: String, table: String, key: String, identity: FieldName) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            table,
            key,
            identity,
        }
    }

    /// Build a store taking the service key from `key_env`.
    ///
    /// Fails before any network interaction when the variable is unset.
    pub fn from_env(
        endpoint: String,
        table: String,
        key_env: &str,
        identity: FieldName,
    ) -> Result<Self, ConfigError> {
        let key = std::env::var(key_env).map_err(|_| ConfigError::MissingToken {
            var: key_env.to_owned(),
        })?;
        Ok(Self::new(endpoint, table, key, identity))
    }

    fn table_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.table)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("apikey", &self.key).bearer_auth(&self.key)
    }

    fn record_from_row(
        &self,
        row: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Record, StoreError> {
        let fields: BTreeMap<FieldName, FieldValue> = row
            .into_iter()
            .map(|(name, value)| (FieldName(name), FieldValue::from_json(value)))
            .collect();
        let id = fields
            .get(&self.identity)
            .and_then(RecordId::from_value)
            .ok_or_else(|| {
                StoreError::Payload(format!("row missing identity field '{}'", self.identity))
            })?;
        Ok(Record { id, fields })
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Rejected {
        status: status.as_u16(),
        body,
    })
}

fn transport(error: reqwest::Error) -> StoreError {
    StoreError::Transport(error.to_string())
}

/// Render a PostgREST `in.(...)` filter value. Identities that are not
/// plain numerics are quoted.
fn in_filter(ids: &[RecordId]) -> String {
    let rendered: Vec<String> = ids
        .iter()
        .map(|id| {
            if id.0.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-') {
                id.0.clone()
            } else {
                format!("\"{}\"", id.0.replace('"', "\\\""))
            }
        })
        .collect();
    format!("in.({})", rendered.join(","))
}

#[async_trait]
impl DownstreamStore for RestStore {
    async fn select_all(&self) -> Result<Vec<Record>, StoreError> {
        tracing::debug!(table = %self.table, "selecting existing rows");
        let response = self
            .authorize(self.client.get(self.table_url()).query(&[("select", "*")]))
            .send()
            .await
            .map_err(transport)?;
        let rows: Vec<serde_json::Map<String, serde_json::Value>> = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Payload(e.to_string()))?;
        rows.into_iter()
            .map(|row| self.record_from_row(row))
            .collect()
    }

    async fn insert_many(&self, records: &[Record]) -> Result<(), StoreError> {
        let payload: Vec<&BTreeMap<FieldName, FieldValue>> =
            records.iter().map(|record| &record.fields).collect();
        let response = self
            .authorize(self.client.post(self.table_url()))
            .header("Prefer", "return=minimal")
            .json(&payload)
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await?;
        Ok(())
    }

    async fn update_one(
        &self,
        id: &RecordId,
        fields: &[(FieldName, FieldValue)],
    ) -> Result<(), StoreError> {
        let payload: BTreeMap<&FieldName, &FieldValue> =
            fields.iter().map(|(name, value)| (name, value)).collect();
        let response = self
            .authorize(
                self.client
                    .patch(self.table_url())
                    .query(&[(self.identity.0.as_str(), format!("eq.{}", id.0))]),
            )
            .header("Prefer", "return=minimal")
            .json(&payload)
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete_many(&self, ids: &[RecordId]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let response = self
            .authorize(
                self.client
                    .delete(self.table_url())
                    .query(&[(self.identity.0.as_str(), in_filter(ids))]),
            )
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_identities_render_unquoted() {
        let ids = vec![RecordId::from("1"), RecordId::from("2")];
        assert_eq!(in_filter(&ids), "in.(1,2)");
    }

    #[test]
    fn text_identities_render_quoted() {
        let ids = vec![RecordId::from("job-a"), RecordId::from("3")];
        assert_eq!(in_filter(&ids), "in.(\"job-a\",3)");
    }

    #[test]
    fn rows_convert_to_typed_records() {
        let store = RestStore::new(
            "https://example.test/rest/v1".into(),
            "job_post_data".into(),
            "key".into(),
            FieldName::from("id"),
        );
        let row: serde_json::Map<String, serde_json::Value> = serde_json::from_str(
            r#"{"id": 7, "title": "dev", "tags": ["rust", "remote"], "price": null}"#,
        )
        .unwrap();
        let record = store.record_from_row(row).expect("record");
        assert_eq!(record.id, RecordId::from("7"));
        assert_eq!(
            record.get(&FieldName::from("tags")),
            Some(&FieldValue::Tags(vec!["rust".into(), "remote".into()]))
        );
        assert_eq!(
            record.get(&FieldName::from("price")),
            Some(&FieldValue::Null)
        );
    }

    #[test]
    fn row_without_identity_is_a_payload_error() {
        let store = RestStore::new(
            "https://example.test/rest/v1".into(),
            "job_post_data".into(),
            "key".into(),
            FieldName::from("id"),
        );
        let row: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(r#"{"title": "dev"}"#).unwrap();
        assert!(matches!(
            store.record_from_row(row),
            Err(StoreError::Payload(_))
        ));
    }

    #[test]
    fn endpoint_trailing_slash_is_normalized() {
        let store = RestStore::new(
            "https://example.test/rest/v1/".into(),
            "jobs".into(),
            "key".into(),
            FieldName::from("id"),
        );
        assert_eq!(store.table_url(), "https://example.test/rest/v1/jobs");
    }
}
