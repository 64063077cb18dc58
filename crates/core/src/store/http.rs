//! Remote REST document store.
//!
//! Documents are created with `POST {base_url}/collections/{collection}/documents`; the store
//! answers `2xx` with a JSON body carrying the assigned `id`.

use super::{check_collection, DocumentId, RecordStore, StoreError, StoreResult};
use crate::submission::PatientDocument;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct HttpRecordStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct CreatedDocument {
    id: String,
}

impl HttpRecordStore {
    /// Builds a store client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Http` if the underlying client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(StoreError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn documents_url(&self, collection: &str) -> String {
        format!("{}/collections/{}/documents", self.base_url, collection)
    }
}

impl RecordStore for HttpRecordStore {
    fn create_record(
        &self,
        collection: &str,
        document: &PatientDocument,
    ) -> impl Future<Output = StoreResult<DocumentId>> + Send {
        async move {
            check_collection(collection)?;

            let mut request = self.client.post(self.documents_url(collection)).json(document);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let response = request.send().await.map_err(StoreError::Http)?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(StoreError::Rejected {
                    status: status.as_u16(),
                    body,
                });
            }

            let created: CreatedDocument = response
                .json()
                .await
                .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;

            let id = created.id.trim();
            if id.is_empty() {
                return Err(StoreError::InvalidResponse(
                    "document id is empty".to_string(),
                ));
            }

            tracing::debug!("document store assigned id {}", id);
            Ok(DocumentId::new(id))
        }
    }
}
