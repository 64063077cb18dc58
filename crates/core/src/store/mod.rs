//! Document store collaborator.
//!
//! A completed registration is handed to a [`RecordStore`] as a [`PatientDocument`] and the
//! store answers with the identifier it assigned. Two adapters are provided:
//!
//! - [`FileRecordStore`]: JSON documents in a sharded directory tree on local disk.
//! - [`HttpRecordStore`]: a remote REST document store.
//!
//! [`ConfiguredStore`] picks one of them from [`IntakeConfig`].

mod file;
mod http;

pub use file::{FileRecordStore, StoredDocument};
pub use http::HttpRecordStore;

use crate::config::{IntakeConfig, StoreBackend};
use crate::submission::PatientDocument;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Identifier assigned to a stored document by the store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid collection name: {0}")]
    InvalidCollection(String),
    #[error("invalid document id: {0}")]
    InvalidDocumentId(String),
    #[error("failed to create record directory: {0}")]
    DirCreation(std::io::Error),
    #[error("failed to write record file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read record file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize record: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize record: {0}")]
    Deserialization(serde_json::Error),
    #[error("document store request failed: {0}")]
    Http(reqwest::Error),
    #[error("document store rejected the record with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("document store returned an unexpected response: {0}")]
    InvalidResponse(String),
    #[error("store task failed: {0}")]
    Join(tokio::task::JoinError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persists completed registrations.
pub trait RecordStore: Send + Sync {
    /// Stores `document` in `collection` and returns the identifier the store assigned.
    fn create_record(
        &self,
        collection: &str,
        document: &PatientDocument,
    ) -> impl Future<Output = StoreResult<DocumentId>> + Send;
}

impl<T: RecordStore> RecordStore for &T {
    fn create_record(
        &self,
        collection: &str,
        document: &PatientDocument,
    ) -> impl Future<Output = StoreResult<DocumentId>> + Send {
        (**self).create_record(collection, document)
    }
}

impl<T: RecordStore> RecordStore for Arc<T> {
    fn create_record(
        &self,
        collection: &str,
        document: &PatientDocument,
    ) -> impl Future<Output = StoreResult<DocumentId>> + Send {
        (**self).create_record(collection, document)
    }
}

/// The store selected by configuration.
#[derive(Clone, Debug)]
pub enum ConfiguredStore {
    File(FileRecordStore),
    Http(HttpRecordStore),
}

impl ConfiguredStore {
    /// Builds the store named by `config`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Http` if the HTTP client cannot be constructed.
    pub fn from_config(config: &IntakeConfig) -> StoreResult<Self> {
        match config.store_backend() {
            StoreBackend::File { data_dir } => {
                Ok(Self::File(FileRecordStore::new(data_dir.clone())))
            }
            StoreBackend::Http {
                base_url,
                api_key,
                timeout,
            } => Ok(Self::Http(HttpRecordStore::new(
                base_url.clone(),
                api_key.clone(),
                *timeout,
            )?)),
        }
    }

    pub fn as_file(&self) -> Option<&FileRecordStore> {
        match self {
            Self::File(store) => Some(store),
            Self::Http(_) => None,
        }
    }
}

impl RecordStore for ConfiguredStore {
    fn create_record(
        &self,
        collection: &str,
        document: &PatientDocument,
    ) -> impl Future<Output = StoreResult<DocumentId>> + Send {
        async move {
            match self {
                Self::File(store) => store.create_record(collection, document).await,
                Self::Http(store) => store.create_record(collection, document).await,
            }
        }
    }
}

fn check_collection(collection: &str) -> StoreResult<()> {
    crate::validation::validate_collection_name(collection)
        .map_err(|e| StoreError::InvalidCollection(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn configured_store_follows_backend() {
        let config = IntakeConfig::default();
        let store = ConfiguredStore::from_config(&config).expect("file store should build");
        let file = store.as_file().expect("default backend is the file store");
        assert_eq!(file.data_dir(), PathBuf::from("patient_data").as_path());

        let config = IntakeConfig::new(
            StoreBackend::Http {
                base_url: "http://127.0.0.1:9".into(),
                api_key: None,
                timeout: std::time::Duration::from_secs(1),
            },
            "patients",
            Default::default(),
        )
        .unwrap();
        let store = ConfiguredStore::from_config(&config).expect("http store should build");
        assert!(store.as_file().is_none());
    }

    #[test]
    fn document_id_serialises_as_plain_string() {
        let id = DocumentId::new("abc123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");
        assert_eq!(id.to_string(), "abc123");
    }
}
