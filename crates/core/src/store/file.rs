//! Local JSON document store.
//!
//! Each document is written to its own directory, sharded by the first four hex characters
//! of a freshly generated UUID:
//!
//! ```text
//! <data_dir>/<collection>/<s1>/<s2>/<32hex-uuid>/record.json
//! ```
//!
//! The directory name is the document identifier.

use super::{check_collection, DocumentId, RecordStore, StoreError, StoreResult};
use crate::constants::RECORD_JSON_FILENAME;
use crate::submission::PatientDocument;
use intake_uuid::ShardableUuid;
use std::fs;
use std::future::Future;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

const MAX_ALLOCATION_ATTEMPTS: usize = 5;

/// A document read back from the file store.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub document: PatientDocument,
}

#[derive(Clone, Debug)]
pub struct FileRecordStore {
    data_dir: PathBuf,
}

impl FileRecordStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn collection_dir(&self, collection: &str) -> PathBuf {
        self.data_dir.join(collection)
    }

    /// Writes `document` synchronously. [`RecordStore::create_record`] runs this on the
    /// blocking pool.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the collection name is unsafe, serialisation fails, or the
    /// record directory/file cannot be created. A partially created record directory is
    /// removed before returning a write error.
    pub fn create_record_blocking(
        &self,
        collection: &str,
        document: &PatientDocument,
    ) -> StoreResult<DocumentId> {
        check_collection(collection)?;
        let json = serde_json::to_string_pretty(document).map_err(StoreError::Serialization)?;

        let (uuid, record_dir) =
            create_unique_record_dir(&self.collection_dir(collection), ShardableUuid::new)?;

        if let Err(e) = fs::write(record_dir.join(RECORD_JSON_FILENAME), json) {
            if let Err(cleanup) = fs::remove_dir_all(&record_dir) {
                tracing::warn!(
                    "failed to remove incomplete record dir {}: {}",
                    record_dir.display(),
                    cleanup
                );
            }
            return Err(StoreError::FileWrite(e));
        }

        tracing::debug!("stored record {} in {}", uuid, record_dir.display());
        Ok(DocumentId::new(uuid.to_string()))
    }

    /// Reads one stored document by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidDocumentId` for a non-canonical id, `StoreError::FileRead`
    /// if no such document exists, or `StoreError::Deserialization` if it cannot be parsed.
    pub fn read(&self, collection: &str, id: &DocumentId) -> StoreResult<PatientDocument> {
        check_collection(collection)?;
        let uuid = ShardableUuid::parse(id.as_str())
            .map_err(|e| StoreError::InvalidDocumentId(e.to_string()))?;
        let path = uuid
            .sharded_dir(&self.collection_dir(collection))
            .join(RECORD_JSON_FILENAME);

        let contents = fs::read_to_string(&path).map_err(StoreError::FileRead)?;
        serde_json::from_str(&contents).map_err(StoreError::Deserialization)
    }

    /// Lists every document in `collection`, oldest first.
    ///
    /// Walks the sharded tree; entries that are not canonical UUID directories or whose
    /// `record.json` cannot be parsed are logged and skipped. A missing collection directory
    /// yields an empty list.
    pub fn list(&self, collection: &str) -> StoreResult<Vec<StoredDocument>> {
        check_collection(collection)?;
        let base = self.collection_dir(collection);

        let mut documents = Vec::new();

        let s1_iter = match fs::read_dir(&base) {
            Ok(it) => it,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(documents),
            Err(e) => return Err(StoreError::FileRead(e)),
        };

        for s1 in s1_iter.flatten() {
            let s1_path = s1.path();
            if !s1_path.is_dir() {
                continue;
            }

            let Ok(s2_iter) = fs::read_dir(&s1_path) else {
                continue;
            };

            for s2 in s2_iter.flatten() {
                let s2_path = s2.path();
                if !s2_path.is_dir() {
                    continue;
                }

                let Ok(id_iter) = fs::read_dir(&s2_path) else {
                    continue;
                };

                for id_ent in id_iter.flatten() {
                    let id_path = id_ent.path();
                    let Some(id) = id_path.file_name().and_then(|os| os.to_str()) else {
                        continue;
                    };
                    if !id_path.is_dir() || !ShardableUuid::is_canonical(id) {
                        continue;
                    }

                    let record_path = id_path.join(RECORD_JSON_FILENAME);
                    let Ok(contents) = fs::read_to_string(&record_path) else {
                        continue;
                    };

                    match serde_json::from_str::<PatientDocument>(&contents) {
                        Ok(document) => documents.push(StoredDocument {
                            id: DocumentId::new(id),
                            document,
                        }),
                        Err(e) => {
                            tracing::warn!(
                                "failed to parse record {}: {}",
                                record_path.display(),
                                e
                            );
                        }
                    }
                }
            }
        }

        documents.sort_by(|a, b| a.document.created_at.cmp(&b.document.created_at));
        Ok(documents)
    }
}

impl RecordStore for FileRecordStore {
    fn create_record(
        &self,
        collection: &str,
        document: &PatientDocument,
    ) -> impl Future<Output = StoreResult<DocumentId>> + Send {
        let store = self.clone();
        let collection = collection.to_string();
        let document = document.clone();

        async move {
            tokio::task::spawn_blocking(move || store.create_record_blocking(&collection, &document))
                .await
                .map_err(StoreError::Join)?
        }
    }
}

/// Allocates a fresh sharded directory under `base_dir`.
///
/// Retries with a new UUID when the candidate already exists, up to a fixed number of
/// attempts.
fn create_unique_record_dir(
    base_dir: &Path,
    mut uuid_source: impl FnMut() -> ShardableUuid,
) -> StoreResult<(ShardableUuid, PathBuf)> {
    for _attempt in 0..MAX_ALLOCATION_ATTEMPTS {
        let uuid = uuid_source();
        let candidate = uuid.sharded_dir(base_dir);

        if candidate.exists() {
            continue;
        }

        if let Some(parent) = candidate.parent() {
            fs::create_dir_all(parent).map_err(StoreError::DirCreation)?;
        }

        match fs::create_dir(&candidate) {
            Ok(()) => return Ok((uuid, candidate)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(StoreError::DirCreation(e)),
        }
    }

    Err(StoreError::DirCreation(io::Error::new(
        ErrorKind::AlreadyExists,
        format!(
            "failed to allocate a unique record directory after {} attempts",
            MAX_ALLOCATION_ATTEMPTS
        ),
    )))
}
