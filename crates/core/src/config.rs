//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the wizard and
//! the store. The core never reads process-wide environment variables itself: binaries hand
//! [`IntakeConfig::from_lookup`] a lookup closure (usually `std::env::var`), and tests hand it
//! a map.

use crate::constants::{
    DEFAULT_COLLECTION, DEFAULT_PATIENT_DATA_DIR, DEFAULT_PHONE_DESCRIPTION,
    DEFAULT_PHONE_PATTERN, DEFAULT_STORE_TIMEOUT_SECS,
};
use crate::error::{IntakeError, IntakeResult};
use crate::validation::{validate_collection_name, FieldValidator, PhonePolicy};
use intake_types::NonEmptyText;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_STORE: &str = "INTAKE_STORE";
pub const ENV_PATIENT_DATA_DIR: &str = "PATIENT_DATA_DIR";
pub const ENV_STORE_URL: &str = "INTAKE_STORE_URL";
pub const ENV_STORE_API_KEY: &str = "INTAKE_STORE_API_KEY";
pub const ENV_STORE_TIMEOUT_SECS: &str = "INTAKE_STORE_TIMEOUT_SECS";
pub const ENV_COLLECTION: &str = "INTAKE_COLLECTION";
pub const ENV_PHONE_PATTERN: &str = "INTAKE_PHONE_PATTERN";
pub const ENV_PHONE_DESCRIPTION: &str = "INTAKE_PHONE_DESCRIPTION";

/// Where completed registrations are persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    /// Local JSON documents under `data_dir/<collection>/`.
    File { data_dir: PathBuf },
    /// Remote REST document store.
    Http {
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    },
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct IntakeConfig {
    store_backend: StoreBackend,
    collection: NonEmptyText,
    phone_policy: PhonePolicy,
}

impl IntakeConfig {
    /// Create a new `IntakeConfig`.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::InvalidInput` if the collection name is not path/URL safe, or
    /// `IntakeError::Config` if the HTTP base URL is not an `http(s)://` URL.
    pub fn new(
        store_backend: StoreBackend,
        collection: &str,
        phone_policy: PhonePolicy,
    ) -> IntakeResult<Self> {
        validate_collection_name(collection)?;
        let collection = NonEmptyText::new(collection)
            .map_err(|e| IntakeError::InvalidInput(format!("collection: {e}")))?;

        if let StoreBackend::Http { base_url, .. } = &store_backend {
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                return Err(IntakeError::Config(format!(
                    "store URL must start with http:// or https://, got '{}'",
                    base_url
                )));
            }
        }

        Ok(Self {
            store_backend,
            collection,
            phone_policy,
        })
    }

    /// Resolve configuration from a key lookup, applying defaults for unset keys.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> IntakeResult<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let store_backend = store_backend_from_env_values(
            get(ENV_STORE),
            get(ENV_PATIENT_DATA_DIR),
            get(ENV_STORE_URL),
            get(ENV_STORE_API_KEY),
            get(ENV_STORE_TIMEOUT_SECS),
        )?;
        let phone_policy =
            phone_policy_from_env_values(get(ENV_PHONE_PATTERN), get(ENV_PHONE_DESCRIPTION))?;
        let collection = get(ENV_COLLECTION).unwrap_or_else(|| DEFAULT_COLLECTION.to_string());

        Self::new(store_backend, &collection, phone_policy)
    }

    pub fn store_backend(&self) -> &StoreBackend {
        &self.store_backend
    }

    pub fn collection(&self) -> &NonEmptyText {
        &self.collection
    }

    pub fn phone_policy(&self) -> &PhonePolicy {
        &self.phone_policy
    }

    /// The field validator implied by this configuration.
    pub fn validator(&self) -> FieldValidator {
        FieldValidator::new(self.phone_policy.clone())
    }

    /// Data directory of the file backend, if that backend is configured.
    pub fn patient_data_dir(&self) -> Option<&Path> {
        match &self.store_backend {
            StoreBackend::File { data_dir } => Some(data_dir),
            StoreBackend::Http { .. } => None,
        }
    }
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::File {
                data_dir: PathBuf::from(DEFAULT_PATIENT_DATA_DIR),
            },
            collection: NonEmptyText::new(DEFAULT_COLLECTION)
                .unwrap_or_else(|_| unreachable!("default collection is non-empty")),
            phone_policy: PhonePolicy::default(),
        }
    }
}

/// Parse the store backend from optional string values.
///
/// `kind` is `file` (default) or `http`. The HTTP backend requires `url`.
pub fn store_backend_from_env_values(
    kind: Option<String>,
    data_dir: Option<String>,
    url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<String>,
) -> IntakeResult<StoreBackend> {
    match kind.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("file") => Ok(StoreBackend::File {
            data_dir: PathBuf::from(data_dir.unwrap_or_else(|| DEFAULT_PATIENT_DATA_DIR.into())),
        }),
        Some("http") => {
            let base_url = url.ok_or_else(|| {
                IntakeError::Config(format!(
                    "{ENV_STORE_URL} is required when {ENV_STORE}=http"
                ))
            })?;
            let timeout_secs = match timeout_secs {
                Some(v) => v.parse::<u64>().map_err(|_| {
                    IntakeError::Config(format!(
                        "{ENV_STORE_TIMEOUT_SECS} must be a whole number of seconds, got '{v}'"
                    ))
                })?,
                None => DEFAULT_STORE_TIMEOUT_SECS,
            };

            Ok(StoreBackend::Http {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
                timeout: Duration::from_secs(timeout_secs),
            })
        }
        Some(other) => Err(IntakeError::Config(format!(
            "{ENV_STORE} must be 'file' or 'http', got '{other}'"
        ))),
    }
}

/// Parse the phone policy from optional string values.
///
/// A custom pattern requires a description so that error messages stay meaningful.
pub fn phone_policy_from_env_values(
    pattern: Option<String>,
    description: Option<String>,
) -> IntakeResult<PhonePolicy> {
    match (pattern, description) {
        (None, None) => Ok(PhonePolicy::default()),
        (None, Some(description)) => PhonePolicy::new(DEFAULT_PHONE_PATTERN, description),
        (Some(_), None) => Err(IntakeError::Config(format!(
            "{ENV_PHONE_DESCRIPTION} is required when {ENV_PHONE_PATTERN} is set"
        ))),
        (Some(pattern), Some(description)) => PhonePolicy::new(&pattern, description),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_file_store_and_patients_collection() {
        let cfg = IntakeConfig::from_lookup(lookup(&[])).expect("defaults should resolve");

        assert_eq!(
            cfg.store_backend(),
            &StoreBackend::File {
                data_dir: PathBuf::from(DEFAULT_PATIENT_DATA_DIR)
            }
        );
        assert_eq!(cfg.collection().as_str(), "patients");
        assert_eq!(cfg.phone_policy().pattern(), DEFAULT_PHONE_PATTERN);
        assert_eq!(cfg.phone_policy().description(), DEFAULT_PHONE_DESCRIPTION);
    }

    #[test]
    fn resolves_http_store() {
        let cfg = IntakeConfig::from_lookup(lookup(&[
            (ENV_STORE, "HTTP"),
            (ENV_STORE_URL, "https://docs.example.test/v1/"),
            (ENV_STORE_API_KEY, "secret"),
            (ENV_STORE_TIMEOUT_SECS, "3"),
            (ENV_COLLECTION, "registrations"),
        ]))
        .expect("http config should resolve");

        assert_eq!(
            cfg.store_backend(),
            &StoreBackend::Http {
                base_url: "https://docs.example.test/v1".into(),
                api_key: Some("secret".into()),
                timeout: Duration::from_secs(3),
            }
        );
        assert_eq!(cfg.collection().as_str(), "registrations");
        assert_eq!(cfg.patient_data_dir(), None);
    }

    #[test]
    fn http_store_requires_url() {
        let err = IntakeConfig::from_lookup(lookup(&[(ENV_STORE, "http")]))
            .expect_err("missing url should fail");
        assert!(err.to_string().contains(ENV_STORE_URL));
    }

    #[test]
    fn rejects_non_http_url_and_bad_timeout() {
        assert!(IntakeConfig::from_lookup(lookup(&[
            (ENV_STORE, "http"),
            (ENV_STORE_URL, "ftp://example.test"),
        ]))
        .is_err());
        assert!(IntakeConfig::from_lookup(lookup(&[
            (ENV_STORE, "http"),
            (ENV_STORE_URL, "http://example.test"),
            (ENV_STORE_TIMEOUT_SECS, "soon"),
        ]))
        .is_err());
    }

    #[test]
    fn rejects_unknown_store_kind_and_unsafe_collection() {
        assert!(IntakeConfig::from_lookup(lookup(&[(ENV_STORE, "sqlite")])).is_err());
        assert!(IntakeConfig::from_lookup(lookup(&[(ENV_COLLECTION, "../other")])).is_err());
    }

    #[test]
    fn empty_values_count_as_unset() {
        let cfg = IntakeConfig::from_lookup(lookup(&[
            (ENV_STORE, "  "),
            (ENV_COLLECTION, ""),
        ]))
        .expect("blank values should fall back to defaults");
        assert_eq!(cfg.collection().as_str(), "patients");
    }

    #[test]
    fn custom_phone_policy_needs_description() {
        assert!(phone_policy_from_env_values(Some(r"^\d{11}$".into()), None).is_err());

        let policy = phone_policy_from_env_values(
            Some(r"^0[0-9]{10}$".into()),
            Some("11 digits starting with 0".into()),
        )
        .expect("custom policy should resolve");
        assert!(policy.matches("01234567890"));
        assert!(!policy.matches("9123456789"));
    }
}
