//! Constants used throughout the intake core crate.
//!
//! Collection names, filenames and validation limits live here so the validator, the
//! stores and the configuration layer agree on them.

/// Default collection that completed registrations are written to.
pub const DEFAULT_COLLECTION: &str = "patients";

/// Default directory for the local file store when no explicit directory is configured.
pub const DEFAULT_PATIENT_DATA_DIR: &str = "patient_data";

/// Filename of each stored document inside its sharded directory.
pub const RECORD_JSON_FILENAME: &str = "record.json";

/// Default request timeout for the HTTP document store.
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;

/// Default regional mobile number pattern: 10 digits, leading digit 6 to 9.
pub const DEFAULT_PHONE_PATTERN: &str = r"^[6-9][0-9]{9}$";

/// Human-readable description of [`DEFAULT_PHONE_PATTERN`], used in error messages.
pub const DEFAULT_PHONE_DESCRIPTION: &str = "10 digits starting with 6, 7, 8 or 9";

/// Oldest accepted age in whole years.
pub const MAX_AGE_YEARS: u32 = 140;

/// Banner text shown for any failed submission.
pub const SUBMIT_FAILURE_MESSAGE: &str = "Failed to register patient. Please try again.";

/// Date format accepted for date-of-birth input.
pub const DATE_INPUT_FORMAT: &str = "%Y-%m-%d";
