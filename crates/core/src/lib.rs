//! # Intake Core
//!
//! Core logic of the patient intake wizard:
//! - Per-field validation rules and the step gates built on them
//! - The five-step wizard state machine with age derived from date of birth
//! - Submission of the completed record to a document store on behalf of the signed-in user
//! - File and HTTP document store adapters
//!
//! **No API concerns**: HTTP servers and terminal front-ends belong in `api-rest` and
//! `intake-cli`. Configuration is resolved by those binaries and injected via
//! [`IntakeConfig`]; nothing in this crate reads the process environment.

pub mod age;
pub mod config;
pub mod constants;
pub mod error;
pub mod fields;
pub mod identity;
pub mod record;
pub mod store;
pub mod submission;
pub mod validation;
pub mod wizard;

pub use config::{IntakeConfig, StoreBackend};
pub use error::{IntakeError, IntakeResult};
pub use fields::{BloodGroup, FieldName, Gender, Step};
pub use identity::{Identity, IdentityProvider, StaticIdentity};
pub use record::{PatientDraft, PatientRecord};
pub use store::{
    ConfiguredStore, DocumentId, FileRecordStore, HttpRecordStore, RecordStore, StoreError,
    StoreResult, StoredDocument,
};
pub use submission::{PatientDocument, Prepared, SubmissionTicket, SubmitOutcome};
pub use validation::{validate_field, FieldErrors, FieldValidator, PhonePolicy};
pub use wizard::{Clock, IntakeWizard, StepOutcome, SubmitStatus, WizardView};

pub use intake_types::{EmailAddress, NonEmptyText, TextError};
