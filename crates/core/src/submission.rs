//! Submitting a completed registration.
//!
//! Submission is split in two so that a host can release its lock on the wizard while the
//! store call is in flight:
//!
//! 1. [`IntakeWizard::prepare_submission`] revalidates the whole draft, resolves the signed-in
//!    identity and builds the [`PatientDocument`]. On success the wizard is `Submitting`.
//! 2. [`IntakeWizard::complete_submission`] applies the store's answer.
//!
//! [`IntakeWizard::submit`] runs both around a [`RecordStore`] call for callers that can hold
//! `&mut IntakeWizard` across the await.
//!
//! A missing identity and a failed store call produce the same generic banner; the detail
//! only goes to the log.

use crate::constants::SUBMIT_FAILURE_MESSAGE;
use crate::error::{IntakeError, IntakeResult};
use crate::fields::{FieldName, Step};
use crate::identity::IdentityProvider;
use crate::record::{PatientDraft, PatientRecord};
use crate::store::{DocumentId, RecordStore, StoreResult};
use crate::wizard::{IntakeWizard, SubmitStatus};
use chrono::{DateTime, Utc};
use intake_types::NonEmptyText;
use serde::{Deserialize, Serialize};

/// The document handed to the store: the record plus who submitted it and when.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDocument {
    #[serde(flatten)]
    pub record: PatientRecord,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// A prepared submission waiting for the store.
#[derive(Clone, Debug)]
pub struct SubmissionTicket {
    document: PatientDocument,
    collection: NonEmptyText,
}

impl SubmissionTicket {
    pub fn document(&self) -> &PatientDocument {
        &self.document
    }

    pub fn collection(&self) -> &NonEmptyText {
        &self.collection
    }
}

#[derive(Clone, Debug)]
pub enum Prepared {
    /// Revalidation failed; the wizard stays on the final step with errors populated.
    Blocked { failing: Vec<FieldName> },
    /// Refused before any store call; the banner is set.
    Refused { message: String },
    Ready(SubmissionTicket),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Blocked { failing: Vec<FieldName> },
    Accepted { document_id: DocumentId },
    Failed { message: String },
}

impl IntakeWizard {
    /// Checks every step, resolves the submitter and builds the document to store.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::NotOnFinalStep` before step 5,
    /// `IntakeError::SubmissionInProgress` while another submission is in flight and
    /// `IntakeError::RegistrationComplete` on the confirmation view.
    pub fn prepare_submission(
        &mut self,
        identity_provider: &impl IdentityProvider,
    ) -> IntakeResult<Prepared> {
        self.ensure_open()?;
        if self.current_step != Step::LAST {
            return Err(IntakeError::NotOnFinalStep(self.current_step));
        }
        if self.is_submitting() {
            return Err(IntakeError::SubmissionInProgress);
        }

        let today = self.today();
        let errors = self.validator.check_all(&self.draft, today);
        if !errors.is_empty() {
            let failing: Vec<FieldName> = errors.iter().map(|(field, _)| field).collect();
            tracing::info!(
                "submission blocked by {} failing field(s)",
                failing.len()
            );
            self.errors = errors;
            return Ok(Prepared::Blocked { failing });
        }
        self.errors.clear();

        let Some(identity) = identity_provider.current_identity() else {
            tracing::warn!("submission refused: no signed-in user");
            return Ok(self.refuse());
        };

        let record = match PatientRecord::from_draft(&self.draft, &self.validator, today) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("submission refused: {}", e);
                return Ok(self.refuse());
            }
        };

        let document = PatientDocument {
            record,
            created_by: identity.uid.to_string(),
            created_at: Utc::now(),
        };

        self.submit_status = SubmitStatus::Submitting;
        tracing::info!(
            "submitting registration to collection {} for user {}",
            self.collection,
            document.created_by
        );

        Ok(Prepared::Ready(SubmissionTicket {
            document,
            collection: self.collection.clone(),
        }))
    }

    /// Applies the store's answer to a prepared submission.
    ///
    /// On success the draft and errors are reset and the confirmation view is shown. On
    /// failure the draft is kept, the wizard stays on step 5 and the banner is set.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::NoSubmissionInFlight` unless the wizard is `Submitting`.
    pub fn complete_submission(
        &mut self,
        ticket: SubmissionTicket,
        result: StoreResult<DocumentId>,
    ) -> IntakeResult<SubmitOutcome> {
        if !self.is_submitting() {
            return Err(IntakeError::NoSubmissionInFlight);
        }

        match result {
            Ok(document_id) => {
                tracing::info!(
                    "registration stored in {} as {}",
                    ticket.collection,
                    document_id
                );
                self.draft = PatientDraft::default();
                self.errors.clear();
                self.submit_status = SubmitStatus::Success {
                    document_id: document_id.clone(),
                };
                Ok(SubmitOutcome::Accepted { document_id })
            }
            Err(e) => {
                tracing::error!(
                    "failed to store registration in {}: {}",
                    ticket.collection,
                    e
                );
                let message = SUBMIT_FAILURE_MESSAGE.to_string();
                self.submit_status = SubmitStatus::Error {
                    message: message.clone(),
                };
                Ok(SubmitOutcome::Failed { message })
            }
        }
    }

    /// Prepares, stores and completes a submission in one call.
    ///
    /// # Errors
    ///
    /// As for [`IntakeWizard::prepare_submission`].
    pub async fn submit(
        &mut self,
        identity_provider: &impl IdentityProvider,
        store: &impl RecordStore,
    ) -> IntakeResult<SubmitOutcome> {
        match self.prepare_submission(identity_provider)? {
            Prepared::Blocked { failing } => Ok(SubmitOutcome::Blocked { failing }),
            Prepared::Refused { message } => Ok(SubmitOutcome::Failed { message }),
            Prepared::Ready(ticket) => {
                let result = store
                    .create_record(ticket.collection().as_str(), ticket.document())
                    .await;
                self.complete_submission(ticket, result)
            }
        }
    }

    fn refuse(&mut self) -> Prepared {
        let message = SUBMIT_FAILURE_MESSAGE.to_string();
        self.submit_status = SubmitStatus::Error {
            message: message.clone(),
        };
        Prepared::Refused { message }
    }
}
