use crate::fields::{FieldName, Step};

/// Errors returned by wizard operations and configuration.
///
/// Field validation failures are *not* errors in this sense: they are collected into
/// [`crate::FieldErrors`] and shown next to the offending input. These variants cover input
/// that can never be accepted and operations invoked in the wrong wizard state.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("'{value}' is not a valid option for {field}")]
    UnknownOption { field: FieldName, value: String },
    #[error("already on the final step; submit instead")]
    NoNextStep,
    #[error("submission is only available on the final step (currently on step {})", .0.number())]
    NotOnFinalStep(Step),
    #[error("a submission is already in progress")]
    SubmissionInProgress,
    #[error("no submission is in progress")]
    NoSubmissionInFlight,
    #[error("registration is complete; start over to register another patient")]
    RegistrationComplete,
    #[error("registration has not been completed")]
    NotCompleted,
    #[error("record is not valid: {field}: {message}")]
    InvalidRecord { field: FieldName, message: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("configuration error: {0}")]
    Config(String),
}

pub type IntakeResult<T> = std::result::Result<T, IntakeError>;
