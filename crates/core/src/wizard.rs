//! The five-step intake wizard.
//!
//! [`IntakeWizard`] owns one in-progress registration: the draft, the current step, the map of
//! failing fields and the submission status. Every transition is a method call; nothing runs
//! in the background. Submission lives in [`crate::submission`].

use crate::age::{derived_age, parse_date_input};
use crate::config::IntakeConfig;
use crate::error::{IntakeError, IntakeResult};
use crate::fields::{FieldName, Step};
use crate::record::PatientDraft;
use crate::store::DocumentId;
use crate::validation::{FieldErrors, FieldValidator};
use chrono::NaiveDate;
use intake_types::NonEmptyText;
use serde::Serialize;

/// Source of "today" for age derivation and the date-of-birth rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Clock {
    /// The local calendar date at the time of the call.
    #[default]
    System,
    Fixed(NaiveDate),
}

impl Clock {
    pub fn today(&self) -> NaiveDate {
        match self {
            Clock::System => chrono::Local::now().date_naive(),
            Clock::Fixed(date) => *date,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SubmitStatus {
    #[default]
    Idle,
    Submitting,
    #[serde(rename_all = "camelCase")]
    Success { document_id: DocumentId },
    Error { message: String },
}

/// Result of a navigation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step gate passed and the wizard moved forward.
    Advanced(Step),
    /// The wizard moved back.
    Moved(Step),
    /// Already on the first step.
    Stayed(Step),
    /// The step gate failed; every failing field is listed.
    Blocked { step: Step, failing: Vec<FieldName> },
}

impl StepOutcome {
    /// The step the wizard is on after the request.
    pub fn step(&self) -> Step {
        match self {
            StepOutcome::Advanced(step)
            | StepOutcome::Moved(step)
            | StepOutcome::Stayed(step)
            | StepOutcome::Blocked { step, .. } => *step,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WizardView {
    Step(Step),
    /// Terminal success view, shown after the store accepted the registration.
    Confirmation { document_id: DocumentId },
}

#[derive(Clone, Debug)]
pub struct IntakeWizard {
    pub(crate) validator: FieldValidator,
    pub(crate) clock: Clock,
    pub(crate) collection: NonEmptyText,
    pub(crate) current_step: Step,
    pub(crate) draft: PatientDraft,
    pub(crate) errors: FieldErrors,
    pub(crate) submit_status: SubmitStatus,
}

impl Default for IntakeWizard {
    fn default() -> Self {
        Self::new(&IntakeConfig::default())
    }
}

impl IntakeWizard {
    /// A fresh wizard on step 1 with an empty draft.
    pub fn new(config: &IntakeConfig) -> Self {
        Self::with_validator(config.validator(), config.collection().clone())
    }

    pub fn with_validator(validator: FieldValidator, collection: NonEmptyText) -> Self {
        Self {
            validator,
            clock: Clock::System,
            collection,
            current_step: Step::FIRST,
            draft: PatientDraft::default(),
            errors: FieldErrors::new(),
            submit_status: SubmitStatus::Idle,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn current_step(&self) -> Step {
        self.current_step
    }

    pub fn draft(&self) -> &PatientDraft {
        &self.draft
    }

    /// Every recorded error, including those for steps not currently shown.
    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// Errors for the fields rendered on the current step.
    pub fn visible_errors(&self) -> FieldErrors {
        self.errors
            .for_step(self.current_step)
            .map(|(field, message)| (field, message.to_string()))
            .collect()
    }

    pub fn submit_status(&self) -> &SubmitStatus {
        &self.submit_status
    }

    pub fn collection(&self) -> &NonEmptyText {
        &self.collection
    }

    pub fn validator(&self) -> &FieldValidator {
        &self.validator
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn view(&self) -> WizardView {
        match &self.submit_status {
            SubmitStatus::Success { document_id } => WizardView::Confirmation {
                document_id: document_id.clone(),
            },
            _ => WizardView::Step(self.current_step),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.submit_status, SubmitStatus::Success { .. })
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.submit_status, SubmitStatus::Submitting)
    }

    /// Message for the error banner, if the last submission failed.
    pub fn banner(&self) -> Option<&str> {
        match &self.submit_status {
            SubmitStatus::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Records a new value for `field`.
    ///
    /// Any error recorded for the field is dropped whatever the new value is; it is checked
    /// again on the next step gate. Editing `dob` also recomputes `age`, which is cleared when
    /// the date is empty, malformed, or less than a year ago.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::RegistrationComplete` on the confirmation view and
    /// `IntakeError::UnknownOption` for a selection value outside its options.
    pub fn set_field(&mut self, field: FieldName, value: impl Into<String>) -> IntakeResult<()> {
        self.ensure_open()?;

        let value = value.into();
        self.draft.set(field, value)?;
        self.errors.remove(field);

        if field == FieldName::Dob {
            let age = parse_date_input(&self.draft.dob)
                .and_then(|dob| derived_age(dob, self.today()))
                .map(|age| age.to_string())
                .unwrap_or_default();
            self.draft.age = age;
            self.errors.remove(FieldName::Age);
        }

        Ok(())
    }

    /// Runs the current step's gate and advances when it passes.
    ///
    /// The error map is replaced by the gate's findings either way.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::NoNextStep` on the final step (submit instead) and
    /// `IntakeError::RegistrationComplete` on the confirmation view.
    pub fn next(&mut self) -> IntakeResult<StepOutcome> {
        self.ensure_open()?;

        let step = self.current_step;
        let next = step.next().ok_or(IntakeError::NoNextStep)?;

        self.errors = self.validator.check_step(&self.draft, step, self.today());
        if self.errors.is_empty() {
            self.current_step = next;
            tracing::info!(
                "intake advanced from step {} to step {}",
                step.number(),
                next.number()
            );
            return Ok(StepOutcome::Advanced(next));
        }

        let failing: Vec<FieldName> = self.errors.iter().map(|(field, _)| field).collect();
        tracing::debug!(
            "intake blocked on step {} with {} failing field(s)",
            step.number(),
            failing.len()
        );
        Ok(StepOutcome::Blocked { step, failing })
    }

    /// Moves back one step without validating. Errors are kept.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::SubmissionInProgress` while a submission is in flight and
    /// `IntakeError::RegistrationComplete` on the confirmation view.
    pub fn previous(&mut self) -> IntakeResult<StepOutcome> {
        self.ensure_open()?;
        if self.is_submitting() {
            return Err(IntakeError::SubmissionInProgress);
        }

        match self.current_step.previous() {
            Some(previous) => {
                tracing::debug!("intake moved back to step {}", previous.number());
                self.current_step = previous;
                Ok(StepOutcome::Moved(previous))
            }
            None => Ok(StepOutcome::Stayed(self.current_step)),
        }
    }

    /// Leaves the confirmation view: back to step 1 with an empty draft.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::NotCompleted` unless the registration was accepted.
    pub fn start_over(&mut self) -> IntakeResult<()> {
        if !self.is_complete() {
            return Err(IntakeError::NotCompleted);
        }

        self.current_step = Step::FIRST;
        self.draft = PatientDraft::default();
        self.errors.clear();
        self.submit_status = SubmitStatus::Idle;
        Ok(())
    }

    pub(crate) fn ensure_open(&self) -> IntakeResult<()> {
        if self.is_complete() {
            Err(IntakeError::RegistrationComplete)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::record::tests::complete_draft;

    pub(crate) fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    pub(crate) fn wizard() -> IntakeWizard {
        IntakeWizard::default().with_clock(Clock::Fixed(today()))
    }

    /// Types every non-derived field of the complete draft into `wizard`.
    pub(crate) fn fill(wizard: &mut IntakeWizard) {
        let draft = complete_draft();
        for field in FieldName::ALL {
            if field.is_derived() {
                continue;
            }
            wizard.set_field(field, draft.value(field)).unwrap();
        }
    }

    /// A wizard on step 5 holding the complete draft.
    pub(crate) fn wizard_on_final_step() -> IntakeWizard {
        let mut wizard = wizard();
        fill(&mut wizard);
        for _ in 0..4 {
            assert!(matches!(wizard.next().unwrap(), StepOutcome::Advanced(_)));
        }
        assert_eq!(wizard.current_step(), Step::Insurance);
        wizard
    }

    #[test]
    fn starts_on_step_one_with_empty_state() {
        let wizard = wizard();
        assert_eq!(wizard.current_step(), Step::Personal);
        assert_eq!(wizard.view(), WizardView::Step(Step::Personal));
        assert!(wizard.draft().is_empty());
        assert!(wizard.errors().is_empty());
        assert_eq!(wizard.submit_status(), &SubmitStatus::Idle);
    }

    #[test]
    fn next_blocks_and_reports_every_failing_field() {
        let mut wizard = wizard();
        wizard.set_field(FieldName::FullName, "Jo").unwrap();
        wizard.set_field(FieldName::NationalId, "123").unwrap();

        let outcome = wizard.next().unwrap();

        assert_eq!(
            outcome,
            StepOutcome::Blocked {
                step: Step::Personal,
                failing: vec![
                    FieldName::FullName,
                    FieldName::Gender,
                    FieldName::Dob,
                    FieldName::NationalId,
                ],
            }
        );
        assert_eq!(wizard.current_step(), Step::Personal);
        assert_eq!(
            wizard.errors().get(FieldName::FullName),
            Some("Full name must be at least 4 characters")
        );
        assert_eq!(wizard.errors().len(), 4);
    }

    #[test]
    fn next_advances_exactly_one_step_when_gate_passes() {
        let mut wizard = wizard();
        fill(&mut wizard);

        assert_eq!(wizard.next().unwrap(), StepOutcome::Advanced(Step::Contact));
        assert_eq!(wizard.current_step(), Step::Contact);
        assert_eq!(wizard.errors().for_step(Step::Personal).count(), 0);
    }

    #[test]
    fn medical_and_insurance_steps_always_pass() {
        let mut wizard = wizard();
        fill(&mut wizard);
        wizard.next().unwrap();
        wizard.next().unwrap();
        assert_eq!(wizard.current_step(), Step::Medical);

        wizard.set_field(FieldName::Allergies, "").unwrap();
        assert_eq!(
            wizard.next().unwrap(),
            StepOutcome::Advanced(Step::EmergencyContact)
        );
    }

    #[test]
    fn next_on_final_step_is_an_error() {
        let mut wizard = wizard_on_final_step();
        assert!(matches!(wizard.next(), Err(IntakeError::NoNextStep)));
        assert_eq!(wizard.current_step(), Step::Insurance);
    }

    #[test]
    fn gate_replaces_error_map_wholesale() {
        let mut wizard = wizard();
        wizard.next().unwrap();
        assert!(wizard.errors().contains(FieldName::FullName));

        wizard.set_field(FieldName::FullName, "John Doe").unwrap();
        wizard.set_field(FieldName::Gender, "male").unwrap();
        wizard.set_field(FieldName::Dob, "1990-01-01").unwrap();
        wizard.next().unwrap();

        assert_eq!(wizard.current_step(), Step::Contact);
        assert!(wizard.errors().is_empty());
    }

    #[test]
    fn previous_moves_back_without_validation_and_keeps_errors() {
        let mut wizard = wizard();
        fill(&mut wizard);
        wizard.next().unwrap();
        wizard.set_field(FieldName::Zip, "12345").unwrap();
        assert!(matches!(wizard.next().unwrap(), StepOutcome::Blocked { .. }));

        assert_eq!(wizard.previous().unwrap(), StepOutcome::Moved(Step::Personal));
        assert!(wizard.errors().contains(FieldName::Zip));
        assert!(wizard.visible_errors().is_empty());

        assert_eq!(wizard.previous().unwrap(), StepOutcome::Stayed(Step::Personal));
    }

    #[test]
    fn previous_from_every_step_yields_the_one_before() {
        let mut wizard = wizard_on_final_step();
        for expected in [
            Step::EmergencyContact,
            Step::Medical,
            Step::Contact,
            Step::Personal,
        ] {
            assert_eq!(wizard.previous().unwrap(), StepOutcome::Moved(expected));
        }
    }

    #[test]
    fn editing_a_field_clears_its_error_regardless_of_value() {
        let mut wizard = wizard();
        wizard.next().unwrap();
        assert!(wizard.errors().contains(FieldName::FullName));
        assert!(wizard.errors().contains(FieldName::Gender));

        wizard.set_field(FieldName::FullName, "J").unwrap();

        assert!(!wizard.errors().contains(FieldName::FullName));
        assert!(wizard.errors().contains(FieldName::Gender));
    }

    #[test]
    fn unknown_option_leaves_error_and_value_alone() {
        let mut wizard = wizard();
        wizard.next().unwrap();

        let err = wizard.set_field(FieldName::Gender, "robot").unwrap_err();
        assert!(matches!(err, IntakeError::UnknownOption { .. }));
        assert!(wizard.errors().contains(FieldName::Gender));
        assert_eq!(wizard.draft().gender, None);
    }

    #[test]
    fn dob_derives_age_in_whole_calendar_years() {
        let mut wizard = wizard();

        wizard.set_field(FieldName::Dob, "1990-10-19").unwrap();
        assert_eq!(wizard.draft().age, "36");

        wizard.set_field(FieldName::Dob, "1990-10-20").unwrap();
        assert_eq!(wizard.draft().age, "35");

        wizard.set_field(FieldName::Dob, "2026-03-01").unwrap();
        assert_eq!(wizard.draft().age, "");
    }

    #[test]
    fn clearing_or_garbling_dob_clears_age() {
        let mut wizard = wizard();
        wizard.set_field(FieldName::Dob, "1990-05-17").unwrap();
        assert_eq!(wizard.draft().age, "36");

        wizard.set_field(FieldName::Dob, "").unwrap();
        assert_eq!(wizard.draft().age, "");

        wizard.set_field(FieldName::Dob, "1990-05-17").unwrap();
        wizard.set_field(FieldName::Dob, "17/05/1990").unwrap();
        assert_eq!(wizard.draft().age, "");
    }

    #[test]
    fn editing_dob_clears_a_stale_age_error() {
        let mut wizard = wizard();
        wizard.set_field(FieldName::Age, "200").unwrap();
        wizard.next().unwrap();
        assert!(wizard.errors().contains(FieldName::Age));

        wizard.set_field(FieldName::Dob, "1990-05-17").unwrap();
        assert!(!wizard.errors().contains(FieldName::Age));
    }

    #[test]
    fn start_over_requires_a_completed_registration() {
        let mut wizard = wizard();
        assert!(matches!(wizard.start_over(), Err(IntakeError::NotCompleted)));
    }

    #[test]
    fn visible_errors_follow_current_step() {
        let mut wizard = wizard();
        wizard.next().unwrap();
        assert_eq!(wizard.visible_errors(), wizard.errors().clone());
    }
}
