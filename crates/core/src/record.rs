//! The patient record, in its two shapes.
//!
//! - [`PatientDraft`] is the raw form state the wizard mutates one keystroke at a time.
//!   Text inputs are plain strings where the empty string means "not entered".
//! - [`PatientRecord`] is the fully typed, validated record built from a draft at submission
//!   time. It is the only shape that reaches a [`crate::RecordStore`].
//!
//! On the wire the record is a flat camelCase object (`fullName`, `dob`, `emergencyPhone`, ...)
//! even though it is grouped into sub-structs in Rust.

use crate::age::parse_date_input;
use crate::error::{IntakeError, IntakeResult};
use crate::fields::{BloodGroup, FieldName, Gender};
use crate::validation::FieldValidator;
use chrono::NaiveDate;
use intake_types::{EmailAddress, NonEmptyText};
use serde::{Deserialize, Serialize};

// ============================================================================
// DRAFT
// ============================================================================

/// Form state of an in-progress registration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientDraft {
    pub full_name: String,
    pub gender: Option<Gender>,
    pub dob: String,
    pub age: String,
    pub national_id: String,

    pub phone: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,

    pub blood_group: Option<BloodGroup>,
    pub allergies: String,
    pub chronic_illnesses: String,
    pub current_medications: String,
    pub past_history: String,
    pub family_history: String,
    pub vaccination_history: String,

    pub emergency_name: String,
    pub emergency_relationship: String,
    pub emergency_phone: String,

    pub insurance_provider: String,
    pub policy_number: String,
    pub insurance_validity: String,
    pub insurance_contact: String,
}

impl PatientDraft {
    /// Current value of `field` as it would appear in the input.
    pub fn value(&self, field: FieldName) -> &str {
        match field {
            FieldName::Gender => self.gender.map_or("", Gender::as_str),
            FieldName::BloodGroup => self.blood_group.map_or("", BloodGroup::as_str),
            text => self.text(text).map_or("", String::as_str),
        }
    }

    /// Stores `value` in `field`.
    ///
    /// Selection fields accept only their listed options (case-insensitive); the empty string
    /// clears the selection. No other validation happens here.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::UnknownOption` for a selection value outside its enum. The draft
    /// is left unchanged in that case.
    pub fn set(&mut self, field: FieldName, value: impl Into<String>) -> IntakeResult<()> {
        let value = value.into();
        match field {
            FieldName::Gender => {
                self.gender = parse_selection(field, &value, Gender::from_input)?;
            }
            FieldName::BloodGroup => {
                self.blood_group = parse_selection(field, &value, BloodGroup::from_input)?;
            }
            text => {
                if let Some(slot) = self.text_mut(text) {
                    *slot = value;
                }
            }
        }
        Ok(())
    }

    /// True when nothing has been entered.
    pub fn is_empty(&self) -> bool {
        self == &PatientDraft::default()
    }

    fn text(&self, field: FieldName) -> Option<&String> {
        let slot = match field {
            FieldName::FullName => &self.full_name,
            FieldName::Dob => &self.dob,
            FieldName::Age => &self.age,
            FieldName::NationalId => &self.national_id,
            FieldName::Phone => &self.phone,
            FieldName::Email => &self.email,
            FieldName::Address => &self.address,
            FieldName::City => &self.city,
            FieldName::State => &self.state,
            FieldName::Zip => &self.zip,
            FieldName::Country => &self.country,
            FieldName::Allergies => &self.allergies,
            FieldName::ChronicIllnesses => &self.chronic_illnesses,
            FieldName::CurrentMedications => &self.current_medications,
            FieldName::PastHistory => &self.past_history,
            FieldName::FamilyHistory => &self.family_history,
            FieldName::VaccinationHistory => &self.vaccination_history,
            FieldName::EmergencyName => &self.emergency_name,
            FieldName::EmergencyRelationship => &self.emergency_relationship,
            FieldName::EmergencyPhone => &self.emergency_phone,
            FieldName::InsuranceProvider => &self.insurance_provider,
            FieldName::PolicyNumber => &self.policy_number,
            FieldName::InsuranceValidity => &self.insurance_validity,
            FieldName::InsuranceContact => &self.insurance_contact,
            FieldName::Gender | FieldName::BloodGroup => return None,
        };
        Some(slot)
    }

    fn text_mut(&mut self, field: FieldName) -> Option<&mut String> {
        let slot = match field {
            FieldName::FullName => &mut self.full_name,
            FieldName::Dob => &mut self.dob,
            FieldName::Age => &mut self.age,
            FieldName::NationalId => &mut self.national_id,
            FieldName::Phone => &mut self.phone,
            FieldName::Email => &mut self.email,
            FieldName::Address => &mut self.address,
            FieldName::City => &mut self.city,
            FieldName::State => &mut self.state,
            FieldName::Zip => &mut self.zip,
            FieldName::Country => &mut self.country,
            FieldName::Allergies => &mut self.allergies,
            FieldName::ChronicIllnesses => &mut self.chronic_illnesses,
            FieldName::CurrentMedications => &mut self.current_medications,
            FieldName::PastHistory => &mut self.past_history,
            FieldName::FamilyHistory => &mut self.family_history,
            FieldName::VaccinationHistory => &mut self.vaccination_history,
            FieldName::EmergencyName => &mut self.emergency_name,
            FieldName::EmergencyRelationship => &mut self.emergency_relationship,
            FieldName::EmergencyPhone => &mut self.emergency_phone,
            FieldName::InsuranceProvider => &mut self.insurance_provider,
            FieldName::PolicyNumber => &mut self.policy_number,
            FieldName::InsuranceValidity => &mut self.insurance_validity,
            FieldName::InsuranceContact => &mut self.insurance_contact,
            FieldName::Gender | FieldName::BloodGroup => return None,
        };
        Some(slot)
    }
}

fn parse_selection<T>(
    field: FieldName,
    value: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> IntakeResult<Option<T>> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    parse(value)
        .map(Some)
        .ok_or_else(|| IntakeError::UnknownOption {
            field,
            value: value.to_string(),
        })
}

// ============================================================================
// TYPED RECORD
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalDetails {
    pub full_name: NonEmptyText,
    pub gender: Gender,
    pub dob: NaiveDate,
    pub age: Option<u32>,
    pub national_id: Option<NonEmptyText>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
    pub phone: NonEmptyText,
    pub email: Option<EmailAddress>,
    pub address: NonEmptyText,
    pub city: NonEmptyText,
    pub state: NonEmptyText,
    pub zip: NonEmptyText,
    pub country: NonEmptyText,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalHistory {
    pub blood_group: Option<BloodGroup>,
    pub allergies: Option<NonEmptyText>,
    pub chronic_illnesses: Option<NonEmptyText>,
    pub current_medications: Option<NonEmptyText>,
    pub past_history: Option<NonEmptyText>,
    pub family_history: Option<NonEmptyText>,
    pub vaccination_history: Option<NonEmptyText>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub emergency_name: NonEmptyText,
    pub emergency_relationship: NonEmptyText,
    pub emergency_phone: NonEmptyText,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceDetails {
    pub insurance_provider: Option<NonEmptyText>,
    pub policy_number: Option<NonEmptyText>,
    pub insurance_validity: Option<NonEmptyText>,
    pub insurance_contact: Option<NonEmptyText>,
}

/// A validated patient registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(flatten)]
    pub personal: PersonalDetails,
    #[serde(flatten)]
    pub contact: ContactDetails,
    #[serde(flatten)]
    pub medical: MedicalHistory,
    #[serde(flatten)]
    pub emergency_contact: EmergencyContact,
    #[serde(flatten)]
    pub insurance: InsuranceDetails,
}

impl PatientRecord {
    /// Builds a typed record from a draft that passes every step gate.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::InvalidRecord` naming the first failing field, in form order.
    pub fn from_draft(
        draft: &PatientDraft,
        validator: &FieldValidator,
        today: NaiveDate,
    ) -> IntakeResult<Self> {
        if let Some((field, message)) = validator.check_all(draft, today).iter().next() {
            return Err(IntakeError::InvalidRecord {
                field,
                message: message.to_string(),
            });
        }

        let personal = PersonalDetails {
            full_name: required_text(draft, FieldName::FullName)?,
            gender: draft.gender.ok_or_else(|| invalid(FieldName::Gender))?,
            dob: parse_date_input(&draft.dob).ok_or_else(|| invalid(FieldName::Dob))?,
            age: optional_age(&draft.age)?,
            national_id: NonEmptyText::optional(&draft.national_id),
        };

        let email = match draft.email.trim() {
            "" => None,
            value => Some(EmailAddress::parse(value).map_err(|_| invalid(FieldName::Email))?),
        };

        let contact = ContactDetails {
            phone: required_text(draft, FieldName::Phone)?,
            email,
            address: required_text(draft, FieldName::Address)?,
            city: required_text(draft, FieldName::City)?,
            state: required_text(draft, FieldName::State)?,
            zip: required_text(draft, FieldName::Zip)?,
            country: required_text(draft, FieldName::Country)?,
        };

        let medical = MedicalHistory {
            blood_group: draft.blood_group,
            allergies: NonEmptyText::optional(&draft.allergies),
            chronic_illnesses: NonEmptyText::optional(&draft.chronic_illnesses),
            current_medications: NonEmptyText::optional(&draft.current_medications),
            past_history: NonEmptyText::optional(&draft.past_history),
            family_history: NonEmptyText::optional(&draft.family_history),
            vaccination_history: NonEmptyText::optional(&draft.vaccination_history),
        };

        let emergency_contact = EmergencyContact {
            emergency_name: required_text(draft, FieldName::EmergencyName)?,
            emergency_relationship: required_text(draft, FieldName::EmergencyRelationship)?,
            emergency_phone: required_text(draft, FieldName::EmergencyPhone)?,
        };

        let insurance = InsuranceDetails {
            insurance_provider: NonEmptyText::optional(&draft.insurance_provider),
            policy_number: NonEmptyText::optional(&draft.policy_number),
            insurance_validity: NonEmptyText::optional(&draft.insurance_validity),
            insurance_contact: NonEmptyText::optional(&draft.insurance_contact),
        };

        Ok(Self {
            personal,
            contact,
            medical,
            emergency_contact,
            insurance,
        })
    }
}

fn invalid(field: FieldName) -> IntakeError {
    IntakeError::InvalidRecord {
        field,
        message: format!("{} is missing or malformed", field.label()),
    }
}

fn required_text(draft: &PatientDraft, field: FieldName) -> IntakeResult<NonEmptyText> {
    NonEmptyText::new(draft.value(field)).map_err(|_| invalid(field))
}

fn optional_age(value: &str) -> IntakeResult<Option<u32>> {
    match value.trim() {
        "" => Ok(None),
        age => age.parse().map(Some).map_err(|_| invalid(FieldName::Age)),
    }
}
