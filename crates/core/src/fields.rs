//! Field names, wizard steps and the selection enums of the intake form.
//!
//! Field names use the camelCase spelling of the stored document (`fullName`,
//! `emergencyPhone`, ...), both on the wire and when parsed from user input.

use crate::error::{IntakeError, IntakeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// FIELD NAMES
// ============================================================================

/// Every input of the intake form.
///
/// The declaration order is the order fields appear in the form; it also orders
/// [`crate::FieldErrors`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldName {
    // Personal
    FullName,
    Gender,
    Dob,
    Age,
    NationalId,
    // Contact
    Phone,
    Email,
    Address,
    City,
    State,
    Zip,
    Country,
    // Medical
    BloodGroup,
    Allergies,
    ChronicIllnesses,
    CurrentMedications,
    PastHistory,
    FamilyHistory,
    VaccinationHistory,
    // Emergency contact
    EmergencyName,
    EmergencyRelationship,
    EmergencyPhone,
    // Insurance
    InsuranceProvider,
    PolicyNumber,
    InsuranceValidity,
    InsuranceContact,
}

impl FieldName {
    /// All fields in form order.
    pub const ALL: [FieldName; 26] = [
        FieldName::FullName,
        FieldName::Gender,
        FieldName::Dob,
        FieldName::Age,
        FieldName::NationalId,
        FieldName::Phone,
        FieldName::Email,
        FieldName::Address,
        FieldName::City,
        FieldName::State,
        FieldName::Zip,
        FieldName::Country,
        FieldName::BloodGroup,
        FieldName::Allergies,
        FieldName::ChronicIllnesses,
        FieldName::CurrentMedications,
        FieldName::PastHistory,
        FieldName::FamilyHistory,
        FieldName::VaccinationHistory,
        FieldName::EmergencyName,
        FieldName::EmergencyRelationship,
        FieldName::EmergencyPhone,
        FieldName::InsuranceProvider,
        FieldName::PolicyNumber,
        FieldName::InsuranceValidity,
        FieldName::InsuranceContact,
    ];

    /// Wire name of the field.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldName::FullName => "fullName",
            FieldName::Gender => "gender",
            FieldName::Dob => "dob",
            FieldName::Age => "age",
            FieldName::NationalId => "nationalId",
            FieldName::Phone => "phone",
            FieldName::Email => "email",
            FieldName::Address => "address",
            FieldName::City => "city",
            FieldName::State => "state",
            FieldName::Zip => "zip",
            FieldName::Country => "country",
            FieldName::BloodGroup => "bloodGroup",
            FieldName::Allergies => "allergies",
            FieldName::ChronicIllnesses => "chronicIllnesses",
            FieldName::CurrentMedications => "currentMedications",
            FieldName::PastHistory => "pastHistory",
            FieldName::FamilyHistory => "familyHistory",
            FieldName::VaccinationHistory => "vaccinationHistory",
            FieldName::EmergencyName => "emergencyName",
            FieldName::EmergencyRelationship => "emergencyRelationship",
            FieldName::EmergencyPhone => "emergencyPhone",
            FieldName::InsuranceProvider => "insuranceProvider",
            FieldName::PolicyNumber => "policyNumber",
            FieldName::InsuranceValidity => "insuranceValidity",
            FieldName::InsuranceContact => "insuranceContact",
        }
    }

    /// Label shown next to the input and used as the subject of error messages.
    pub fn label(self) -> &'static str {
        match self {
            FieldName::FullName => "Full name",
            FieldName::Gender => "Gender",
            FieldName::Dob => "Date of birth",
            FieldName::Age => "Age",
            FieldName::NationalId => "National ID",
            FieldName::Phone => "Phone number",
            FieldName::Email => "Email",
            FieldName::Address => "Address",
            FieldName::City => "City",
            FieldName::State => "State",
            FieldName::Zip => "ZIP code",
            FieldName::Country => "Country",
            FieldName::BloodGroup => "Blood group",
            FieldName::Allergies => "Allergies",
            FieldName::ChronicIllnesses => "Chronic illnesses",
            FieldName::CurrentMedications => "Current medications",
            FieldName::PastHistory => "Past medical history",
            FieldName::FamilyHistory => "Family history",
            FieldName::VaccinationHistory => "Vaccination history",
            FieldName::EmergencyName => "Emergency contact name",
            FieldName::EmergencyRelationship => "Relationship",
            FieldName::EmergencyPhone => "Emergency contact phone",
            FieldName::InsuranceProvider => "Insurance provider",
            FieldName::PolicyNumber => "Policy number",
            FieldName::InsuranceValidity => "Insurance valid until",
            FieldName::InsuranceContact => "Insurance contact",
        }
    }

    /// The step on which this field is rendered.
    pub fn step(self) -> Step {
        Step::ALL
            .into_iter()
            .find(|step| step.fields().contains(&self))
            .unwrap_or(Step::Personal)
    }

    /// True for the derived `age` field, which is rendered read-only.
    pub fn is_derived(self) -> bool {
        matches!(self, FieldName::Age)
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldName {
    type Err = IntakeError;

    fn from_str(s: &str) -> IntakeResult<Self> {
        let trimmed = s.trim();
        FieldName::ALL
            .into_iter()
            .find(|field| field.as_str() == trimmed)
            .ok_or_else(|| IntakeError::UnknownField(trimmed.to_owned()))
    }
}

// ============================================================================
// STEPS
// ============================================================================

/// The five linear steps of the wizard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    Personal,
    Contact,
    Medical,
    EmergencyContact,
    Insurance,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::Personal,
        Step::Contact,
        Step::Medical,
        Step::EmergencyContact,
        Step::Insurance,
    ];

    pub const FIRST: Step = Step::Personal;
    pub const LAST: Step = Step::Insurance;

    /// 1-based step number.
    pub fn number(self) -> u8 {
        match self {
            Step::Personal => 1,
            Step::Contact => 2,
            Step::Medical => 3,
            Step::EmergencyContact => 4,
            Step::Insurance => 5,
        }
    }

    pub fn from_number(number: u8) -> Option<Step> {
        Step::ALL.into_iter().find(|step| step.number() == number)
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::Personal => "Personal information",
            Step::Contact => "Contact details",
            Step::Medical => "Medical history",
            Step::EmergencyContact => "Emergency contact",
            Step::Insurance => "Insurance",
        }
    }

    pub fn next(self) -> Option<Step> {
        Step::from_number(self.number() + 1)
    }

    pub fn previous(self) -> Option<Step> {
        self.number().checked_sub(1).and_then(Step::from_number)
    }

    /// Fields rendered on this step, in form order.
    pub fn fields(self) -> &'static [FieldName] {
        match self {
            Step::Personal => &[
                FieldName::FullName,
                FieldName::Gender,
                FieldName::Dob,
                FieldName::Age,
                FieldName::NationalId,
            ],
            Step::Contact => &[
                FieldName::Phone,
                FieldName::Email,
                FieldName::Address,
                FieldName::City,
                FieldName::State,
                FieldName::Zip,
                FieldName::Country,
            ],
            Step::Medical => &[
                FieldName::BloodGroup,
                FieldName::Allergies,
                FieldName::ChronicIllnesses,
                FieldName::CurrentMedications,
                FieldName::PastHistory,
                FieldName::FamilyHistory,
                FieldName::VaccinationHistory,
            ],
            Step::EmergencyContact => &[
                FieldName::EmergencyName,
                FieldName::EmergencyRelationship,
                FieldName::EmergencyPhone,
            ],
            Step::Insurance => &[
                FieldName::InsuranceProvider,
                FieldName::PolicyNumber,
                FieldName::InsuranceValidity,
                FieldName::InsuranceContact,
            ],
        }
    }

    /// Fields checked by this step's gate.
    ///
    /// Medical and insurance steps have no checked fields and always pass.
    pub fn checked_fields(self) -> &'static [FieldName] {
        match self {
            Step::Personal => &[
                FieldName::FullName,
                FieldName::Gender,
                FieldName::Dob,
                FieldName::Age,
                FieldName::NationalId,
            ],
            Step::Contact => &[
                FieldName::Phone,
                FieldName::Email,
                FieldName::Address,
                FieldName::City,
                FieldName::State,
                FieldName::Zip,
                FieldName::Country,
            ],
            Step::Medical => &[],
            Step::EmergencyContact => &[
                FieldName::EmergencyName,
                FieldName::EmergencyRelationship,
                FieldName::EmergencyPhone,
            ],
            Step::Insurance => &[],
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step {} of 5: {}", self.number(), self.title())
    }
}

// ============================================================================
// SELECTION ENUMS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Other];

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }

    /// Case-insensitive parse of a selection value.
    pub fn from_input(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        Gender::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(trimmed))
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodGroup {
    pub const ALL: [BloodGroup; 8] = [
        BloodGroup::APositive,
        BloodGroup::ANegative,
        BloodGroup::BPositive,
        BloodGroup::BNegative,
        BloodGroup::AbPositive,
        BloodGroup::AbNegative,
        BloodGroup::OPositive,
        BloodGroup::ONegative,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BloodGroup::APositive => "A+",
            BloodGroup::ANegative => "A-",
            BloodGroup::BPositive => "B+",
            BloodGroup::BNegative => "B-",
            BloodGroup::AbPositive => "AB+",
            BloodGroup::AbNegative => "AB-",
            BloodGroup::OPositive => "O+",
            BloodGroup::ONegative => "O-",
        }
    }

    /// Case-insensitive parse of a selection value (`"ab+"` → `AB+`).
    pub fn from_input(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        BloodGroup::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(trimmed))
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
