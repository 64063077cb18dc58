//! Field validation rules.
//!
//! [`FieldValidator::validate`] is a pure function from `(field, value)` to an optional
//! user-facing message. It never touches wizard state; callers decide where the message goes.
//!
//! Lengths are counted in characters of the trimmed value, and "required" means the trimmed
//! value is non-empty. Blood group, medical history and insurance fields have no rule.

use crate::age::{completed_years, parse_date_input};
use crate::constants::{DEFAULT_PHONE_DESCRIPTION, DEFAULT_PHONE_PATTERN, MAX_AGE_YEARS};
use crate::error::{IntakeError, IntakeResult};
use crate::fields::{FieldName, Gender, Step};
use crate::record::PatientDraft;
use chrono::NaiveDate;
use intake_types::EmailAddress;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z\s'-]+$").expect("name pattern is valid"));
static NATIONAL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{12}$").expect("national id pattern is valid"));
static ZIP_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{6}$").expect("zip pattern is valid"));
static DEFAULT_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_PHONE_PATTERN).expect("default phone pattern is valid"));

// ============================================================================
// PHONE POLICY
// ============================================================================

/// Regional phone-number policy applied to both the contact and emergency phone.
///
/// The pattern is matched against the trimmed input; the description completes the sentence
/// "Phone number must be ...".
#[derive(Clone, Debug)]
pub struct PhonePolicy {
    pattern: Regex,
    description: String,
}

impl PhonePolicy {
    /// Builds a policy from a regular expression and its human-readable description.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::InvalidInput` if the pattern does not compile or the
    /// description is blank.
    pub fn new(pattern: &str, description: impl Into<String>) -> IntakeResult<Self> {
        let description = description.into().trim().to_string();
        if description.is_empty() {
            return Err(IntakeError::InvalidInput(
                "phone policy description cannot be empty".into(),
            ));
        }

        let pattern = Regex::new(pattern)
            .map_err(|e| IntakeError::InvalidInput(format!("invalid phone pattern: {e}")))?;

        Ok(Self {
            pattern,
            description,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn matches(&self, input: &str) -> bool {
        self.pattern.is_match(input.trim())
    }
}

impl Default for PhonePolicy {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PHONE.clone(),
            description: DEFAULT_PHONE_DESCRIPTION.to_string(),
        }
    }
}

// ============================================================================
// FIELD ERRORS
// ============================================================================

/// Field-name → message map of the currently failing fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<FieldName, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: FieldName, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn remove(&mut self, field: FieldName) -> Option<String> {
        self.0.remove(&field)
    }

    pub fn get(&self, field: FieldName) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: FieldName) -> bool {
        self.0.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldName, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }

    /// Errors for fields rendered on `step`; these are the ones shown to the user.
    pub fn for_step(&self, step: Step) -> impl Iterator<Item = (FieldName, &str)> {
        self.iter()
            .filter(move |(field, _)| step.fields().contains(field))
    }
}

impl Extend<(FieldName, String)> for FieldErrors {
    fn extend<T: IntoIterator<Item = (FieldName, String)>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl FromIterator<(FieldName, String)> for FieldErrors {
    fn from_iter<T: IntoIterator<Item = (FieldName, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// VALIDATOR
// ============================================================================

/// Per-field validation rules, parameterised by the regional phone policy.
#[derive(Clone, Debug, Default)]
pub struct FieldValidator {
    phone_policy: PhonePolicy,
}

impl FieldValidator {
    pub fn new(phone_policy: PhonePolicy) -> Self {
        Self { phone_policy }
    }

    pub fn phone_policy(&self) -> &PhonePolicy {
        &self.phone_policy
    }

    /// Validates one field value.
    ///
    /// `today` anchors the date-of-birth rule. Returns `None` when the value is acceptable.
    pub fn validate(&self, field: FieldName, value: &str, today: NaiveDate) -> Option<String> {
        let value = value.trim();
        match field {
            FieldName::FullName | FieldName::EmergencyName => {
                bounded_text(field, value, 4, 50, true)
            }
            FieldName::Gender => gender_rule(value),
            FieldName::Dob => dob_rule(value, today),
            FieldName::Age => age_rule(value),
            FieldName::NationalId => optional_pattern(value, &NATIONAL_ID, || {
                "National ID must be exactly 12 digits".to_string()
            }),
            FieldName::Phone | FieldName::EmergencyPhone => self.phone_rule(field, value),
            FieldName::Email => email_rule(value),
            FieldName::Address => bounded_text(field, value, 5, 200, false),
            FieldName::City | FieldName::State => bounded_text(field, value, 2, 30, true),
            FieldName::Zip => {
                if value.is_empty() {
                    Some(required(field))
                } else if ZIP_CODE.is_match(value) {
                    None
                } else {
                    Some("ZIP code must be exactly 6 digits".to_string())
                }
            }
            FieldName::Country => bounded_text(field, value, 2, 50, true),
            FieldName::EmergencyRelationship => bounded_text(field, value, 2, 30, false),
            FieldName::BloodGroup
            | FieldName::Allergies
            | FieldName::ChronicIllnesses
            | FieldName::CurrentMedications
            | FieldName::PastHistory
            | FieldName::FamilyHistory
            | FieldName::VaccinationHistory
            | FieldName::InsuranceProvider
            | FieldName::PolicyNumber
            | FieldName::InsuranceValidity
            | FieldName::InsuranceContact => None,
        }
    }

    /// Runs the gate for `step` against a draft, collecting every failure.
    pub fn check_step(&self, draft: &PatientDraft, step: Step, today: NaiveDate) -> FieldErrors {
        self.check_fields(draft, step.checked_fields().iter().copied(), today)
    }

    /// Runs the gates of all five steps.
    pub fn check_all(&self, draft: &PatientDraft, today: NaiveDate) -> FieldErrors {
        self.check_fields(
            draft,
            Step::ALL
                .into_iter()
                .flat_map(|step| step.checked_fields().iter().copied()),
            today,
        )
    }

    fn check_fields(
        &self,
        draft: &PatientDraft,
        fields: impl Iterator<Item = FieldName>,
        today: NaiveDate,
    ) -> FieldErrors {
        fields
            .filter_map(|field| {
                self.validate(field, draft.value(field), today)
                    .map(|message| (field, message))
            })
            .collect()
    }

    fn phone_rule(&self, field: FieldName, value: &str) -> Option<String> {
        if value.is_empty() {
            return Some(required(field));
        }
        if self.phone_policy.matches(value) {
            None
        } else {
            Some(format!(
                "{} must be {}",
                field.label(),
                self.phone_policy.description()
            ))
        }
    }
}

/// Validates a single value with the default phone policy against the local date.
pub fn validate_field(field: FieldName, value: &str) -> Option<String> {
    FieldValidator::default().validate(field, value, chrono::Local::now().date_naive())
}

fn required(field: FieldName) -> String {
    format!("{} is required", field.label())
}

fn bounded_text(
    field: FieldName,
    value: &str,
    min: usize,
    max: usize,
    name_chars_only: bool,
) -> Option<String> {
    if value.is_empty() {
        return Some(required(field));
    }

    let len = value.chars().count();
    if len < min {
        return Some(format!("{} must be at least {} characters", field.label(), min));
    }
    if len > max {
        return Some(format!("{} must be at most {} characters", field.label(), max));
    }
    if name_chars_only && !NAME_CHARS.is_match(value) {
        return Some(format!(
            "{} may only contain letters, spaces, hyphens and apostrophes",
            field.label()
        ));
    }

    None
}

fn optional_pattern(value: &str, pattern: &Regex, message: impl FnOnce() -> String) -> Option<String> {
    if value.is_empty() || pattern.is_match(value) {
        None
    } else {
        Some(message())
    }
}

fn gender_rule(value: &str) -> Option<String> {
    if value.is_empty() {
        Some(required(FieldName::Gender))
    } else if Gender::from_input(value).is_none() {
        Some("Please select a valid gender".to_string())
    } else {
        None
    }
}

fn dob_rule(value: &str, today: NaiveDate) -> Option<String> {
    if value.is_empty() {
        return Some(required(FieldName::Dob));
    }

    let Some(dob) = parse_date_input(value) else {
        return Some("Date of birth must be a valid date (YYYY-MM-DD)".to_string());
    };

    if dob > today {
        return Some("Date of birth cannot be in the future".to_string());
    }

    if i64::from(completed_years(dob, today)) > i64::from(MAX_AGE_YEARS) {
        return Some(format!(
            "Date of birth implies an age over {} years",
            MAX_AGE_YEARS
        ));
    }

    None
}

fn age_rule(value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }

    // Must parse as the record's `u32`; any signed form, including "-0", is out of range.
    match value.parse::<u32>() {
        Ok(age) if age <= MAX_AGE_YEARS => None,
        Ok(_) => Some(format!("Age must be between 0 and {}", MAX_AGE_YEARS)),
        Err(_) if value.parse::<i64>().is_ok() => {
            Some(format!("Age must be between 0 and {}", MAX_AGE_YEARS))
        }
        Err(_) => Some("Age must be a number".to_string()),
    }
}

fn email_rule(value: &str) -> Option<String> {
    if value.is_empty() || EmailAddress::parse(value).is_ok() {
        None
    } else {
        Some("Please enter a valid email address".to_string())
    }
}

/// Validates that a collection name is safe to embed in a filesystem path and a URL path.
///
/// Collection names become a directory under the file store's data directory and a path
/// segment of the HTTP store's endpoint:
/// - Rejects empty or whitespace-only strings
/// - Bounds the length
/// - Restricts characters to ASCII alphanumerics, `-` and `_`
///
/// # Errors
///
/// Returns `IntakeError::InvalidInput` if the name is not acceptable.
pub fn validate_collection_name(collection: &str) -> IntakeResult<()> {
    const MAX_COLLECTION_LEN: usize = 64;

    if collection.trim().is_empty() {
        return Err(IntakeError::InvalidInput(
            "collection name cannot be empty".into(),
        ));
    }

    if collection.len() > MAX_COLLECTION_LEN {
        return Err(IntakeError::InvalidInput(format!(
            "collection name exceeds maximum length of {} characters",
            MAX_COLLECTION_LEN
        )));
    }

    let ok = collection
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'-' | b'_'));

    if !ok {
        return Err(IntakeError::InvalidInput(
            "collection name contains invalid characters (only alphanumeric, '-', '_' allowed)"
                .into(),
        ));
    }

    Ok(())
}
