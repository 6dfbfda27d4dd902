use std::collections::HashMap;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ChorePolicy;

pub const CHORE_NAME: &str = "choreName";
pub const CHORE_ASSIGNEE: &str = "choreAssignee";
pub const CHORE_FIRST_DUE_DATE: &str = "choreFirstDueDate";
pub const CHORE_NUMBER_OCCURRENCES: &str = "choreNumberOccurrences";
pub const CHORE_REPEAT_FREQUENCY: &str = "choreRepeatFrequency";
pub const CHORE_DETAILS: &str = "choreDetails";

/// Raw value submitted for a form field.
///
/// JSON strings always decode as `Text`; date fields parse them on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(i64),
    Text(String),
    Date(NaiveDate),
}

impl FieldValue {
    fn render(&self) -> String {
        match self {
            Self::Number(value) => value.to_string(),
            Self::Text(value) => value.trim().to_string(),
            Self::Date(value) => value.to_string(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

/// Errors raised while mapping raw form fields to typed values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("missing required field `{0}`")]
    Missing(&'static str),
    #[error("field `{field}` must only use letters")]
    NotWords { field: &'static str },
    #[error("field `{field}` must be a whole number (got {value})")]
    NotInteger { field: &'static str, value: String },
    #[error("field `{field}` must be a date in YYYY-MM-DD form (got {value})")]
    InvalidDate { field: &'static str, value: String },
    #[error("field `{field}` has unsupported value {value}")]
    UnknownChoice { field: &'static str, value: String },
    #[error("amount must be a positive value with at most two decimals (got {0})")]
    InvalidAmount(String),
    #[error("loaner and loanee must be different tenants")]
    SameParty,
}

impl FormError {
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Missing(field)
            | Self::NotWords { field }
            | Self::NotInteger { field, .. }
            | Self::InvalidDate { field, .. }
            | Self::UnknownChoice { field, .. } => Some(field),
            Self::InvalidAmount(_) | Self::SameParty => None,
        }
    }
}

/// Field map submitted by the chore form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChoreForm {
    fields: HashMap<String, FieldValue>,
}

impl ChoreForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Maps the raw fields onto a [`ChorePolicy`].
    ///
    /// Only field presence and shape are checked; range and date rules are
    /// left to the policy validator.
    pub fn into_policy(self) -> Result<ChorePolicy, FormError> {
        Ok(ChorePolicy {
            name: words(&self.fields, CHORE_NAME)?,
            assignee: words(&self.fields, CHORE_ASSIGNEE)?,
            first_due_date: date(&self.fields, CHORE_FIRST_DUE_DATE)?,
            repeat_frequency_days: integer(&self.fields, CHORE_REPEAT_FREQUENCY)?,
            occurrence_count: integer(&self.fields, CHORE_NUMBER_OCCURRENCES)?,
            details: optional_text(&self.fields, CHORE_DETAILS)?,
        })
    }
}

pub(crate) fn required<'a>(
    fields: &'a HashMap<String, FieldValue>,
    field: &'static str,
) -> Result<&'a FieldValue, FormError> {
    match fields.get(field) {
        None => Err(FormError::Missing(field)),
        Some(FieldValue::Text(text)) if text.trim().is_empty() => Err(FormError::Missing(field)),
        Some(value) => Ok(value),
    }
}

pub(crate) fn text(
    fields: &HashMap<String, FieldValue>,
    field: &'static str,
) -> Result<String, FormError> {
    required(fields, field).map(FieldValue::render)
}

fn optional_text(
    fields: &HashMap<String, FieldValue>,
    field: &'static str,
) -> Result<Option<String>, FormError> {
    match fields.get(field) {
        None => Ok(None),
        Some(FieldValue::Text(value)) if value.trim().is_empty() => Ok(None),
        Some(FieldValue::Text(value)) => Ok(Some(value.clone())),
        Some(other) => Ok(Some(other.render())),
    }
}

/// Letters and whitespace only, with at least one letter.
pub(crate) fn words(
    fields: &HashMap<String, FieldValue>,
    field: &'static str,
) -> Result<String, FormError> {
    let value = text(fields, field)?;
    if value.chars().all(|c| c.is_alphabetic() || c.is_whitespace()) {
        Ok(value)
    } else {
        Err(FormError::NotWords { field })
    }
}

fn integer(fields: &HashMap<String, FieldValue>, field: &'static str) -> Result<i64, FormError> {
    match required(fields, field)? {
        FieldValue::Number(value) => Ok(*value),
        FieldValue::Text(value) => value.trim().parse().map_err(|_| FormError::NotInteger {
            field,
            value: value.clone(),
        }),
        FieldValue::Date(value) => Err(FormError::NotInteger {
            field,
            value: value.to_string(),
        }),
    }
}

pub(crate) fn date(
    fields: &HashMap<String, FieldValue>,
    field: &'static str,
) -> Result<NaiveDate, FormError> {
    match required(fields, field)? {
        FieldValue::Date(value) => Ok(*value),
        FieldValue::Text(value) => parse_date(value).ok_or_else(|| FormError::InvalidDate {
            field,
            value: value.clone(),
        }),
        FieldValue::Number(value) => Err(FormError::InvalidDate {
            field,
            value: value.to_string(),
        }),
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp (date part kept as written).
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dishes_form() -> ChoreForm {
        ChoreForm::new()
            .with(CHORE_NAME, "Dishes")
            .with(CHORE_ASSIGNEE, "Alex")
            .with(CHORE_FIRST_DUE_DATE, "2024-01-10")
            .with(CHORE_REPEAT_FREQUENCY, "7")
            .with(CHORE_NUMBER_OCCURRENCES, 3i64)
    }

    #[test]
    fn maps_fields_to_policy() {
        let policy = dishes_form().into_policy().expect("form is well formed");
        assert_eq!(policy.name, "Dishes");
        assert_eq!(policy.assignee, "Alex");
        assert_eq!(policy.first_due_date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(policy.repeat_frequency_days, 7);
        assert_eq!(policy.occurrence_count, 3);
        assert_eq!(policy.details, None);
    }

    #[test]
    fn deserializes_mixed_json_values() {
        let form: ChoreForm = serde_json::from_str(
            r#"{
                "choreName": "Take out trash",
                "choreAssignee": "Sam",
                "choreFirstDueDate": "2024-03-01T09:00:00+09:00",
                "choreRepeatFrequency": 2,
                "choreNumberOccurrences": "4",
                "choreDetails": "Recycling on Fridays"
            }"#,
        )
        .expect("json decodes");

        assert_eq!(form.get(CHORE_REPEAT_FREQUENCY), Some(&FieldValue::Number(2)));
        let policy = form.into_policy().expect("form is well formed");
        assert_eq!(policy.first_due_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(policy.occurrence_count, 4);
        assert_eq!(policy.details.as_deref(), Some("Recycling on Fridays"));
    }

    #[test]
    fn json_strings_stay_text_until_a_date_is_needed() {
        let value: FieldValue = serde_json::from_str(r#""2024-01-10""#).unwrap();
        assert_eq!(value, FieldValue::Text("2024-01-10".into()));
    }

    #[test]
    fn date_like_details_are_kept_as_free_text() {
        let form: ChoreForm = serde_json::from_str(
            r#"{
                "choreName": "Dishes",
                "choreAssignee": "Alex",
                "choreFirstDueDate": "2024-01-10",
                "choreRepeatFrequency": "7",
                "choreNumberOccurrences": "3",
                "choreDetails": "2024-01-12"
            }"#,
        )
        .expect("json decodes");

        let policy = form.into_policy().expect("details are free text");
        assert_eq!(policy.details.as_deref(), Some("2024-01-12"));
        assert_eq!(policy.first_due_date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());

        let policy = dishes_form()
            .with(CHORE_DETAILS, NaiveDate::from_ymd_opt(2024, 1, 12).unwrap())
            .into_policy()
            .expect("typed values render as text");
        assert_eq!(policy.details.as_deref(), Some("2024-01-12"));
    }

    #[test]
    fn missing_and_blank_fields_are_reported() {
        let err = ChoreForm::new().into_policy().unwrap_err();
        assert_eq!(err, FormError::Missing(CHORE_NAME));

        let err = dishes_form().with(CHORE_ASSIGNEE, "   ").into_policy().unwrap_err();
        assert_eq!(err, FormError::Missing(CHORE_ASSIGNEE));
    }

    #[test]
    fn names_must_be_words() {
        let err = dishes_form().with(CHORE_NAME, "Dishes #2").into_policy().unwrap_err();
        assert_eq!(err, FormError::NotWords { field: CHORE_NAME });
        assert_eq!(err.field(), Some(CHORE_NAME));
    }

    #[test]
    fn numbers_and_dates_are_strict() {
        let err = dishes_form().with(CHORE_REPEAT_FREQUENCY, "weekly").into_policy().unwrap_err();
        assert!(matches!(err, FormError::NotInteger { field, .. } if field == CHORE_REPEAT_FREQUENCY));

        let err = dishes_form().with(CHORE_FIRST_DUE_DATE, "10/01/2024").into_policy().unwrap_err();
        assert!(matches!(err, FormError::InvalidDate { field, .. } if field == CHORE_FIRST_DUE_DATE));
    }

    #[test]
    fn out_of_range_numbers_pass_through_to_validation() {
        let policy = dishes_form()
            .with(CHORE_REPEAT_FREQUENCY, -3i64)
            .with(CHORE_NUMBER_OCCURRENCES, "0")
            .into_policy()
            .expect("shape is fine");
        assert_eq!(policy.repeat_frequency_days, -3);
        assert_eq!(policy.occurrence_count, 0);
    }
}
