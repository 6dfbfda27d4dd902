use std::{fmt, ops::RangeInclusive};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Accepted values for `repeat_frequency_days`.
pub const REPEAT_FREQUENCY_DAYS: RangeInclusive<i64> = 1..=365;
/// Accepted values for `occurrence_count`.
pub const OCCURRENCE_COUNT: RangeInclusive<i64> = 1..=100;

/// Recurrence description submitted for a chore.
///
/// Built from form input and never persisted itself; the expander turns it
/// into concrete [`ChoreInstance`] records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChorePolicy {
    pub name: String,
    pub assignee: String,
    pub first_due_date: NaiveDate,
    pub repeat_frequency_days: i64,
    pub occurrence_count: i64,
    #[serde(default)]
    pub details: Option<String>,
}

/// One dated occurrence of a chore, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoreInstance {
    pub owner_id: ApartmentId,
    pub user_id: UserId,
    pub name: String,
    pub assignee: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub due_date: NaiveDate,
    pub completed: bool,
}

/// Opaque apartment identifier handed out by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApartmentId(String);

/// Opaque user identifier handed out by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

macro_rules! opaque_id {
    ($ty:ident) => {
        impl $ty {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

opaque_id!(ApartmentId);
opaque_id!(UserId);

/// Apartment record returned by the identity resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Apartment {
    pub id: ApartmentId,
    pub name: String,
    #[serde(default)]
    pub tenant_ids: Vec<UserId>,
}

impl Apartment {
    pub fn id(&self) -> &ApartmentId {
        &self.id
    }
}

/// Signed-in household member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
}

impl User {
    pub fn id(&self) -> &UserId {
        &self.id
    }
}

/// Chore row as stored, including the identifier assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChore {
    pub id: String,
    #[serde(flatten)]
    pub chore: ChoreInstance,
}
