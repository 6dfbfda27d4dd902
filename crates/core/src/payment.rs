use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::calendar::HouseholdCalendar;
use crate::form::{self, FieldValue, FormError};
use crate::identity::resolve_identity;
use crate::ports::{IdentityResolver, PaymentStore, StoreError};

pub const PAYMENT_AMOUNT: &str = "paymentAmount";
pub const PAYMENT_LOANER: &str = "loaner";
pub const PAYMENT_LOANEE: &str = "loanee";
pub const PAYMENT_DUE_DATE: &str = "dueDate";
pub const PAYMENT_DESCRIPTION: &str = "paymentDescription";
pub const PAYMENT_CATEGORY: &str = "paymentCategory";
pub const PAYMENT_RECURRING_PERIOD: &str = "recurringPeriod";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentCategory {
    #[default]
    Groceries,
    Meals,
    Rent,
    Misc,
}

impl PaymentCategory {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "groceries" => Some(Self::Groceries),
            "meals" => Some(Self::Meals),
            "rent" => Some(Self::Rent),
            "misc" => Some(Self::Misc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Groceries => "groceries",
            Self::Meals => "meals",
            Self::Rent => "rent",
            Self::Misc => "misc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurringPeriod {
    Once,
    Weekly,
    Biweekly,
    Monthly,
}

impl RecurringPeriod {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "once" => Some(Self::Once),
            "weekly" => Some(Self::Weekly),
            "biweekly" => Some(Self::Biweekly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
        }
    }
}

/// Validated payment ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDraft {
    pub amount_cents: i64,
    pub loaner: String,
    pub loanee: String,
    pub created_on: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_on: Option<NaiveDate>,
    pub due_date: NaiveDate,
    pub description: String,
    pub category: PaymentCategory,
    pub recurring_period: RecurringPeriod,
}

/// Field map submitted by the payment form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentForm {
    fields: HashMap<String, FieldValue>,
}

impl PaymentForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Maps the raw fields onto a draft created on `today`.
    pub fn into_draft(self, today: NaiveDate) -> Result<PaymentDraft, FormError> {
        let amount_cents = match form::required(&self.fields, PAYMENT_AMOUNT)? {
            FieldValue::Number(units) => units
                .checked_mul(100)
                .filter(|cents| *cents > 0)
                .ok_or_else(|| FormError::InvalidAmount(units.to_string()))?,
            FieldValue::Text(raw) => parse_amount_cents(raw)?,
            FieldValue::Date(value) => return Err(FormError::InvalidAmount(value.to_string())),
        };

        let loaner = form::text(&self.fields, PAYMENT_LOANER)?;
        let loanee = form::text(&self.fields, PAYMENT_LOANEE)?;
        if loaner == loanee {
            return Err(FormError::SameParty);
        }

        let category = match self.fields.get(PAYMENT_CATEGORY) {
            None => PaymentCategory::default(),
            Some(_) => {
                let raw = form::text(&self.fields, PAYMENT_CATEGORY)?;
                PaymentCategory::parse(&raw).ok_or(FormError::UnknownChoice {
                    field: PAYMENT_CATEGORY,
                    value: raw,
                })?
            }
        };

        let raw_period = form::text(&self.fields, PAYMENT_RECURRING_PERIOD)?;
        let recurring_period =
            RecurringPeriod::parse(&raw_period).ok_or(FormError::UnknownChoice {
                field: PAYMENT_RECURRING_PERIOD,
                value: raw_period,
            })?;

        Ok(PaymentDraft {
            amount_cents,
            loaner,
            loanee,
            created_on: today,
            paid_on: None,
            due_date: form::date(&self.fields, PAYMENT_DUE_DATE)?,
            description: form::text(&self.fields, PAYMENT_DESCRIPTION)?,
            category,
            recurring_period,
        })
    }
}

/// Parses `12`, `12.5` or `12.50` into cents. Zero and negative amounts are rejected.
pub fn parse_amount_cents(raw: &str) -> Result<i64, FormError> {
    let invalid = || FormError::InvalidAmount(raw.to_string());
    let trimmed = raw.trim();
    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));

    let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() || !digits_only(whole) || fraction.len() > 2 || !digits_only(fraction) {
        return Err(invalid());
    }

    let whole: i64 = whole.parse().map_err(|_| invalid())?;
    let fraction: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => fraction.parse().map_err(|_| invalid())?,
    };

    whole
        .checked_mul(100)
        .and_then(|cents| cents.checked_add(fraction))
        .filter(|cents| *cents > 0)
        .ok_or_else(invalid)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error(transparent)]
    Form(#[from] FormError),
    #[error("payment cannot be due in the past ({0})")]
    DueInPast(NaiveDate),
    #[error("{0} is not a tenant of this apartment")]
    NotATenant(String),
    #[error("failed to resolve apartment: {0}")]
    Identity(StoreError),
    #[error("failed to store payment: {0}")]
    Store(StoreError),
}

/// Creates single payments; no recurrence expansion happens here.
#[derive(Debug, Clone)]
pub struct PaymentService {
    calendar: HouseholdCalendar,
}

impl PaymentService {
    pub fn new(calendar: HouseholdCalendar) -> Self {
        Self { calendar }
    }

    pub async fn create_payment<S>(
        &self,
        store: &S,
        form: PaymentForm,
    ) -> Result<PaymentDraft, PaymentError>
    where
        S: IdentityResolver + PaymentStore + ?Sized,
    {
        let today = self.calendar.today();
        let draft = form.into_draft(today)?;
        if draft.due_date < today {
            warn!(stage = "validate", due_date = %draft.due_date, "payment due in the past");
            return Err(PaymentError::DueInPast(draft.due_date));
        }

        let identity = resolve_identity(store)
            .await
            .map_err(PaymentError::Identity)?;
        let tenants = &identity.apartment.tenant_ids;
        for party in [&draft.loaner, &draft.loanee] {
            if !tenants.iter().any(|id| id.as_str() == party) {
                return Err(PaymentError::NotATenant(party.clone()));
            }
        }

        store
            .store_payment(identity.apartment.id(), &draft)
            .await
            .map_err(|err| {
                warn!(stage = "persist", error = %err, "payment write rejected");
                PaymentError::Store(err)
            })?;

        info!(
            stage = "submit",
            apartment = %identity.apartment.id(),
            category = draft.category.as_str(),
            amount_cents = draft.amount_cents,
            "payment recorded"
        );
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::types::{Apartment, ApartmentId, User, UserId};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn groceries_form() -> PaymentForm {
        PaymentForm::new()
            .with(PAYMENT_AMOUNT, "42.5")
            .with(PAYMENT_LOANER, "user-1")
            .with(PAYMENT_LOANEE, "user-2")
            .with(PAYMENT_DUE_DATE, "2024-01-20")
            .with(PAYMENT_DESCRIPTION, "Weekly shop")
            .with(PAYMENT_RECURRING_PERIOD, "weekly")
    }

    #[derive(Default)]
    struct FakeHousehold {
        payments: Mutex<Vec<(ApartmentId, PaymentDraft)>>,
        reject: bool,
    }

    #[async_trait]
    impl IdentityResolver for FakeHousehold {
        async fn resolve_apartment(&self) -> Result<Apartment, StoreError> {
            Ok(Apartment {
                id: ApartmentId::new("apt-1"),
                name: "Maple St".into(),
                tenant_ids: vec![UserId::new("user-1"), UserId::new("user-2")],
            })
        }

        async fn resolve_user(&self) -> Result<User, StoreError> {
            Ok(User {
                id: UserId::new("user-1"),
                display_name: "Alex".into(),
            })
        }
    }

    #[async_trait]
    impl PaymentStore for FakeHousehold {
        async fn store_payment(
            &self,
            apartment_id: &ApartmentId,
            payment: &PaymentDraft,
        ) -> Result<(), StoreError> {
            if self.reject {
                return Err(StoreError::Unavailable("offline".into()));
            }
            self.payments
                .lock()
                .unwrap()
                .push((apartment_id.clone(), payment.clone()));
            Ok(())
        }
    }

    #[test]
    fn parses_amounts_into_cents() {
        assert_eq!(parse_amount_cents("12"), Ok(1200));
        assert_eq!(parse_amount_cents("12.5"), Ok(1250));
        assert_eq!(parse_amount_cents("12.05"), Ok(1205));
        assert_eq!(parse_amount_cents(" 0.99 "), Ok(99));
        assert_eq!(parse_amount_cents("7."), Ok(700));
        for bad in ["", "abc", "-3", "1.234", "0", "0.00", ".5", "1e3", "1,50"] {
            assert!(parse_amount_cents(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn maps_form_with_default_category() {
        let draft = groceries_form().into_draft(date(2024, 1, 10)).unwrap();
        assert_eq!(draft.amount_cents, 4250);
        assert_eq!(draft.category, PaymentCategory::Groceries);
        assert_eq!(draft.recurring_period, RecurringPeriod::Weekly);
        assert_eq!(draft.created_on, date(2024, 1, 10));
        assert_eq!(draft.paid_on, None);
    }

    #[test]
    fn date_like_description_is_kept_verbatim() {
        let form: PaymentForm = serde_json::from_value(serde_json::json!({
            "paymentAmount": "12",
            "loaner": "user-1",
            "loanee": "user-2",
            "dueDate": "2024-01-20",
            "paymentDescription": "2024-01-12",
            "recurringPeriod": "once",
        }))
        .expect("json decodes");

        let draft = form.into_draft(date(2024, 1, 10)).unwrap();
        assert_eq!(draft.description, "2024-01-12");
        assert_eq!(draft.due_date, date(2024, 1, 20));
    }

    #[test]
    fn rejects_unknown_choices_and_same_party() {
        let err = groceries_form()
            .with(PAYMENT_CATEGORY, "gadgets")
            .into_draft(date(2024, 1, 10))
            .unwrap_err();
        assert!(matches!(err, FormError::UnknownChoice { field, .. } if field == PAYMENT_CATEGORY));

        let err = groceries_form()
            .with(PAYMENT_LOANEE, "user-1")
            .into_draft(date(2024, 1, 10))
            .unwrap_err();
        assert_eq!(err, FormError::SameParty);
    }

    #[tokio::test]
    async fn stores_valid_payment_for_resolved_apartment() {
        let store = FakeHousehold::default();
        let service = PaymentService::new(HouseholdCalendar::fixed(date(2024, 1, 10)));

        let draft = service
            .create_payment(&store, groceries_form().with(PAYMENT_CATEGORY, "meals"))
            .await
            .expect("payment stored");

        assert_eq!(draft.category, PaymentCategory::Meals);
        let payments = store.payments.lock().unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].0.as_str(), "apt-1");
    }

    #[tokio::test]
    async fn rejects_past_due_dates_and_strangers() {
        let store = FakeHousehold::default();
        let service = PaymentService::new(HouseholdCalendar::fixed(date(2024, 1, 21)));
        let err = service.create_payment(&store, groceries_form()).await.unwrap_err();
        assert_eq!(err, PaymentError::DueInPast(date(2024, 1, 20)));

        let service = PaymentService::new(HouseholdCalendar::fixed(date(2024, 1, 10)));
        let err = service
            .create_payment(&store, groceries_form().with(PAYMENT_LOANEE, "user-9"))
            .await
            .unwrap_err();
        assert_eq!(err, PaymentError::NotATenant("user-9".into()));
        assert!(store.payments.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn surfaces_store_rejection() {
        let store = FakeHousehold {
            reject: true,
            ..Default::default()
        };
        let service = PaymentService::new(HouseholdCalendar::fixed(date(2024, 1, 10)));
        let err = service.create_payment(&store, groceries_form()).await.unwrap_err();
        assert!(matches!(err, PaymentError::Store(StoreError::Unavailable(_))));
    }
}
