use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use hearth_core::payment::PaymentDraft;
use hearth_core::types::{Apartment, ApartmentId, ChoreInstance, User};
use hearth_core::{ChoreStore, Clock, IdentityResolver, PaymentStore, StoreError};

use crate::{ApartmentError, ChoreError, Database, PaymentRecordError, UserError};

/// Document-store client scoped to one signed-in user.
#[derive(Clone)]
pub struct HouseholdSession {
    database: Database,
    user_id: String,
    clock: Clock,
}

impl HouseholdSession {
    pub fn new(database: Database, user_id: impl Into<String>) -> Self {
        Self::with_clock(database, user_id, Arc::new(Utc::now))
    }

    pub fn with_clock(database: Database, user_id: impl Into<String>, clock: Clock) -> Self {
        Self {
            database,
            user_id: user_id.into(),
            clock,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

#[async_trait]
impl IdentityResolver for HouseholdSession {
    async fn resolve_apartment(&self) -> Result<Apartment, StoreError> {
        self.database
            .apartments()
            .fetch_for_user(&self.user_id)
            .await
            .map_err(StoreError::from)?
            .ok_or_else(|| StoreError::NotFound(format!("apartment for user {}", self.user_id)))
    }

    async fn resolve_user(&self) -> Result<User, StoreError> {
        self.database
            .users()
            .fetch(&self.user_id)
            .await
            .map_err(StoreError::from)?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", self.user_id)))
    }
}

#[async_trait]
impl ChoreStore for HouseholdSession {
    async fn store_chore(&self, chore: &ChoreInstance) -> Result<(), StoreError> {
        let id = self.database.chores().insert(chore, self.now()).await?;
        debug!(stage = "persist", chore_id = %id, due_date = %chore.due_date, "chore stored");
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for HouseholdSession {
    async fn store_payment(
        &self,
        apartment_id: &ApartmentId,
        payment: &PaymentDraft,
    ) -> Result<(), StoreError> {
        self.database
            .payments()
            .insert(apartment_id.as_str(), payment, self.now())
            .await?;
        Ok(())
    }
}

impl From<UserError> for StoreError {
    fn from(err: UserError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<ApartmentError> for StoreError {
    fn from(err: ApartmentError) -> Self {
        match err {
            ApartmentError::Database(_) => StoreError::Unavailable(err.to_string()),
            other => StoreError::Rejected(other.to_string()),
        }
    }
}

impl From<ChoreError> for StoreError {
    fn from(err: ChoreError) -> Self {
        match err {
            ChoreError::NotFound => StoreError::NotFound(err.to_string()),
            ChoreError::UnknownReference => StoreError::Rejected(err.to_string()),
            ChoreError::Database(_) => StoreError::Unavailable(err.to_string()),
        }
    }
}

impl From<PaymentRecordError> for StoreError {
    fn from(err: PaymentRecordError) -> Self {
        match err {
            PaymentRecordError::Corrupt(_) => StoreError::Rejected(err.to_string()),
            PaymentRecordError::Database(_) => StoreError::Unavailable(err.to_string()),
        }
    }
}
