//! Traits the core calls into for identity lookups and persistence.
//!
//! The concrete document store lives in `hearth-storage`; tests substitute
//! in-memory fakes.

use async_trait::async_trait;
use thiserror::Error;

use crate::payment::PaymentDraft;
use crate::types::{Apartment, ApartmentId, ChoreInstance, User};

/// Opaque failure reported by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("store rejected the request: {0}")]
    Rejected(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Resolves the acting user and the apartment they belong to.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve_apartment(&self) -> Result<Apartment, StoreError>;

    async fn resolve_user(&self) -> Result<User, StoreError>;
}

/// Stores one chore instance, resolving once the write is durable.
#[async_trait]
pub trait ChoreStore: Send + Sync {
    async fn store_chore(&self, chore: &ChoreInstance) -> Result<(), StoreError>;
}

/// Stores one payment record for an apartment.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn store_payment(
        &self,
        apartment_id: &ApartmentId,
        payment: &PaymentDraft,
    ) -> Result<(), StoreError>;
}
