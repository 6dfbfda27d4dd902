use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ports::{ChoreStore, StoreError};
use crate::types::ChoreInstance;

/// Progress of a single `persist_all` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "index", rename_all = "snake_case")]
pub enum PersistState {
    Idle,
    Persisting(usize),
    Done,
    Failed(usize),
}

/// Result of a `persist_all` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistReport {
    pub total: usize,
    pub stored: usize,
    pub state: PersistState,
    pub error: Option<StoreError>,
}

impl PersistReport {
    /// True when nothing is left to write: every instance was stored, or
    /// there was nothing to store.
    pub fn is_complete(&self) -> bool {
        matches!(self.state, PersistState::Done | PersistState::Idle)
    }

    /// Index of the instance whose write was rejected, if any.
    pub fn failed_index(&self) -> Option<usize> {
        match self.state {
            PersistState::Failed(index) => Some(index),
            _ => None,
        }
    }
}

/// Writes chore instances one at a time, in order.
///
/// Instance `i + 1` is only sent after the store acknowledged instance `i`.
/// The first rejected write stops the run; earlier writes stay stored and
/// later instances are never attempted. There is no retry and no timeout.
pub struct SequentialPersister<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> SequentialPersister<'a, S>
where
    S: ChoreStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn persist_all(&self, instances: &[ChoreInstance]) -> PersistReport {
        let total = instances.len();
        let mut stored = 0;
        if instances.is_empty() {
            debug!(stage = "persist", state = ?PersistState::Idle, "nothing to persist");
            return PersistReport {
                total,
                stored,
                state: PersistState::Idle,
                error: None,
            };
        }

        for (index, chore) in instances.iter().enumerate() {
            debug!(stage = "persist", state = ?PersistState::Persisting(index), total);
            if let Err(err) = self.store.store_chore(chore).await {
                warn!(
                    stage = "persist",
                    index,
                    stored,
                    total,
                    chore = %chore.name,
                    due_date = %chore.due_date,
                    error = %err,
                    "chore write rejected; remaining occurrences skipped"
                );
                return PersistReport {
                    total,
                    stored,
                    state: PersistState::Failed(index),
                    error: Some(err),
                };
            }
            stored += 1;
        }

        info!(stage = "persist", stored, "chore occurrences stored");
        PersistReport {
            total,
            stored,
            state: PersistState::Done,
            error: None,
        }
    }
}
