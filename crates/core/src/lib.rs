pub mod calendar;
pub mod expander;
pub mod form;
pub mod identity;
pub mod payment;
pub mod persister;
pub mod ports;
pub mod submission;
pub mod types;
pub mod validator;

pub use calendar::{Clock, HouseholdCalendar};
pub use expander::DueDateAnchor;
pub use ports::{ChoreStore, IdentityResolver, PaymentStore, StoreError};
pub use submission::{ChoreSubmission, SubmissionOutcome};
