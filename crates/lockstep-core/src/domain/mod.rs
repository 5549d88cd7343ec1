//! Domain model (document, ids, locks, task states, outcomes, ...).

pub mod document;
pub mod errors;
pub mod events;
pub mod ids;
pub mod lock;
pub mod outcome;
pub mod retry;
pub mod state;

pub use self::document::{Document, MARKER};
pub use self::errors::{LockError, StoreError};
pub use self::events::UpdateEvent;
pub use self::ids::{EntryId, LockToken};
pub use self::lock::Lock;
pub use self::outcome::{BatchResult, UpdateFailure, UpdateOutcome};
pub use self::retry::RetryPolicy;
pub use self::state::UpdateState;
