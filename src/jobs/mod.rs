//! Job records and the store that owns them.
//!
//! - [`JobRecord`]: one simulated attack and its lifecycle state
//! - [`RecordStore`]: append-only, lock-guarded id -> record map
//!
//! The store is a plain merge-and-store primitive. Lifecycle rules
//! ([`JobStatus::can_transition_to`]) are enforced by the orchestrator.

pub mod record;
pub mod store;

pub use record::{FailureKind, JobKind, JobRecord, JobStatus, NewJob, Outcome, RecordPatch};
pub use store::{JobFilter, RecordStore};
