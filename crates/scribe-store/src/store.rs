//! The store contract: append/amend/read over a plan's event log,
//! independent of backing medium.

use async_trait::async_trait;
use thiserror::Error;

use scribe_core::error::{FormatError, SequenceError};
use scribe_core::event::{NewPlanEvent, PlanEvent};
use scribe_core::model::ThreadId;

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed body or broken chunk envelope in the log.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The log violates the lifecycle transition table.
    #[error(transparent)]
    Sequence(#[from] SequenceError),

    /// The backing medium call failed. Retry policy is the caller's;
    /// the store never retries on its own.
    #[error("transport failure: {0}")]
    Transport(#[source] anyhow::Error),

    #[error("no event at position {seq} in thread {thread}")]
    EventNotFound { thread: ThreadId, seq: u64 },
}

/// An ordered read of a thread's event log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    /// Every logical event in thread order, unknown types included (as
    /// [`scribe_core::EventKind::Unknown`]) so positions stay stable.
    pub events: Vec<PlanEvent>,
    /// How many of `events` carry a type this version does not recognize.
    pub unknown: usize,
}

/// Append/read operations over one plan's event log.
///
/// Implementations are safe to share across threads and to call
/// concurrently for different thread ids. For the *same* thread id the
/// backing medium's own post ordering is the only serialization; this
/// trait adds no locking.
#[async_trait]
pub trait PlanEventStore: Send + Sync {
    /// Append an event, assigning it the next position in the log.
    async fn append(&self, thread: &ThreadId, event: NewPlanEvent)
    -> Result<PlanEvent, StoreError>;

    /// Replace the rendered content of an existing event in place.
    ///
    /// The event keeps its position and timestamp; only its body changes.
    async fn amend(
        &self,
        thread: &ThreadId,
        seq: u64,
        event: NewPlanEvent,
    ) -> Result<PlanEvent, StoreError>;

    /// Read the full log in order.
    ///
    /// Unrecognized event types never fail the read: they come back as
    /// [`scribe_core::EventKind::Unknown`] with a count in
    /// [`EventLog::unknown`]. Malformed bodies and incomplete chunk sets
    /// do fail it, as [`StoreError::Format`].
    async fn read_all(&self, thread: &ThreadId) -> Result<EventLog, StoreError>;
}

// Compile-time assertion: the store contract must stay object-safe so
// decorators can wrap `Box<dyn PlanEventStore>`.
const _: () = {
    fn _assert_object_safe(_: &dyn PlanEventStore) {}
};
