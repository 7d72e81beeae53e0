//! Core of the plan event store: the typed event vocabulary, the content
//! chunker, the lifecycle document codec, and pure replay.
//!
//! A plan's history lives in a remote issue thread, one post per event.
//! This crate owns everything about those posts except the transport: how
//! an event becomes a bounded-size markdown body, how oversized bodies are
//! split and reassembled, and how a post sequence folds back into a
//! [`model::Plan`]. No I/O happens here.

pub mod chunk;
pub mod document;
pub mod error;
pub mod event;
pub mod model;

pub use chunk::{Chunk, ChunkLimits, chunk, unchunk};
pub use document::{LifecycleDoc, MetaFields, StageSection};
pub use error::{FormatError, SequenceError};
pub use event::{EventKind, NewPlanEvent, PlanEvent, Replayed, replay};
pub use model::{Plan, PlanOutcome, PlanStatus, StageState, StageStatus, ThreadId};
