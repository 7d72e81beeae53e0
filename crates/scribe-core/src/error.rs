//! Error taxonomy for the event log core.
//!
//! Two families: [`FormatError`] for anything wrong with bytes on the wire
//! (malformed documents, broken chunk envelopes) and [`SequenceError`] for
//! event logs that violate the plan lifecycle transition table. Format
//! problems are always surfaced to the caller; sequence problems surface at
//! replay time, since the backing thread has already accepted the post.

use thiserror::Error;
use uuid::Uuid;

/// A body or chunk envelope that cannot be decoded.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("metadata block opened but never closed (missing `-->` line)")]
    UnterminatedMeta,

    #[error("malformed metadata line {line:?} (expected `key: value`)")]
    MalformedMetaLine { line: String },

    #[error("metadata field {key:?} contains a reserved token and cannot be encoded")]
    ReservedToken { key: String },

    #[error("stage name {stage:?} contains a reserved character and cannot be encoded")]
    ReservedStage { stage: String },

    #[error("section {stage:?} opened but never closed (missing `</details>`)")]
    UnterminatedSection { stage: String },

    #[error("section open marker {line:?} is missing its `\">` terminator")]
    MalformedSectionOpen { line: String },

    #[error("section open marker without a `<summary>` stage name")]
    MissingSummary,

    #[error("missing required metadata field {0:?}")]
    MissingField(&'static str),

    #[error("metadata field {key:?} has invalid value {value:?}")]
    InvalidField { key: &'static str, value: String },

    #[error("chunk set is empty")]
    EmptyChunkSet,

    #[error("chunk group {group} declares {declared} chunks but {found} were found")]
    ChunkCountMismatch {
        group: Uuid,
        declared: u32,
        found: u32,
    },

    #[error("chunk group {group} has inconsistent totals ({a} vs {b})")]
    ChunkTotalDisagreement { group: Uuid, a: u32, b: u32 },

    #[error("chunk group {group} is missing chunk {index} of {total}")]
    ChunkMissing { group: Uuid, index: u32, total: u32 },

    #[error("chunk group {group} contains chunk {index} more than once")]
    ChunkDuplicate { group: Uuid, index: u32 },

    #[error("chunk set mixes groups {a} and {b}")]
    ChunkGroupMismatch { a: Uuid, b: Uuid },

    #[error("malformed chunk header line {line:?}")]
    MalformedChunkHeader { line: String },

    #[error(
        "rendered chunk is {rendered} bytes, over the {limit}-byte post limit \
         (margin too small for the envelope)"
    )]
    ChunkOverflow { rendered: usize, limit: usize },

    #[error("amended event no longer fits its original {posts} post(s)")]
    AmendOverflow { posts: usize },
}

/// An event log that violates the lifecycle transition table.
///
/// Every variant names the offending event's position so the caller can
/// point at the exact post in the thread.
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("event {seq} ({event_type}) precedes plan_created")]
    BeforeCreated { seq: u64, event_type: String },

    #[error("event {seq} is a second plan_created")]
    DuplicateCreated { seq: u64 },

    #[error("event {seq} follows terminal plan_closed ({event_type})")]
    AfterTerminal { seq: u64, event_type: String },

    #[error("event {seq} starts stage {stage:?} which was already started")]
    StageAlreadyStarted { seq: u64, stage: String },

    #[error("event {seq} completes stage {stage:?} which was never started")]
    CompletedWithoutStart { seq: u64, stage: String },

    #[error("event {seq} completes stage {stage:?} which was already completed")]
    StageAlreadyCompleted { seq: u64, stage: String },

    #[error("event {seq} appends content to stage {stage:?} which was never started")]
    ContentWithoutStart { seq: u64, stage: String },
}

impl SequenceError {
    /// Position of the offending event in the log.
    pub fn seq(&self) -> u64 {
        match self {
            Self::BeforeCreated { seq, .. }
            | Self::DuplicateCreated { seq }
            | Self::AfterTerminal { seq, .. }
            | Self::StageAlreadyStarted { seq, .. }
            | Self::CompletedWithoutStart { seq, .. }
            | Self::StageAlreadyCompleted { seq, .. }
            | Self::ContentWithoutStart { seq, .. } => *seq,
        }
    }
}
