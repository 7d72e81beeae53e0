//! Typed plan lifecycle events and their wire form.
//!
//! Every event is persisted as one lifecycle document: the event type and
//! its scalar payload fields ride in the metadata prefix, free-form content
//! rides in a stage section. Unrecognized event types decode into
//! [`EventKind::Unknown`] so that replaying a log written by a newer
//! protocol version skips them instead of failing.

pub mod replay;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::{FORMAT_VERSION, LifecycleDoc, MetaFields, StageSection};
use crate::error::FormatError;
use crate::model::{PlanOutcome, ThreadId};

pub use replay::{Replayed, replay};

/// The closed vocabulary of lifecycle transitions, with payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    /// First and only-first event of every plan.
    PlanCreated { session: Uuid, title: String },
    StageStarted { stage: String },
    StageCompleted { stage: String },
    /// Free-form content appended to an already-started stage.
    ContentAppended { stage: String, content: String },
    /// Terminal: nothing is legal after this.
    PlanClosed { outcome: PlanOutcome },
    /// Carrier for event types this version does not know. Skipped (and
    /// counted) during replay, never validated.
    Unknown { event_type: String },
}

impl EventKind {
    /// Wire name of this event type.
    pub fn event_type(&self) -> &str {
        match self {
            Self::PlanCreated { .. } => "plan_created",
            Self::StageStarted { .. } => "stage_started",
            Self::StageCompleted { .. } => "stage_completed",
            Self::ContentAppended { .. } => "content_appended",
            Self::PlanClosed { .. } => "plan_closed",
            Self::Unknown { event_type } => event_type,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_type())
    }
}

/// An event as it exists in the log: payload plus assigned position and
/// transport-reported attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEvent {
    /// Position in the log, assigned at append time.
    pub seq: u64,
    pub kind: EventKind,
    pub author: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// An event as handed to a store for appending, before a position exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlanEvent {
    pub kind: EventKind,
    pub author: Option<String>,
}

impl NewPlanEvent {
    pub fn new(kind: EventKind) -> Self {
        Self { kind, author: None }
    }

    pub fn by(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Wire codec
// ---------------------------------------------------------------------------

/// Render an event into its lifecycle document.
///
/// Infallible: reserved-token violations in field values surface when the
/// document itself is rendered.
pub fn encode_event(thread: &ThreadId, kind: &EventKind) -> LifecycleDoc {
    let mut meta = MetaFields::new()
        .with("version", FORMAT_VERSION.to_string())
        .with("thread", thread.as_str())
        .with("event", kind.event_type());
    let mut doc_sections: Vec<StageSection> = Vec::new();

    match kind {
        EventKind::PlanCreated { session, title } => {
            meta.set("session", session.to_string());
            meta.set("title", title.as_str());
        }
        EventKind::StageStarted { stage } | EventKind::StageCompleted { stage } => {
            meta.set("stage", stage.as_str());
        }
        EventKind::ContentAppended { stage, content } => {
            meta.set("stage", stage.as_str());
            doc_sections.push(StageSection::new(stage.as_str(), content.as_str()));
        }
        EventKind::PlanClosed { outcome } => {
            meta.set("outcome", outcome.to_string());
        }
        EventKind::Unknown { .. } => {}
    }

    let mut doc = LifecycleDoc::new(meta);
    doc.sections = doc_sections;
    doc
}

/// Decode a lifecycle document back into an event kind.
///
/// A recognized event type with a broken payload is a [`FormatError`]; an
/// unrecognized type decodes to [`EventKind::Unknown`].
pub fn decode_event(doc: &LifecycleDoc) -> Result<EventKind, FormatError> {
    let event_type = doc.meta.require("event")?;

    let kind = match event_type {
        "plan_created" => {
            let raw = doc.meta.require("session")?;
            let session = raw.parse::<Uuid>().map_err(|_| FormatError::InvalidField {
                key: "session",
                value: raw.to_owned(),
            })?;
            EventKind::PlanCreated {
                session,
                title: doc.meta.get("title").unwrap_or_default().to_owned(),
            }
        }
        "stage_started" => EventKind::StageStarted {
            stage: doc.meta.require("stage")?.to_owned(),
        },
        "stage_completed" => EventKind::StageCompleted {
            stage: doc.meta.require("stage")?.to_owned(),
        },
        "content_appended" => {
            let stage = doc.meta.require("stage")?.to_owned();
            let content = doc
                .section(&stage)
                .map(|s| s.content.clone())
                .ok_or(FormatError::MissingField("content"))?;
            EventKind::ContentAppended { stage, content }
        }
        "plan_closed" => {
            let raw = doc.meta.require("outcome")?;
            let outcome = raw.parse().map_err(|_| FormatError::InvalidField {
                key: "outcome",
                value: raw.to_owned(),
            })?;
            EventKind::PlanClosed { outcome }
        }
        other => EventKind::Unknown {
            event_type: other.to_owned(),
        },
    };

    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::build_metadata_prefix;

    fn thread() -> ThreadId {
        ThreadId::from("issue-42")
    }

    fn round_trip(kind: &EventKind) -> EventKind {
        let doc = encode_event(&thread(), kind);
        let body = doc.render().unwrap();
        let parsed = LifecycleDoc::parse(&body).unwrap().unwrap();
        decode_event(&parsed).unwrap()
    }

    #[test]
    fn plan_created_round_trips() {
        let kind = EventKind::PlanCreated {
            session: Uuid::new_v4(),
            title: "Ship the widget".to_owned(),
        };
        assert_eq!(round_trip(&kind), kind);
    }

    #[test]
    fn stage_events_round_trip() {
        for kind in [
            EventKind::StageStarted {
                stage: "research".to_owned(),
            },
            EventKind::StageCompleted {
                stage: "research".to_owned(),
            },
        ] {
            assert_eq!(round_trip(&kind), kind);
        }
    }

    #[test]
    fn content_appended_round_trips_with_markdown() {
        let kind = EventKind::ContentAppended {
            stage: "build".to_owned(),
            content: "## Progress\n\n- [x] step one\n- [ ] step two\n".to_owned(),
        };
        assert_eq!(round_trip(&kind), kind);
    }

    #[test]
    fn plan_closed_round_trips() {
        for outcome in [PlanOutcome::Completed, PlanOutcome::Cancelled] {
            let kind = EventKind::PlanClosed { outcome };
            assert_eq!(round_trip(&kind), kind);
        }
    }

    #[test]
    fn unrecognized_type_decodes_to_unknown() {
        let body = build_metadata_prefix(
            &MetaFields::new()
                .with("version", "3")
                .with("thread", "issue-42")
                .with("event", "stage_paused")
                .with("stage", "build"),
        )
        .unwrap();
        let doc = LifecycleDoc::parse(&body).unwrap().unwrap();
        let kind = decode_event(&doc).unwrap();
        assert_eq!(
            kind,
            EventKind::Unknown {
                event_type: "stage_paused".to_owned()
            }
        );
    }

    #[test]
    fn recognized_type_with_broken_payload_is_an_error() {
        let body = build_metadata_prefix(
            &MetaFields::new()
                .with("version", "2")
                .with("thread", "issue-42")
                .with("event", "stage_started"),
        )
        .unwrap();
        let doc = LifecycleDoc::parse(&body).unwrap().unwrap();
        let err = decode_event(&doc).unwrap_err();
        assert!(matches!(err, FormatError::MissingField("stage")));
    }

    #[test]
    fn content_appended_without_section_is_an_error() {
        let body = build_metadata_prefix(
            &MetaFields::new()
                .with("version", "2")
                .with("thread", "issue-42")
                .with("event", "content_appended")
                .with("stage", "build"),
        )
        .unwrap();
        let doc = LifecycleDoc::parse(&body).unwrap().unwrap();
        let err = decode_event(&doc).unwrap_err();
        assert!(matches!(err, FormatError::MissingField("content")));
    }

    #[test]
    fn bad_session_uuid_is_an_error() {
        let body = build_metadata_prefix(
            &MetaFields::new()
                .with("version", "2")
                .with("thread", "issue-42")
                .with("event", "plan_created")
                .with("session", "not-a-uuid")
                .with("title", "t"),
        )
        .unwrap();
        let doc = LifecycleDoc::parse(&body).unwrap().unwrap();
        let err = decode_event(&doc).unwrap_err();
        assert!(matches!(err, FormatError::InvalidField { key: "session", .. }));
    }
}
