//! End-to-end pipeline tests: event -> document -> chunks -> document ->
//! event -> plan, with no transport involved.

use chrono::Utc;
use uuid::Uuid;

use scribe_core::chunk::{self, ChunkLimits};
use scribe_core::document::LifecycleDoc;
use scribe_core::event::{EventKind, PlanEvent, decode_event, encode_event, replay};
use scribe_core::model::{PlanOutcome, PlanStatus, ThreadId};

fn thread() -> ThreadId {
    ThreadId::from("issue-9")
}

/// Push one event kind through render, chunking, reassembly, and decode.
fn through_the_wire(kind: &EventKind, limits: &ChunkLimits) -> EventKind {
    let body = encode_event(&thread(), kind).render().unwrap();
    let chunks = chunk::chunk(Uuid::new_v4(), &body, limits).unwrap();
    for c in &chunks {
        assert!(c.render().len() <= limits.max_post_bytes);
    }
    let reassembled = chunk::unchunk(&chunks).unwrap();
    assert_eq!(reassembled, body);
    let doc = LifecycleDoc::parse(&reassembled).unwrap().unwrap();
    decode_event(&doc).unwrap()
}

#[test]
fn every_event_kind_survives_the_wire() {
    let limits = ChunkLimits::default();
    let kinds = [
        EventKind::PlanCreated {
            session: Uuid::new_v4(),
            title: "Replace the flux capacitor".to_owned(),
        },
        EventKind::StageStarted {
            stage: "research".to_owned(),
        },
        EventKind::ContentAppended {
            stage: "research".to_owned(),
            content: "# Findings\n\nA `<details>` tag in content:\n<details>\n<summary>x</summary>\nnested\n</details>\n".to_owned(),
        },
        EventKind::StageCompleted {
            stage: "research".to_owned(),
        },
        EventKind::PlanClosed {
            outcome: PlanOutcome::Completed,
        },
    ];
    for kind in &kinds {
        assert_eq!(&through_the_wire(kind, &limits), kind);
    }
}

#[test]
fn marker_tokens_in_content_survive_the_wire() {
    let limits = ChunkLimits::default();
    let kind = EventKind::ContentAppended {
        stage: "research".to_owned(),
        content: "the </details> tag closes a block; a bare <details opener does not"
            .to_owned(),
    };
    assert_eq!(through_the_wire(&kind, &limits), kind);
}

#[test]
fn oversized_content_survives_chunking() {
    let limits = ChunkLimits::new(700, 150);
    let kind = EventKind::ContentAppended {
        stage: "build".to_owned(),
        content: "lorem ipsum dolor sit amet\n".repeat(300),
    };
    assert_eq!(through_the_wire(&kind, &limits), kind);
}

#[test]
fn wire_round_trip_then_replay_reconstructs_the_plan() {
    let limits = ChunkLimits::default();
    let session = Uuid::new_v4();
    let kinds = vec![
        EventKind::PlanCreated {
            session,
            title: "t".to_owned(),
        },
        EventKind::StageStarted {
            stage: "a".to_owned(),
        },
        EventKind::ContentAppended {
            stage: "a".to_owned(),
            content: "body".to_owned(),
        },
        EventKind::StageCompleted {
            stage: "a".to_owned(),
        },
        EventKind::PlanClosed {
            outcome: PlanOutcome::Completed,
        },
    ];

    let events: Vec<PlanEvent> = kinds
        .iter()
        .enumerate()
        .map(|(i, kind)| PlanEvent {
            seq: i as u64,
            kind: through_the_wire(kind, &limits),
            author: Some("scribe[bot]".to_owned()),
            timestamp: Utc::now(),
        })
        .collect();

    let replayed = replay(&thread(), &events).unwrap().unwrap();
    assert_eq!(replayed.plan.status, PlanStatus::Closed);
    assert_eq!(replayed.plan.session, session);
    assert_eq!(replayed.plan.stage("a").unwrap().content, "body");
}
