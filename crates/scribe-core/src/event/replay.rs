//! Replay: fold an ordered event log into a [`Plan`] projection.
//!
//! Enforces the lifecycle transition table:
//!
//! ```text
//! (no plan)           -> plan_created            (only legal first event)
//! plan open           -> stage_started(s)        (s not yet started)
//! s started           -> stage_completed(s)      (s not yet completed)
//! s started           -> content_appended(s)     (legal until plan closes)
//! plan open           -> plan_closed             (terminal)
//! ```
//!
//! The fold is pure and deterministic: the same event sequence always
//! yields the same plan. Violations surface as [`SequenceError`] naming
//! the offending event's position; the store never pre-rejects appends,
//! because the backing thread has already accepted the post by the time
//! anyone can look.

use crate::error::SequenceError;
use crate::model::{Plan, PlanStatus, StageState, StageStatus, ThreadId};

use super::{EventKind, PlanEvent};

/// Result of a replay: the projection plus the unknown-event skip count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replayed {
    pub plan: Plan,
    /// Number of events with unrecognized types that were skipped.
    pub skipped: usize,
}

/// Fold `events` into a [`Plan`].
///
/// Returns `Ok(None)` for an empty log (no plan exists yet), the replayed
/// plan otherwise, or the first lifecycle violation encountered.
pub fn replay(thread: &ThreadId, events: &[PlanEvent]) -> Result<Option<Replayed>, SequenceError> {
    let mut plan: Option<Plan> = None;
    let mut skipped = 0usize;

    for event in events {
        let seq = event.seq;

        if let EventKind::Unknown { event_type } = &event.kind {
            tracing::debug!(seq, event_type = %event_type, "skipping unknown event type");
            skipped += 1;
            continue;
        }

        match (&mut plan, &event.kind) {
            (None, EventKind::PlanCreated { session, title }) => {
                plan = Some(Plan {
                    thread: thread.clone(),
                    session: *session,
                    title: title.clone(),
                    status: PlanStatus::Open,
                    outcome: None,
                    current_stage: None,
                    stages: Vec::new(),
                });
            }
            (None, kind) => {
                return Err(SequenceError::BeforeCreated {
                    seq,
                    event_type: kind.event_type().to_owned(),
                });
            }
            (Some(_), EventKind::PlanCreated { .. }) => {
                return Err(SequenceError::DuplicateCreated { seq });
            }
            (Some(p), kind) => {
                if p.status == PlanStatus::Closed {
                    return Err(SequenceError::AfterTerminal {
                        seq,
                        event_type: kind.event_type().to_owned(),
                    });
                }
                apply(p, seq, kind)?;
            }
        }
    }

    Ok(plan.map(|plan| Replayed { plan, skipped }))
}

/// Apply one non-initial event to an open plan.
fn apply(plan: &mut Plan, seq: u64, kind: &EventKind) -> Result<(), SequenceError> {
    match kind {
        EventKind::StageStarted { stage } => {
            if plan.stage(stage).is_some() {
                return Err(SequenceError::StageAlreadyStarted {
                    seq,
                    stage: stage.clone(),
                });
            }
            plan.stages.push(StageState {
                name: stage.clone(),
                status: StageStatus::Started,
                content: String::new(),
            });
            plan.current_stage = Some(stage.clone());
        }
        EventKind::StageCompleted { stage } => {
            let Some(state) = plan.stage_mut(stage) else {
                return Err(SequenceError::CompletedWithoutStart {
                    seq,
                    stage: stage.clone(),
                });
            };
            if state.status == StageStatus::Completed {
                return Err(SequenceError::StageAlreadyCompleted {
                    seq,
                    stage: stage.clone(),
                });
            }
            state.status = StageStatus::Completed;
            // Fall back to the most recent stage still in flight.
            plan.current_stage = plan
                .stages
                .iter()
                .rev()
                .find(|s| s.status == StageStatus::Started)
                .map(|s| s.name.clone());
        }
        EventKind::ContentAppended { stage, content } => {
            let Some(state) = plan.stage_mut(stage) else {
                return Err(SequenceError::ContentWithoutStart {
                    seq,
                    stage: stage.clone(),
                });
            };
            if state.content.is_empty() {
                state.content = content.clone();
            } else {
                state.content.push_str("\n\n");
                state.content.push_str(content);
            }
        }
        EventKind::PlanClosed { outcome } => {
            plan.status = PlanStatus::Closed;
            plan.outcome = Some(*outcome);
            plan.current_stage = None;
        }
        // Handled by the caller before dispatching here.
        EventKind::PlanCreated { .. } | EventKind::Unknown { .. } => unreachable!(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::model::PlanOutcome;

    use super::*;

    fn thread() -> ThreadId {
        ThreadId::from("issue-42")
    }

    fn seq_events(kinds: Vec<EventKind>) -> Vec<PlanEvent> {
        kinds
            .into_iter()
            .enumerate()
            .map(|(i, kind)| PlanEvent {
                seq: i as u64,
                kind,
                author: None,
                timestamp: Utc::now(),
            })
            .collect()
    }

    fn created() -> EventKind {
        EventKind::PlanCreated {
            session: Uuid::nil(),
            title: "t".to_owned(),
        }
    }

    fn started(stage: &str) -> EventKind {
        EventKind::StageStarted {
            stage: stage.to_owned(),
        }
    }

    fn completed(stage: &str) -> EventKind {
        EventKind::StageCompleted {
            stage: stage.to_owned(),
        }
    }

    fn closed() -> EventKind {
        EventKind::PlanClosed {
            outcome: PlanOutcome::Completed,
        }
    }

    #[test]
    fn empty_log_is_no_plan() {
        assert_eq!(replay(&thread(), &[]).unwrap(), None);
    }

    #[test]
    fn canonical_lifecycle_replays() {
        let events = seq_events(vec![created(), started("a"), completed("a"), closed()]);
        let replayed = replay(&thread(), &events).unwrap().unwrap();

        assert_eq!(replayed.skipped, 0);
        let plan = replayed.plan;
        assert_eq!(plan.status, PlanStatus::Closed);
        assert_eq!(plan.outcome, Some(PlanOutcome::Completed));
        assert_eq!(plan.stage("a").unwrap().status, StageStatus::Completed);
        assert_eq!(plan.current_stage, None);
    }

    #[test]
    fn replay_is_deterministic() {
        let events = seq_events(vec![
            created(),
            started("a"),
            EventKind::ContentAppended {
                stage: "a".to_owned(),
                content: "notes".to_owned(),
            },
            completed("a"),
        ]);
        assert_eq!(
            replay(&thread(), &events).unwrap(),
            replay(&thread(), &events).unwrap()
        );
    }

    #[test]
    fn content_accumulates_in_append_order() {
        let events = seq_events(vec![
            created(),
            started("a"),
            EventKind::ContentAppended {
                stage: "a".to_owned(),
                content: "first".to_owned(),
            },
            EventKind::ContentAppended {
                stage: "a".to_owned(),
                content: "second".to_owned(),
            },
        ]);
        let replayed = replay(&thread(), &events).unwrap().unwrap();
        assert_eq!(replayed.plan.stage("a").unwrap().content, "first\n\nsecond");
    }

    #[test]
    fn stages_keep_insertion_order() {
        let events = seq_events(vec![created(), started("b"), started("a"), started("c")]);
        let replayed = replay(&thread(), &events).unwrap().unwrap();
        let names: Vec<&str> = replayed.plan.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["b", "a", "c"]);
        assert_eq!(replayed.plan.current_stage.as_deref(), Some("c"));
    }

    #[test]
    fn current_stage_falls_back_after_completion() {
        let events = seq_events(vec![created(), started("a"), started("b"), completed("b")]);
        let replayed = replay(&thread(), &events).unwrap().unwrap();
        assert_eq!(replayed.plan.current_stage.as_deref(), Some("a"));
    }

    #[test]
    fn first_event_must_be_plan_created() {
        let events = seq_events(vec![started("a")]);
        let err = replay(&thread(), &events).unwrap_err();
        assert!(matches!(
            err,
            SequenceError::BeforeCreated { seq: 0, ref event_type } if event_type == "stage_started"
        ));
    }

    #[test]
    fn second_plan_created_is_rejected() {
        let events = seq_events(vec![created(), created()]);
        let err = replay(&thread(), &events).unwrap_err();
        assert!(matches!(err, SequenceError::DuplicateCreated { seq: 1 }));
    }

    #[test]
    fn events_after_terminal_are_rejected_with_their_position() {
        let events = seq_events(vec![created(), closed(), started("a")]);
        let err = replay(&thread(), &events).unwrap_err();
        assert!(matches!(
            err,
            SequenceError::AfterTerminal { seq: 2, ref event_type } if event_type == "stage_started"
        ));
        assert_eq!(err.seq(), 2);
    }

    #[test]
    fn completion_requires_a_start() {
        let events = seq_events(vec![created(), completed("a")]);
        let err = replay(&thread(), &events).unwrap_err();
        assert!(matches!(err, SequenceError::CompletedWithoutStart { .. }));
    }

    #[test]
    fn double_start_is_rejected() {
        let events = seq_events(vec![created(), started("a"), started("a")]);
        let err = replay(&thread(), &events).unwrap_err();
        assert!(matches!(err, SequenceError::StageAlreadyStarted { .. }));
    }

    #[test]
    fn double_completion_is_rejected() {
        let events = seq_events(vec![created(), started("a"), completed("a"), completed("a")]);
        let err = replay(&thread(), &events).unwrap_err();
        assert!(matches!(err, SequenceError::StageAlreadyCompleted { .. }));
    }

    #[test]
    fn content_requires_a_started_stage() {
        let events = seq_events(vec![
            created(),
            EventKind::ContentAppended {
                stage: "a".to_owned(),
                content: "x".to_owned(),
            },
        ]);
        let err = replay(&thread(), &events).unwrap_err();
        assert!(matches!(err, SequenceError::ContentWithoutStart { .. }));
    }

    #[test]
    fn late_content_on_completed_stage_is_legal() {
        let events = seq_events(vec![
            created(),
            started("a"),
            completed("a"),
            EventKind::ContentAppended {
                stage: "a".to_owned(),
                content: "postscript".to_owned(),
            },
        ]);
        let replayed = replay(&thread(), &events).unwrap().unwrap();
        assert_eq!(replayed.plan.stage("a").unwrap().content, "postscript");
    }

    #[test]
    fn unknown_events_are_skipped_and_counted() {
        let events = seq_events(vec![
            created(),
            started("a"),
            EventKind::Unknown {
                event_type: "stage_paused".to_owned(),
            },
            completed("a"),
        ]);
        let replayed = replay(&thread(), &events).unwrap().unwrap();
        assert_eq!(replayed.skipped, 1);
        assert_eq!(replayed.plan.stage("a").unwrap().status, StageStatus::Completed);

        // Identical to the same log without the unknown event.
        let without = seq_events(vec![created(), started("a"), completed("a")]);
        assert_eq!(
            replayed.plan.stages,
            replay(&thread(), &without).unwrap().unwrap().plan.stages
        );
    }

    #[test]
    fn unknown_event_before_created_is_still_tolerated() {
        let mut events = seq_events(vec![created(), started("a")]);
        events.insert(
            0,
            PlanEvent {
                seq: 0,
                kind: EventKind::Unknown {
                    event_type: "v3_preamble".to_owned(),
                },
                author: None,
                timestamp: Utc::now(),
            },
        );
        let replayed = replay(&thread(), &events).unwrap().unwrap();
        assert_eq!(replayed.skipped, 1);
    }
}
