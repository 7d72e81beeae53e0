//! In-memory store: the deterministic test double.
//!
//! Same contract as [`crate::remote::ThreadStore`], minus the transport:
//! no chunking (there is no size limit to respect) and no wire format.
//! Sequence validation happens at replay time for both stores, so tests
//! against this fake predict remote behavior for lifecycle errors.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use scribe_core::event::{EventKind, NewPlanEvent, PlanEvent};
use scribe_core::model::ThreadId;

use crate::store::{EventLog, PlanEventStore, StoreError};

/// Ordered in-process event log per thread id.
#[derive(Default)]
pub struct MemoryStore {
    threads: Mutex<HashMap<ThreadId, Vec<PlanEvent>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanEventStore for MemoryStore {
    async fn append(
        &self,
        thread: &ThreadId,
        event: NewPlanEvent,
    ) -> Result<PlanEvent, StoreError> {
        let mut threads = self.threads.lock().await;
        let log = threads.entry(thread.clone()).or_default();
        let appended = PlanEvent {
            seq: log.len() as u64,
            kind: event.kind,
            author: event.author,
            timestamp: Utc::now(),
        };
        log.push(appended.clone());
        Ok(appended)
    }

    async fn amend(
        &self,
        thread: &ThreadId,
        seq: u64,
        event: NewPlanEvent,
    ) -> Result<PlanEvent, StoreError> {
        let mut threads = self.threads.lock().await;
        let existing = threads
            .get_mut(thread)
            .and_then(|log| log.get_mut(seq as usize))
            .ok_or_else(|| StoreError::EventNotFound {
                thread: thread.clone(),
                seq,
            })?;
        // Identity (position, timestamp) survives; only content changes.
        existing.kind = event.kind;
        if event.author.is_some() {
            existing.author = event.author;
        }
        Ok(existing.clone())
    }

    async fn read_all(&self, thread: &ThreadId) -> Result<EventLog, StoreError> {
        let threads = self.threads.lock().await;
        let events = threads.get(thread).cloned().unwrap_or_default();
        let unknown = events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::Unknown { .. }))
            .count();
        Ok(EventLog { events, unknown })
    }
}
