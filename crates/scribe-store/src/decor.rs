//! Store decorators: one implementation per execution mode.
//!
//! [`TracingStore`] wraps a real store and narrates every call at info
//! level, for operators tailing logs. [`DryRunStore`] satisfies the
//! contract without touching any backing medium, for `--dry-run` style
//! flows that want plausible positions back.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use scribe_core::event::{NewPlanEvent, PlanEvent};
use scribe_core::model::ThreadId;

use crate::store::{EventLog, PlanEventStore, StoreError};

/// Human-readable tracing wrapper around any store.
pub struct TracingStore<S> {
    inner: S,
}

impl<S: PlanEventStore> TracingStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: PlanEventStore> PlanEventStore for TracingStore<S> {
    async fn append(
        &self,
        thread: &ThreadId,
        event: NewPlanEvent,
    ) -> Result<PlanEvent, StoreError> {
        tracing::info!(thread = %thread, event_type = %event.kind, "store.append");
        let result = self.inner.append(thread, event).await;
        if let Err(e) = &result {
            tracing::warn!(thread = %thread, error = %e, "store.append failed");
        }
        result
    }

    async fn amend(
        &self,
        thread: &ThreadId,
        seq: u64,
        event: NewPlanEvent,
    ) -> Result<PlanEvent, StoreError> {
        tracing::info!(thread = %thread, seq, event_type = %event.kind, "store.amend");
        let result = self.inner.amend(thread, seq, event).await;
        if let Err(e) = &result {
            tracing::warn!(thread = %thread, seq, error = %e, "store.amend failed");
        }
        result
    }

    async fn read_all(&self, thread: &ThreadId) -> Result<EventLog, StoreError> {
        let result = self.inner.read_all(thread).await;
        match &result {
            Ok(log) => {
                tracing::info!(
                    thread = %thread,
                    events = log.events.len(),
                    unknown = log.unknown,
                    "store.read_all"
                );
            }
            Err(e) => tracing::warn!(thread = %thread, error = %e, "store.read_all failed"),
        }
        result
    }
}

/// No-op store for dry runs: appends go nowhere, reads come back empty.
///
/// Positions are still assigned per thread so callers that thread the
/// returned seq through later calls keep working.
#[derive(Default)]
pub struct DryRunStore {
    counters: Mutex<HashMap<ThreadId, u64>>,
}

impl DryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanEventStore for DryRunStore {
    async fn append(
        &self,
        thread: &ThreadId,
        event: NewPlanEvent,
    ) -> Result<PlanEvent, StoreError> {
        let mut counters = self.counters.lock().await;
        let counter = counters.entry(thread.clone()).or_default();
        let seq = *counter;
        *counter += 1;
        tracing::info!(thread = %thread, event_type = %event.kind, seq, "dry-run append");
        Ok(PlanEvent {
            seq,
            kind: event.kind,
            author: event.author,
            timestamp: Utc::now(),
        })
    }

    async fn amend(
        &self,
        thread: &ThreadId,
        seq: u64,
        event: NewPlanEvent,
    ) -> Result<PlanEvent, StoreError> {
        tracing::info!(thread = %thread, seq, event_type = %event.kind, "dry-run amend");
        Ok(PlanEvent {
            seq,
            kind: event.kind,
            author: event.author,
            timestamp: Utc::now(),
        })
    }

    async fn read_all(&self, _thread: &ThreadId) -> Result<EventLog, StoreError> {
        Ok(EventLog::default())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use scribe_core::event::EventKind;

    use crate::memory::MemoryStore;

    use super::*;

    fn created() -> NewPlanEvent {
        NewPlanEvent::new(EventKind::PlanCreated {
            session: Uuid::new_v4(),
            title: "t".to_owned(),
        })
    }

    #[tokio::test]
    async fn tracing_store_delegates() {
        let store = TracingStore::new(MemoryStore::new());
        let thread = ThreadId::from("issue-1");

        let appended = store.append(&thread, created()).await.unwrap();
        assert_eq!(appended.seq, 0);

        let log = store.read_all(&thread).await.unwrap();
        assert_eq!(log.events.len(), 1);
    }

    #[tokio::test]
    async fn dry_run_store_persists_nothing() {
        let store = DryRunStore::new();
        let thread = ThreadId::from("issue-1");

        let a = store.append(&thread, created()).await.unwrap();
        let b = store.append(&thread, created()).await.unwrap();
        assert_eq!((a.seq, b.seq), (0, 1));

        assert!(store.read_all(&thread).await.unwrap().events.is_empty());
    }
}
