//! Remote-backed store: the comment thread as append-only event log.
//!
//! `append` renders an event into a lifecycle document and posts it. A
//! body that fits under the platform limit goes out as one unchunked post;
//! an oversized body is split by the chunker and posted as one comment per
//! chunk, all sharing a group id. `read_all` lists the thread, reassembles
//! chunk groups, decodes each document, and hands back the logical event
//! sequence in thread order.
//!
//! Multi-post appends are not transactional. If a later chunk's post
//! fails, the incomplete group stays in the thread and surfaces as a
//! [`FormatError`] on the next read; this store never repairs or retries.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use scribe_core::chunk::{self, Chunk, ChunkLimits};
use scribe_core::document::{self, LifecycleDoc};
use scribe_core::error::FormatError;
use scribe_core::event::{EventKind, NewPlanEvent, PlanEvent, decode_event, encode_event};
use scribe_core::model::ThreadId;

use crate::store::{EventLog, PlanEventStore, StoreError};
use crate::transport::{Post, PostId, ThreadTransport};

/// Event store over a remote comment thread.
pub struct ThreadStore<T> {
    transport: T,
    limits: ChunkLimits,
}

impl<T: ThreadTransport> ThreadStore<T> {
    pub fn new(transport: T, limits: ChunkLimits) -> Self {
        Self { transport, limits }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn scan_thread(&self, thread: &ThreadId) -> Result<Vec<RawEvent>, StoreError> {
        let posts = self
            .transport
            .list_posts(thread)
            .await
            .map_err(StoreError::Transport)?;
        Ok(scan(posts)?)
    }
}

#[async_trait]
impl<T: ThreadTransport> PlanEventStore for ThreadStore<T> {
    async fn append(
        &self,
        thread: &ThreadId,
        event: NewPlanEvent,
    ) -> Result<PlanEvent, StoreError> {
        // The next position is however many logical events a reader would
        // see right now. Racing writers are serialized by the platform's
        // own post ordering, not by us.
        let seq = self.scan_thread(thread).await?.len() as u64;

        let body = encode_event(thread, &event.kind).render()?;
        let posts = if body.len() <= self.limits.max_post_bytes {
            self.transport
                .create_post(thread, &body)
                .await
                .map_err(StoreError::Transport)?;
            1
        } else {
            let chunks = chunk::chunk(Uuid::new_v4(), &body, &self.limits)?;
            for c in &chunks {
                self.transport
                    .create_post(thread, &c.render())
                    .await
                    .map_err(StoreError::Transport)?;
            }
            chunks.len()
        };

        tracing::info!(
            thread = %thread,
            event_type = %event.kind,
            seq,
            posts,
            "appended plan event"
        );

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
        let raw = self.scan_thread(thread).await?;
        let Some(entry) = raw.into_iter().nth(seq as usize) else {
            return Err(StoreError::EventNotFound {
                thread: thread.clone(),
                seq,
            });
        };

        let body = encode_event(thread, &event.kind).render()?;
        match entry.body {
            RawBody::Single { post, .. } => {
                if body.len() > self.limits.max_post_bytes {
                    return Err(FormatError::AmendOverflow { posts: 1 }.into());
                }
                self.transport
                    .update_post(thread, &post, &body)
                    .await
                    .map_err(StoreError::Transport)?;
            }
            RawBody::Chunked { group, mut chunks } => {
                chunks.sort_by_key(|(_, c)| c.index);
                let renewed = chunk::chunk(group, &body, &self.limits)?;
                if renewed.len() != chunks.len() {
                    return Err(FormatError::AmendOverflow {
                        posts: chunks.len(),
                    }
                    .into());
                }
                for ((post, _), new_chunk) in chunks.iter().zip(&renewed) {
                    self.transport
                        .update_post(thread, post, &new_chunk.render())
                        .await
                        .map_err(StoreError::Transport)?;
                }
            }
        }

        tracing::info!(thread = %thread, seq, event_type = %event.kind, "amended plan event");

        Ok(PlanEvent {
            seq,
            kind: event.kind,
            author: event.author.or(entry.author),
            timestamp: entry.created_at,
        })
    }

    async fn read_all(&self, thread: &ThreadId) -> Result<EventLog, StoreError> {
        let raw = self.scan_thread(thread).await?;

        let mut log = EventLog::default();
        for (i, entry) in raw.into_iter().enumerate() {
            let body = match entry.body {
                RawBody::Single { body, .. } => body,
                RawBody::Chunked { chunks, .. } => {
                    let parts: Vec<Chunk> = chunks.into_iter().map(|(_, c)| c).collect();
                    chunk::unchunk(&parts).map_err(StoreError::Format)?
                }
            };

            let doc = LifecycleDoc::parse(&body)?
                .ok_or(FormatError::MissingField("scribe:meta"))?;
            let kind = decode_event(&doc)?;
            if matches!(kind, EventKind::Unknown { .. }) {
                tracing::debug!(thread = %thread, seq = i, event_type = %kind, "unknown event type in log");
                log.unknown += 1;
            }

            log.events.push(PlanEvent {
                seq: i as u64,
                kind,
                author: entry.author,
                timestamp: entry.created_at,
            });
        }

        tracing::debug!(
            thread = %thread,
            events = log.events.len(),
            unknown = log.unknown,
            "read plan event log"
        );

        Ok(log)
    }
}

// ---------------------------------------------------------------------------
// Thread scanning
// ---------------------------------------------------------------------------

enum RawBody {
    Single {
        post: PostId,
        body: String,
    },
    Chunked {
        group: Uuid,
        chunks: Vec<(PostId, Chunk)>,
    },
}

/// One logical event's worth of posts, before decoding.
struct RawEvent {
    author: Option<String>,
    created_at: DateTime<Utc>,
    body: RawBody,
}

/// Group a thread's posts into logical events, in thread order.
///
/// A chunk group occupies the position of its first post. Posts that are
/// neither chunks nor lifecycle documents (ordinary human comments in the
/// thread) are skipped. Chunk *contents* are not validated here; holes in
/// a group surface when `unchunk` runs.
fn scan(posts: Vec<Post>) -> Result<Vec<RawEvent>, FormatError> {
    let mut entries: Vec<RawEvent> = Vec::new();
    let mut group_slots: HashMap<Uuid, usize> = HashMap::new();

    for post in posts {
        match Chunk::parse(&post.body)? {
            Some(c) => match group_slots.get(&c.group) {
                Some(&slot) => {
                    if let RawBody::Chunked { chunks, .. } = &mut entries[slot].body {
                        chunks.push((post.id, c));
                    }
                }
                None => {
                    group_slots.insert(c.group, entries.len());
                    entries.push(RawEvent {
                        author: post.author,
                        created_at: post.created_at,
                        body: RawBody::Chunked {
                            group: c.group,
                            chunks: vec![(post.id, c)],
                        },
                    });
                }
            },
            None => {
                if !post.body.starts_with(document::META_OPEN) {
                    tracing::debug!(post = %post.id, "skipping non-event post in thread");
                    continue;
                }
                entries.push(RawEvent {
                    author: post.author,
                    created_at: post.created_at,
                    body: RawBody::Single {
                        post: post.id,
                        body: post.body,
                    },
                });
            }
        }
    }

    Ok(entries)
}
