//! Shared test doubles for store integration tests.
//!
//! [`FakeTransport`] is an in-memory [`ThreadTransport`] with failure
//! injection, so tests can construct the awkward remote conditions --
//! partial multi-post appends, hand-edited bodies, interleaved human
//! comments -- without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use scribe_core::model::ThreadId;
use scribe_store::transport::{Post, PostId, ThreadTransport};

/// In-memory comment threads with optional injected failures.
#[derive(Default)]
pub struct FakeTransport {
    threads: Mutex<HashMap<ThreadId, Vec<Post>>>,
    next_id: AtomicUsize,
    /// When set, `create_post` fails once this many posts exist in total.
    fail_create_after: AtomicUsize,
}

const NEVER: usize = usize::MAX;

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            threads: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            fail_create_after: AtomicUsize::new(NEVER),
        }
    }

    /// Make every `create_post` after the next `n` successful ones fail.
    pub fn fail_create_after(&self, n: usize) {
        let created = self.next_id.load(Ordering::SeqCst) - 1;
        self.fail_create_after.store(created + n, Ordering::SeqCst);
    }

    /// Stop failing `create_post`.
    pub fn heal(&self) {
        self.fail_create_after.store(NEVER, Ordering::SeqCst);
    }

    /// Directly seed a post, bypassing the store (a "human comment" or a
    /// hand-crafted legacy body).
    pub async fn seed_post(&self, thread: &ThreadId, body: &str, author: Option<&str>) -> PostId {
        let id = self.alloc_id();
        let mut threads = self.threads.lock().await;
        threads.entry(thread.clone()).or_default().push(Post {
            id: id.clone(),
            body: body.to_owned(),
            author: author.map(str::to_owned),
            created_at: Utc::now(),
        });
        id
    }

    /// Overwrite a post body in place, as a thread editor would.
    pub async fn tamper(&self, thread: &ThreadId, post: &PostId, body: &str) {
        let mut threads = self.threads.lock().await;
        if let Some(posts) = threads.get_mut(thread) {
            if let Some(p) = posts.iter_mut().find(|p| &p.id == post) {
                p.body = body.to_owned();
            }
        }
    }

    /// Delete a post outright.
    pub async fn delete_post(&self, thread: &ThreadId, post: &PostId) {
        let mut threads = self.threads.lock().await;
        if let Some(posts) = threads.get_mut(thread) {
            posts.retain(|p| &p.id != post);
        }
    }

    /// Total posts across all threads.
    pub async fn post_count(&self, thread: &ThreadId) -> usize {
        self.threads
            .lock()
            .await
            .get(thread)
            .map_or(0, |posts| posts.len())
    }

    fn alloc_id(&self) -> PostId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        PostId(format!("post-{n}"))
    }
}

#[async_trait]
impl ThreadTransport for FakeTransport {
    async fn create_post(&self, thread: &ThreadId, body: &str) -> Result<PostId> {
        let created = self.next_id.load(Ordering::SeqCst) - 1;
        if created >= self.fail_create_after.load(Ordering::SeqCst) {
            bail!("injected create_post failure for thread {thread}");
        }
        Ok(self.seed_post(thread, body, Some("scribe[bot]")).await)
    }

    async fn list_posts(&self, thread: &ThreadId) -> Result<Vec<Post>> {
        let threads = self.threads.lock().await;
        Ok(threads.get(thread).cloned().unwrap_or_default())
    }

    async fn update_post(&self, thread: &ThreadId, post: &PostId, body: &str) -> Result<()> {
        let mut threads = self.threads.lock().await;
        let posts = threads
            .get_mut(thread)
            .ok_or_else(|| anyhow::anyhow!("unknown thread {thread}"))?;
        let existing = posts
            .iter_mut()
            .find(|p| &p.id == post)
            .ok_or_else(|| anyhow::anyhow!("unknown post {post} in thread {thread}"))?;
        existing.body = body.to_owned();
        Ok(())
    }
}
