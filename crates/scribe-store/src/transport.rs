//! The thread transport seam: the only durability boundary.
//!
//! Implementors wrap a concrete issue/comment API (GitHub issues, a
//! forge's discussion endpoint, ...) and expose the three calls the store
//! needs. Authentication, rate limiting, and retries all live behind this
//! trait; the store treats a returned error as final.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use scribe_core::model::ThreadId;

/// Identifier of one post within a thread, assigned by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostId(pub String);

impl PostId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One post as listed from a thread.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: PostId,
    pub body: String,
    /// Platform-reported author, when available.
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Create/list/update calls against a remote comment thread.
///
/// `list_posts` must return posts in the platform's native thread order;
/// that ordering is the store's only sequencing guarantee. Multi-post
/// writes are not transactional: a failed `create_post` mid-sequence
/// leaves earlier posts in place.
#[async_trait]
pub trait ThreadTransport: Send + Sync {
    async fn create_post(&self, thread: &ThreadId, body: &str) -> Result<PostId>;

    async fn list_posts(&self, thread: &ThreadId) -> Result<Vec<Post>>;

    async fn update_post(&self, thread: &ThreadId, post: &PostId, body: &str) -> Result<()>;
}

// Compile-time assertion: transports must stay object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn ThreadTransport) {}
};
