//! Plan event stores: one contract, one implementation per backing medium.
//!
//! [`remote::ThreadStore`] persists events as comments in a remote issue
//! thread through the [`transport::ThreadTransport`] seam, chunking bodies
//! that exceed the platform's post size limit. [`memory::MemoryStore`] is
//! the deterministic in-process double. [`decor`] holds the tracing and
//! dry-run wrappers.

pub mod config;
pub mod decor;
pub mod memory;
pub mod remote;
pub mod store;
pub mod transport;

pub use config::ScribeConfig;
pub use decor::{DryRunStore, TracingStore};
pub use memory::MemoryStore;
pub use remote::ThreadStore;
pub use store::{EventLog, PlanEventStore, StoreError};
pub use transport::{Post, PostId, ThreadTransport};
