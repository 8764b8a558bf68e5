//! The `upstream` module talks to the external publish/subscribe backend.
//!
//! `UpstreamManager` turns topic-registry transitions into exactly one
//! backend subscribe or unsubscribe call each. The backend itself sits behind
//! the `UpstreamBackend` trait: Redis in production, an in-process
//! `MemoryBackend` for single-process runs and tests.

pub mod backend;
pub mod manager;
pub mod memory;
pub mod redis_backend;
pub mod retry;

pub use backend::{UpstreamBackend, UpstreamMessage};
pub use manager::UpstreamManager;
pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;
pub use retry::{ExponentialBackoff, NoRetry, RetryPolicy};

#[cfg(test)]
pub(crate) mod testing;
