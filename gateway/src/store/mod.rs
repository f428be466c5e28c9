//! Persistence contracts for sessions and extension instances.
//!
//! The gateway only depends on the traits here. The `DashMap` backends are
//! the bundled implementation; anything that honours the same contract
//! (secret hashing, dummy hash on miss, TTL eviction) can replace them.

pub mod hasher;
pub mod instance;
pub mod session;

pub use hasher::SecretHasher;
pub use instance::{InstanceStore, MemoryInstanceStore};
pub use session::{MemorySessionStore, SessionStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Unknown id, or a session whose secret did not verify
    #[error("record not found")]
    NotFound,

    #[error("secret hashing failed: {0}")]
    Hashing(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}
