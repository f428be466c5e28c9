// gateway/src/store/session.rs
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use common::models::session::Session;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{SecretHasher, StoreError};

/// Persistence operations the session lifecycle depends on.
///
/// Implementations own expiry: records past their `expires` are evicted by
/// the store itself, the gateway never deletes sessions explicitly.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Find a session and check the presented plaintext secret against the
    /// stored hash. Unknown ids must still cost one hash computation.
    async fn find_by_id_and_secret(&self, id: &str, secret: &[u8]) -> Result<Session, StoreError>;

    /// Hash the plaintext secret of `session`, then persist it
    async fn create_with_unhashed_secret(&self, session: &Session) -> Result<(), StoreError>;

    /// Overwrite token and expiry fields of an existing session
    async fn refresh(&self, session: &Session) -> Result<(), StoreError>;
}

/// Session store backed by a concurrent in-process map
pub struct MemorySessionStore {
    sessions: DashMap<String, Session>,
    hasher: SecretHasher,
    // Grace period after `expires` during which a session can still be refreshed
    retention: ChronoDuration,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(SecretHasher::default())
    }
}

impl MemorySessionStore {
    pub fn new(hasher: SecretHasher) -> Self {
        Self {
            sessions: DashMap::new(),
            hasher,
            retention: ChronoDuration::zero(),
        }
    }

    pub fn with_retention(mut self, retention: ChronoDuration) -> Self {
        self.retention = retention;
        self
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Remove every session whose expiry plus retention has passed
    pub fn sweep_expired(&self) -> usize {
        let cutoff = Utc::now() - self.retention;
        let before = self.sessions.len();

        self.sessions.retain(|_, session| session.expires > cutoff);

        before.saturating_sub(self.sessions.len())
    }

    /// Run [`Self::sweep_expired`] on a fixed interval for the lifetime of the runtime
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let expired_count = store.sweep_expired();
                if expired_count > 0 {
                    tracing::info!("Cleaned up {} expired sessions", expired_count);
                }
            }
        })
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn find_by_id_and_secret(&self, id: &str, secret: &[u8]) -> Result<Session, StoreError> {
        let stored = self.sessions.get(id).map(|entry| entry.value().clone());

        let session = match stored {
            Some(session) => session,
            None => {
                self.hasher.dummy_hash_blocking().await;
                tracing::debug!(session_id = %id, "session not found");
                return Err(StoreError::NotFound);
            }
        };

        let hash = String::from_utf8(session.secret.clone()).unwrap_or_default();
        if !self.hasher.verify_blocking(secret.to_vec(), hash).await {
            tracing::debug!(session_id = %id, "session secret mismatch");
            return Err(StoreError::NotFound);
        }

        Ok(session)
    }

    async fn create_with_unhashed_secret(&self, session: &Session) -> Result<(), StoreError> {
        let hash = self.hasher.hash_blocking(session.secret.clone()).await?;

        let mut stored = session.clone();
        stored.secret = hash.into_bytes();

        match self.sessions.entry(stored.id.clone()) {
            Entry::Occupied(_) => {
                return Err(StoreError::Backend(format!("duplicate session id {}", stored.id)));
            }
            Entry::Vacant(slot) => {
                slot.insert(stored);
            }
        }

        tracing::debug!(session_id = %session.id, user_id = %session.user_id, "session created");
        Ok(())
    }

    async fn refresh(&self, session: &Session) -> Result<(), StoreError> {
        let mut entry = self.sessions.get_mut(&session.id).ok_or(StoreError::NotFound)?;
        let stored = entry.value_mut();

        stored.access_token = session.access_token.clone();
        stored.refresh_token = session.refresh_token.clone();
        stored.expires = session.expires;

        Ok(())
    }
}
