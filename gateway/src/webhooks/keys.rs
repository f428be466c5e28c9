// gateway/src/webhooks/keys.rs
use async_trait::async_trait;
use dashmap::DashMap;
use ed25519_dalek::VerifyingKey;
use std::sync::Arc;

use crate::identity::{IdentityError, IdentityPlatform};

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("public key lookup failed: {0}")]
    Lookup(#[from] IdentityError),

    #[error("malformed public key: {0}")]
    Malformed(String),
}

/// Resolves the public key a webhook sender signed with
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn public_key_for_serial(&self, serial: &str) -> Result<VerifyingKey, KeyError>;
}

/// Fetches keys from the identity platform on every call
pub struct PlatformKeyProvider {
    platform: Arc<dyn IdentityPlatform>,
}

impl PlatformKeyProvider {
    pub fn new(platform: Arc<dyn IdentityPlatform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl KeyProvider for PlatformKeyProvider {
    async fn public_key_for_serial(&self, serial: &str) -> Result<VerifyingKey, KeyError> {
        let encoded = self.platform.public_key(serial).await?;
        decode_public_key(&encoded)
    }
}

/// Parse a standard base64 encoded raw Ed25519 public key
pub fn decode_public_key(encoded: &str) -> Result<VerifyingKey, KeyError> {
    let raw = base64::decode(encoded.trim())
        .map_err(|e| KeyError::Malformed(format!("invalid base64: {}", e)))?;

    let bytes: [u8; 32] = raw
        .as_slice()
        .try_into()
        .map_err(|_| KeyError::Malformed(format!("expected 32 bytes, got {}", raw.len())))?;

    VerifyingKey::from_bytes(&bytes).map_err(|e| KeyError::Malformed(e.to_string()))
}

/// Memoizing [`KeyProvider`].
///
/// Keys never expire; a serial always names the same key. Concurrent misses
/// for one serial may both reach the inner provider, the map stays consistent.
pub struct CachingKeyProvider<P> {
    inner: P,
    cache: DashMap<String, VerifyingKey>,
}

impl<P: KeyProvider> CachingKeyProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait]
impl<P: KeyProvider> KeyProvider for CachingKeyProvider<P> {
    async fn public_key_for_serial(&self, serial: &str) -> Result<VerifyingKey, KeyError> {
        if let Some(key) = self.cache.get(serial) {
            return Ok(*key.value());
        }

        let key = self.inner.public_key_for_serial(serial).await?;
        self.cache.insert(serial.to_string(), key);
        tracing::debug!(serial = %serial, "cached webhook public key");

        Ok(key)
    }
}
