// gateway/src/store/hasher.rs
use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;

use super::StoreError;

/// Input for the dummy computation on lookup misses
const DUMMY_SECRET: &[u8] = b"dummy session secret";

/// Slow, salted hashing of session secrets with Argon2id.
///
/// Verification goes through the PHC string, which compares in constant time.
#[derive(Debug, Clone)]
pub struct SecretHasher {
    params: Params,
}

impl Default for SecretHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl SecretHasher {
    /// Hasher with custom cost parameters (memory in KiB, iterations, lanes)
    pub fn with_params(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, StoreError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| StoreError::Hashing(format!("invalid parameters: {e}")))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a plaintext secret into a PHC string
    pub fn hash(&self, secret: &[u8]) -> Result<String, StoreError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2()
            .hash_password(secret, &salt)
            .map_err(|e| StoreError::Hashing(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// `true` only if `secret` is the exact plaintext behind `hash`
    pub fn verify(&self, secret: &[u8], hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };

        self.argon2().verify_password(secret, &parsed).is_ok()
    }

    /// Burn the same amount of work as a real verification
    pub fn dummy_hash(&self) {
        let _ = self.hash(DUMMY_SECRET);
    }

    /// [`Self::hash`] on the blocking pool, keeping the async worker free
    pub async fn hash_blocking(&self, secret: Vec<u8>) -> Result<String, StoreError> {
        let hasher = self.clone();
        offload(move || hasher.hash(&secret)).await?
    }

    /// [`Self::verify`] on the blocking pool; a failed task never verifies
    pub async fn verify_blocking(&self, secret: Vec<u8>, hash: String) -> bool {
        let hasher = self.clone();
        offload(move || hasher.verify(&secret, &hash))
            .await
            .unwrap_or(false)
    }

    /// [`Self::dummy_hash`] on the blocking pool
    pub async fn dummy_hash_blocking(&self) {
        let hasher = self.clone();
        let _ = offload(move || hasher.dummy_hash()).await;
    }
}

async fn offload<T, F>(work: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StoreError::Hashing(format!("hashing task failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> SecretHasher {
        SecretHasher::with_params(64, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash(b"secret").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify(b"secret", &hash));
        assert!(!hasher.verify(b"secreT", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let hasher = hasher();
        assert_ne!(hasher.hash(b"secret").unwrap(), hasher.hash(b"secret").unwrap());
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(!hasher().verify(b"secret", "not a phc string"));
    }

    #[tokio::test]
    async fn test_blocking_variants_agree() {
        let hasher = hasher();
        let hash = hasher.hash_blocking(b"secret".to_vec()).await.unwrap();

        assert!(hasher.verify_blocking(b"secret".to_vec(), hash.clone()).await);
        assert!(!hasher.verify_blocking(b"secreT".to_vec(), hash).await);
        hasher.dummy_hash_blocking().await;
    }

    #[test]
    fn test_invalid_params() {
        assert!(SecretHasher::with_params(0, 0, 0).is_err());
    }
}
