// gateway/src/webhooks/verifier.rs
use actix_web::http::header::HeaderMap;
use ed25519_dalek::Signature;
use std::sync::Arc;

use super::keys::{KeyError, KeyProvider};

pub const SIGNATURE_SERIAL_HEADER: &str = "X-Marketplace-Signature-Serial";
pub const SIGNATURE_ALGORITHM_HEADER: &str = "X-Marketplace-Signature-Algorithm";
pub const SIGNATURE_HEADER: &str = "X-Marketplace-Signature";

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("missing header {0}")]
    MissingHeader(&'static str),

    #[error("could not resolve key {serial}: {source}")]
    KeyResolution {
        serial: String,
        #[source]
        source: KeyError,
    },

    #[error("signature is not valid base64")]
    SignatureEncoding,

    #[error("unsupported signature algorithm {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("signature does not match payload")]
    Mismatch,
}

impl VerifyError {
    /// Key lookup failed, likely a platform or network problem rather than a forged request
    pub fn is_key_resolution(&self) -> bool {
        matches!(self, VerifyError::KeyResolution { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Algorithm {
    Ed25519,
}

impl Algorithm {
    fn parse(name: &str) -> Result<Self, VerifyError> {
        match name {
            "Ed25519" => Ok(Algorithm::Ed25519),
            other => Err(VerifyError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Checks inbound webhook signatures against keys from a [`KeyProvider`]
#[derive(Clone)]
pub struct Verifier {
    keys: Arc<dyn KeyProvider>,
}

impl Verifier {
    pub fn new(keys: Arc<dyn KeyProvider>) -> Self {
        Self { keys }
    }

    /// Verify `body`, the exact bytes received, against the signature headers.
    pub async fn verify_request(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), VerifyError> {
        let serial = required_header(headers, SIGNATURE_SERIAL_HEADER)?;
        let algorithm = required_header(headers, SIGNATURE_ALGORITHM_HEADER)?;
        let signature = required_header(headers, SIGNATURE_HEADER)?;

        let key = self
            .keys
            .public_key_for_serial(serial)
            .await
            .map_err(|source| VerifyError::KeyResolution {
                serial: serial.to_string(),
                source,
            })?;

        let raw = base64::decode(signature.trim()).map_err(|_| VerifyError::SignatureEncoding)?;

        match Algorithm::parse(algorithm)? {
            Algorithm::Ed25519 => {
                let signature =
                    Signature::from_slice(&raw).map_err(|_| VerifyError::SignatureEncoding)?;
                key.verify_strict(body, &signature)
                    .map_err(|_| VerifyError::Mismatch)
            }
        }
    }
}

fn required_header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, VerifyError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or(VerifyError::MissingHeader(name))
}
