// common/src/assertion.rs
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::instance::InstanceSnapshot;

/// Fixed issuer of every assertion minted by the gateway
pub const ASSERTION_ISSUER: &str = "mstudio";

/// Request header carrying the signed assertion to upstreams
pub const ASSERTION_HEADER: &str = "X-Mstudio-User";

/// The algorithm is policy and is not configurable
const ASSERTION_ALGORITHM: Algorithm = Algorithm::HS512;

/// Identity claims forwarded to upstreams
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub access_token: String,
    pub instance: InstanceSnapshot,
}

impl fmt::Debug for AssertionClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssertionClaims")
            .field("iss", &self.iss)
            .field("sub", &self.sub)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .field("exp", &self.exp)
            .field("email", &self.email)
            .field("access_token", &"<REDACTED>")
            .field("instance", &self.instance)
            .finish()
    }
}

/// Sign an assertion with the gateway's shared secret
pub fn sign_assertion(
    claims: &AssertionClaims,
    secret: &[u8],
) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(ASSERTION_ALGORITHM),
        claims,
        &EncodingKey::from_secret(secret),
    )
}

/// Validate an assertion as an upstream would: signature, issuer and time bounds
pub fn validate_assertion(
    token: &str,
    secret: &[u8],
) -> Result<AssertionClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(ASSERTION_ALGORITHM);
    validation.set_issuer(&[ASSERTION_ISSUER]);
    validation.validate_nbf = true;

    let token_data = decode::<AssertionClaims>(
        token,
        &DecodingKey::from_secret(secret),
        &validation,
    )?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn claims(exp_offset: i64) -> AssertionClaims {
        let now = Utc::now().timestamp();
        AssertionClaims {
            iss: ASSERTION_ISSUER.to_string(),
            sub: "u1".to_string(),
            iat: now,
            nbf: now,
            exp: now + exp_offset,
            first_name: "Max".to_string(),
            last_name: "Mustermann".to_string(),
            email: "max@example.com".to_string(),
            access_token: "token".to_string(),
            instance: InstanceSnapshot::default(),
        }
    }

    #[test]
    fn test_sign_and_validate() {
        let original = claims(600);
        let token = sign_assertion(&original, b"secret").unwrap();

        let validated = validate_assertion(&token, b"secret").unwrap();
        assert_eq!(validated, original);
    }

    #[test]
    fn test_header_uses_hs512() {
        let token = sign_assertion(&claims(600), b"secret").unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS512);
    }

    #[test]
    fn test_validate_rejects_wrong_secret() {
        let token = sign_assertion(&claims(600), b"secret").unwrap();
        assert!(validate_assertion(&token, b"other").is_err());
    }

    #[test]
    fn test_validate_rejects_expired() {
        let token = sign_assertion(&claims(-3600), b"secret").unwrap();
        assert!(validate_assertion(&token, b"secret").is_err());
    }

    #[test]
    fn test_validate_rejects_foreign_issuer() {
        let mut foreign = claims(600);
        foreign.iss = "someone-else".to_string();
        let token = sign_assertion(&foreign, b"secret").unwrap();
        assert!(validate_assertion(&token, b"secret").is_err());
    }
}
