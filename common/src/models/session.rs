// common/src/models/session.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::assertion::{AssertionClaims, ASSERTION_ISSUER};
use crate::models::instance::InstanceSnapshot;
use crate::utils::generate_secret;

/// Number of random bytes in a freshly generated session secret
pub const SESSION_SECRET_LEN: usize = 64;

/// One authenticated browser.
///
/// `secret` holds the plaintext secret only on a session returned by
/// [`Session::new`]. Session stores replace it with a slow hash before
/// persisting, so a session read back from a store carries the hash.
#[derive(Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub secret: Vec<u8>,
    pub expires: DateTime<Utc>,
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub instance: InstanceSnapshot,
}

impl Session {
    /// Create an empty session with a fresh identifier and random secret
    pub fn new() -> Result<Self, rand::Error> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            secret: generate_secret(SESSION_SECRET_LEN)?,
            expires: Utc::now(),
            user_id: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            access_token: String::new(),
            refresh_token: None,
            instance: InstanceSnapshot::default(),
        })
    }

    /// Cookie value in the form `id:HEXSECRET`, URL-escaped
    pub fn cookie_string(&self) -> String {
        let raw = format!("{}:{}", self.id, hex::encode_upper(&self.secret));
        urlencoding::encode(&raw).into_owned()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Claim set forwarded to upstreams, valid until the session expires
    pub fn issue_assertion(&self) -> AssertionClaims {
        self.issue_assertion_at(Utc::now())
    }

    pub fn issue_assertion_at(&self, now: DateTime<Utc>) -> AssertionClaims {
        let issued_at = now.timestamp();

        AssertionClaims {
            iss: ASSERTION_ISSUER.to_string(),
            sub: self.user_id.clone(),
            iat: issued_at,
            nbf: issued_at,
            exp: self.expires.timestamp(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            access_token: self.access_token.clone(),
            instance: self.instance.clone(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("secret", &"<REDACTED>")
            .field("expires", &self.expires)
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("access_token", &"<REDACTED>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<REDACTED>"))
            .field("instance", &self.instance)
            .finish()
    }
}

/// Session id and plaintext secret as presented by a browser cookie
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub id: String,
    pub secret: Vec<u8>,
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("id", &self.id)
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

/// Inverse of [`Session::cookie_string`].
///
/// Returns `None` for anything that is not `id:HEX` after unescaping.
pub fn parse_cookie_string(value: &str) -> Option<SessionCredentials> {
    let decoded = urlencoding::decode(value).ok()?;
    let (id, secret_hex) = decoded.split_once(':')?;
    if id.is_empty() || secret_hex.is_empty() {
        return None;
    }

    let secret = hex::decode(secret_hex).ok()?;

    Some(SessionCredentials {
        id: id.to_string(),
        secret,
    })
}
