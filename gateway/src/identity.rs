//! Identity platform client.
//!
//! The gateway needs four things from the platform: exchanging a one-time
//! retrieval key for tokens, refreshing tokens, reading the user profile and
//! fetching webhook signing keys. [`IdentityPlatform`] is that capability;
//! [`HttpIdentityClient`] talks to the real API over `reqwest`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity platform request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity platform responded with {status}")]
    Status { status: StatusCode },

    #[error("invalid identity platform url: {0}")]
    Url(#[from] url::ParseError),
}

impl IdentityError {
    /// The platform answered and refused, as opposed to being unreachable
    pub fn is_rejection(&self) -> bool {
        matches!(self, IdentityError::Status { status } if status.is_client_error())
    }
}

/// Access token pair issued by the platform
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    #[serde(rename = "token")]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<REDACTED>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<REDACTED>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub person: Person,
}

#[derive(Debug, Clone, Deserialize)]
struct PublicKeyResponse {
    key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalKeyRequest<'a> {
    access_token_retrieval_key: &'a str,
    user_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[async_trait]
pub trait IdentityPlatform: Send + Sync {
    /// Exchange a one-time retrieval key for an access token pair
    async fn exchange_retrieval_key(
        &self,
        retrieval_key: &str,
        user_id: &str,
    ) -> Result<TokenGrant, IdentityError>;

    /// Exchange a refresh token for a new access token pair
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, IdentityError>;

    async fn get_user(&self, user_id: &str, access_token: &str) -> Result<UserProfile, IdentityError>;

    /// Base64 encoded public key registered under `serial`
    async fn public_key(&self, serial: &str) -> Result<String, IdentityError>;
}

/// [`IdentityPlatform`] over the platform's HTTP API
#[derive(Clone)]
pub struct HttpIdentityClient {
    client: reqwest::Client,
    base_url: Url,
    log_bodies: bool,
}

impl HttpIdentityClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            log_bodies: false,
        })
    }

    /// Debug-log response bodies. Bodies contain tokens; development only.
    pub fn with_body_logging(mut self, enabled: bool) -> Self {
        self.log_bodies = enabled;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, IdentityError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| IdentityError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, IdentityError> {
        let status = response.status();
        let url = response.url().path().to_string();

        if !status.is_success() {
            tracing::debug!(%status, path = %url, "identity platform rejected request");
            return Err(IdentityError::Status { status });
        }

        if self.log_bodies {
            let body = response.bytes().await?;
            tracing::debug!(path = %url, body = %redacted_body(&body), "identity platform response");
            return serde_json::from_slice(&body).map_err(|e| {
                tracing::warn!(path = %url, error = %e, "undecodable identity platform response");
                IdentityError::Status {
                    status: StatusCode::BAD_GATEWAY,
                }
            });
        }

        Ok(response.json::<T>().await?)
    }
}

/// Response fields that carry credentials
const REDACTED_FIELDS: &[&str] = &["token", "accessToken", "refreshToken"];

/// Loggable form of a response body, with credential fields masked
fn redacted_body(body: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(mut value) => {
            if let Some(object) = value.as_object_mut() {
                for field in REDACTED_FIELDS {
                    if let Some(slot) = object.get_mut(*field) {
                        *slot = serde_json::Value::from("<REDACTED>");
                    }
                }
            }
            value.to_string()
        }
        Err(_) => format!("<{} bytes, not json>", body.len()),
    }
}

#[async_trait]
impl IdentityPlatform for HttpIdentityClient {
    async fn exchange_retrieval_key(
        &self,
        retrieval_key: &str,
        user_id: &str,
    ) -> Result<TokenGrant, IdentityError> {
        let url = self.endpoint(&["v2", "authenticate", "token-retrieval-key"])?;
        let response = self
            .client
            .post(url)
            .json(&RetrievalKeyRequest {
                access_token_retrieval_key: retrieval_key,
                user_id,
            })
            .send()
            .await?;

        self.read_json(response).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, IdentityError> {
        let url = self.endpoint(&["v2", "users", "self", "credentials", "refresh"])?;
        let response = self
            .client
            .post(url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        self.read_json(response).await
    }

    async fn get_user(&self, user_id: &str, access_token: &str) -> Result<UserProfile, IdentityError> {
        let url = self.endpoint(&["v2", "users", user_id])?;
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?;

        self.read_json(response).await
    }

    async fn public_key(&self, serial: &str) -> Result<String, IdentityError> {
        let url = self.endpoint(&["v2", "public-keys", serial])?;
        let response = self.client.get(url).send().await?;

        let key: PublicKeyResponse = self.read_json(response).await?;
        Ok(key.key)
    }
}
