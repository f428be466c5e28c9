// gateway/src/session_service.rs
use chrono::{Duration as ChronoDuration, Utc};
use common::models::instance::{InstanceContext, InstanceSnapshot};
use common::models::session::Session;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::identity::IdentityPlatform;
use crate::store::{InstanceStore, SessionStore, StoreError};

/// Creates sessions from retrieval keys and hands out valid sessions,
/// refreshing expired ones on the way.
#[derive(Clone)]
pub struct SessionService {
    identity: Arc<dyn IdentityPlatform>,
    sessions: Arc<dyn SessionStore>,
    instances: Arc<dyn InstanceStore>,
}

impl SessionService {
    pub fn new(
        identity: Arc<dyn IdentityPlatform>,
        sessions: Arc<dyn SessionStore>,
        instances: Arc<dyn InstanceStore>,
    ) -> Self {
        Self {
            identity,
            sessions,
            instances,
        }
    }

    /// Exchange a one-time retrieval key and persist a new session.
    ///
    /// The returned session still carries its plaintext secret, so the caller
    /// can encode it into the cookie.
    pub async fn initialize_from_retrieval_key(
        &self,
        retrieval_key: &str,
        user_id: &str,
        instance_id: &str,
    ) -> Result<Session, GatewayError> {
        let grant = self
            .identity
            .exchange_retrieval_key(retrieval_key, user_id)
            .await
            .map_err(|e| {
                if e.is_rejection() {
                    tracing::warn!(user_id = %user_id, error = %e, "retrieval key rejected");
                    GatewayError::unauthorized("invalid retrieval key").with_details(e)
                } else {
                    tracing::error!(user_id = %user_id, error = %e, "retrieval key exchange failed");
                    GatewayError::bad_gateway("identity platform unavailable").with_details(e)
                }
            })?;

        let instance = self.instances.find_by_id(instance_id).await.map_err(|e| match e {
            StoreError::NotFound => {
                tracing::warn!(instance_id = %instance_id, "session requested for unknown instance");
                GatewayError::not_found("instance not found")
                    .with_details(format!("no instance with id {}", instance_id))
            }
            other => GatewayError::internal("error loading instance").with_details(other),
        })?;

        let profile = self
            .identity
            .get_user(user_id, &grant.access_token)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, error = %e, "user profile lookup failed");
                GatewayError::internal("error initializing session").with_details(e)
            })?;

        let mut session = Session::new().map_err(|e| {
            tracing::error!(error = %e, "random source failure");
            GatewayError::internal("error initializing session")
        })?;

        session.expires = grant.expires_at;
        session.user_id = profile.user_id;
        session.first_name = profile.person.first_name;
        session.last_name = profile.person.last_name;
        session.email = profile.email.unwrap_or_default();
        session.access_token = grant.access_token;
        session.refresh_token = grant.refresh_token;
        session.instance = instance.snapshot();

        self.persist(&session).await?;

        tracing::info!(
            session_id = %session.id,
            user_id = %session.user_id,
            instance_id = %session.instance.id,
            "session initialized"
        );
        Ok(session)
    }

    /// Find the session behind a cookie, refreshing it when expired
    pub async fn retrieve_session(&self, id: &str, secret: &[u8]) -> Result<Session, GatewayError> {
        let session = self
            .sessions
            .find_by_id_and_secret(id, secret)
            .await
            .map_err(|e| GatewayError::unauthorized("invalid session").with_details(e))?;

        if session.is_expired() {
            tracing::debug!(session_id = %session.id, user_id = %session.user_id, "session expired, refreshing");
            return self.refresh_session(&session).await;
        }

        Ok(session)
    }

    /// Exchange the refresh token and write the new tokens back.
    ///
    /// Nothing is returned unless the store confirmed the write.
    pub async fn refresh_session(&self, session: &Session) -> Result<Session, GatewayError> {
        let refresh_token = session.refresh_token().ok_or_else(|| {
            tracing::debug!(session_id = %session.id, "expired session has no refresh token");
            GatewayError::unauthorized("no refresh token")
        })?;

        let grant = self.identity.refresh_token(refresh_token).await.map_err(|e| {
            tracing::warn!(session_id = %session.id, user_id = %session.user_id, error = %e, "token refresh failed");
            GatewayError::unauthorized("session refresh failed").with_details(e)
        })?;

        let mut refreshed = session.clone();
        refreshed.access_token = grant.access_token;
        refreshed.refresh_token = grant.refresh_token;
        refreshed.expires = grant.expires_at;

        if refreshed.is_expired() {
            tracing::warn!(session_id = %session.id, "identity platform issued already expired token");
            return Err(GatewayError::unauthorized("session refresh failed"));
        }

        self.sessions.refresh(&refreshed).await.map_err(|e| {
            tracing::error!(session_id = %session.id, error = %e, "storing refreshed session failed");
            GatewayError::internal("error storing refreshed session").with_details(e)
        })?;

        tracing::info!(session_id = %refreshed.id, user_id = %refreshed.user_id, "session refreshed");
        Ok(refreshed)
    }

    /// Session for a fixed local user, used by the password and development logins
    pub async fn create_fake_session(&self, ttl: ChronoDuration) -> Result<Session, GatewayError> {
        let session = fake_session(ttl).map_err(|e| {
            tracing::error!(error = %e, "random source failure");
            GatewayError::internal("error initializing session")
        })?;

        self.persist(&session).await?;

        tracing::info!(session_id = %session.id, user_id = %session.user_id, "fake session created");
        Ok(session)
    }

    async fn persist(&self, session: &Session) -> Result<(), GatewayError> {
        self.sessions.create_with_unhashed_secret(session).await.map_err(|e| {
            tracing::error!(session_id = %session.id, error = %e, "storing session failed");
            GatewayError::internal("error creating session").with_details(e)
        })
    }
}

fn fake_session(ttl: ChronoDuration) -> Result<Session, rand::Error> {
    let mut session = Session::new()?;

    session.expires = Utc::now() + ttl;
    session.email = "user@mstudio.example".to_string();
    session.user_id = "522963df-3ebf-4158-80cc-1e9a78aca9b5".to_string();
    session.first_name = "Max".to_string();
    session.last_name = "Mustermann".to_string();
    session.access_token = "fake-api-token".to_string();
    session.instance = InstanceSnapshot {
        id: "848821a6-7bbb-4b15-a267-7b67e14e5a27".to_string(),
        enabled: true,
        context: InstanceContext {
            id: "4a30329f-3bb7-4871-b9e2-e4815718e74a".to_string(),
            kind: "customer".to_string(),
        },
        scopes: Vec::new(),
    };

    Ok(session)
}
