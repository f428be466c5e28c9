// gateway/tests/support/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use ed25519_dalek::{Signer, SigningKey};
use gateway::identity::{IdentityError, IdentityPlatform, Person, TokenGrant, UserProfile};
use gateway::options::AuthOptions;
use gateway::proxy::UpstreamClient;
use gateway::store::{InstanceStore, MemoryInstanceStore, MemorySessionStore, SecretHasher, SessionStore};
use gateway::webhooks::{CachingKeyProvider, PlatformKeyProvider};
use gateway::Gateway;
use common::models::instance::{ExtensionInstance, InstanceContext};
use common::models::session::Session;
use common::UpstreamConfig;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const SIGNING_SECRET: &[u8] = b"integration signing secret";
pub const COOKIE_NAME: &str = "mstudio_ext_session";
pub const KEY_SERIAL: &str = "serial-1";

/// In-process stand-in for the identity platform
pub struct FakePlatform {
    pub signing_key: SigningKey,
    pub refresh_calls: AtomicUsize,
    pub key_lookups: AtomicUsize,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&[9u8; 32]),
            refresh_calls: AtomicUsize::new(0),
            key_lookups: AtomicUsize::new(0),
        }
    }
}

impl FakePlatform {
    /// Base64 signature over `body`, as the platform would send it
    pub fn sign(&self, body: &[u8]) -> String {
        base64::encode(self.signing_key.sign(body).to_bytes())
    }
}

#[async_trait]
impl IdentityPlatform for FakePlatform {
    async fn exchange_retrieval_key(
        &self,
        retrieval_key: &str,
        _user_id: &str,
    ) -> Result<TokenGrant, IdentityError> {
        if retrieval_key != "valid-atrek" {
            return Err(IdentityError::Status {
                status: StatusCode::FORBIDDEN,
            });
        }

        Ok(TokenGrant {
            access_token: "access-1".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            expires_at: Utc::now() + ChronoDuration::hours(1),
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, IdentityError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if refresh_token != "refresh-1" {
            return Err(IdentityError::Status {
                status: StatusCode::UNAUTHORIZED,
            });
        }

        Ok(TokenGrant {
            access_token: "access-2".to_string(),
            refresh_token: Some("refresh-2".to_string()),
            expires_at: Utc::now() + ChronoDuration::hours(1),
        })
    }

    async fn get_user(&self, user_id: &str, _access_token: &str) -> Result<UserProfile, IdentityError> {
        Ok(UserProfile {
            user_id: user_id.to_string(),
            email: Some("max@example.com".to_string()),
            person: Person {
                first_name: "Max".to_string(),
                last_name: "Mustermann".to_string(),
            },
        })
    }

    async fn public_key(&self, serial: &str) -> Result<String, IdentityError> {
        self.key_lookups.fetch_add(1, Ordering::SeqCst);
        if serial != KEY_SERIAL {
            return Err(IdentityError::Status {
                status: StatusCode::NOT_FOUND,
            });
        }

        Ok(base64::encode(self.signing_key.verifying_key().as_bytes()))
    }
}

pub fn auth_options() -> AuthOptions {
    AuthOptions {
        cookie_name: COOKIE_NAME.to_string(),
        cookie_ttl: ChronoDuration::minutes(60),
        signing_secret: SIGNING_SECRET.to_vec(),
        static_password: None,
        development: false,
        redirect_on_unauthenticated: None,
    }
}

pub fn upstream(url: &str, strip_prefix: &str) -> UpstreamConfig {
    UpstreamConfig {
        upstream_url: url.parse().unwrap(),
        strip_prefix: strip_prefix.to_string(),
    }
}

/// Gateway over in-memory stores and the fake platform
pub struct Harness {
    pub gateway: Gateway,
    pub platform: Arc<FakePlatform>,
    pub sessions: Arc<MemorySessionStore>,
    pub instances: Arc<MemoryInstanceStore>,
}

impl Harness {
    pub fn new(options: AuthOptions, routes: Vec<(String, UpstreamConfig)>) -> Self {
        let platform = Arc::new(FakePlatform::default());
        let sessions = Arc::new(MemorySessionStore::new(
            SecretHasher::with_params(64, 1, 1).unwrap(),
        ));
        let instances = Arc::new(MemoryInstanceStore::new());
        let keys = Arc::new(CachingKeyProvider::new(PlatformKeyProvider::new(platform.clone())));

        let gateway = Gateway::new(
            options,
            platform.clone(),
            sessions.clone(),
            instances.clone(),
            keys,
            UpstreamClient::new(Duration::from_secs(2)).unwrap(),
            routes,
        );

        Self {
            gateway,
            platform,
            sessions,
            instances,
        }
    }

    pub async fn add_instance(&self, id: &str) {
        self.instances
            .add(ExtensionInstance {
                id: id.to_string(),
                enabled: true,
                context: InstanceContext {
                    id: "C1".to_string(),
                    kind: "project".to_string(),
                },
                scopes: vec!["a".to_string()],
                secret: b"instance secret".to_vec(),
            })
            .await
            .unwrap();
    }

    /// Store a session directly and return its cookie value
    pub async fn seed_session(&self, expires_in: ChronoDuration, refresh_token: Option<&str>) -> Session {
        let mut session = Session::new().unwrap();
        session.user_id = "u1".to_string();
        session.first_name = "Max".to_string();
        session.last_name = "Mustermann".to_string();
        session.email = "max@example.com".to_string();
        session.access_token = "access-1".to_string();
        session.refresh_token = refresh_token.map(str::to_string);
        session.expires = Utc::now() + expires_in;
        session.instance.id = "I1".to_string();

        self.sessions.create_with_unhashed_secret(&session).await.unwrap();
        session
    }
}
