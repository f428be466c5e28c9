//! Signed webhooks from the identity platform.
//!
//! A request is verified against the raw body first, decoded second and only
//! then applied to the instance store.

pub mod events;
pub mod keys;
pub mod verifier;

pub use events::{decode, DecodeError, Envelope, WebhookEvent};
pub use keys::{CachingKeyProvider, KeyError, KeyProvider, PlatformKeyProvider};
pub use verifier::{Verifier, VerifyError};

use common::models::instance::ExtensionInstance;

use crate::store::{InstanceStore, StoreError};

/// Apply a decoded event to the instance store
pub async fn apply(event: WebhookEvent, instances: &dyn InstanceStore) -> Result<(), StoreError> {
    match event {
        WebhookEvent::AddedToContext(event) => {
            let instance = ExtensionInstance {
                id: event.id,
                enabled: event.state.enabled,
                context: event.context.into(),
                scopes: event.consented_scopes,
                secret: event.secret.into_bytes(),
            };
            tracing::info!(instance_id = %instance.id, context_id = %instance.context.id, "extension instance added");
            instances.add(instance).await
        }
        WebhookEvent::InstanceUpdated(event) => {
            let mut instance = instances.find_by_id(&event.id).await?;
            instance.scopes = event.consented_scopes;
            instance.enabled = event.state.enabled;
            tracing::info!(instance_id = %instance.id, enabled = instance.enabled, "extension instance updated");
            instances.update(instance).await
        }
        WebhookEvent::SecretRotated(event) => {
            let mut instance = instances.find_by_id(&event.id).await?;
            instance.secret = event.secret.into_bytes();
            tracing::info!(instance_id = %instance.id, "extension instance secret rotated");
            instances.update(instance).await
        }
        WebhookEvent::RemovedFromContext(event) => {
            tracing::info!(instance_id = %event.id, "extension instance removed");
            instances.remove_by_id(&event.id).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryInstanceStore;

    const ADDED: &[u8] = br#"{"apiVersion":"v1","kind":"ExtensionAddedToContext","id":"I1","context":{"id":"C1","kind":"customer"},"consentedScopes":["a"],"state":{"enabled":true},"secret":"s3cr3t"}"#;

    async fn apply_body(store: &MemoryInstanceStore, body: &[u8]) -> Result<(), StoreError> {
        apply(decode(body).unwrap(), store).await
    }

    #[tokio::test]
    async fn test_added_creates_instance() {
        let store = MemoryInstanceStore::new();
        apply_body(&store, ADDED).await.unwrap();

        let instance = store.find_by_id("I1").await.unwrap();
        assert!(instance.enabled);
        assert_eq!(instance.scopes, vec!["a"]);
        assert_eq!(instance.context.id, "C1");
        assert_eq!(instance.secret, b"s3cr3t");
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let store = MemoryInstanceStore::new();
        apply_body(&store, ADDED).await.unwrap();

        apply_body(
            &store,
            br#"{"apiVersion":"v1","kind":"ExtensionInstanceUpdated","id":"I1","consentedScopes":["a","b"],"state":{"enabled":false}}"#,
        )
        .await
        .unwrap();
        let instance = store.find_by_id("I1").await.unwrap();
        assert!(!instance.enabled);
        assert_eq!(instance.scopes, vec!["a", "b"]);
        assert_eq!(instance.context.kind, "customer");

        apply_body(
            &store,
            br#"{"apiVersion":"v1","kind":"ExtensionInstanceSecretRotated","id":"I1","secret":"rotated"}"#,
        )
        .await
        .unwrap();
        assert_eq!(store.find_by_id("I1").await.unwrap().secret, b"rotated");

        apply_body(
            &store,
            br#"{"apiVersion":"v1","kind":"ExtensionInstanceRemovedFromContext","id":"I1"}"#,
        )
        .await
        .unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_update_of_unknown_instance_fails() {
        let store = MemoryInstanceStore::new();
        let result = apply_body(
            &store,
            br#"{"apiVersion":"v1","kind":"InstanceUpdated","id":"missing","state":{"enabled":true}}"#,
        )
        .await;

        assert!(matches!(result, Err(StoreError::NotFound)));
    }
}
