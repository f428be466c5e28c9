// gateway/src/store/instance.rs
use async_trait::async_trait;
use common::models::instance::ExtensionInstance;
use dashmap::DashMap;

use super::StoreError;

/// Extension instance records, mutated only by verified webhooks
#[async_trait]
pub trait InstanceStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<ExtensionInstance, StoreError>;

    /// Insert a new instance; an existing record with the same id is replaced
    async fn add(&self, instance: ExtensionInstance) -> Result<(), StoreError>;

    async fn update(&self, instance: ExtensionInstance) -> Result<(), StoreError>;

    async fn remove_by_id(&self, id: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryInstanceStore {
    instances: DashMap<String, ExtensionInstance>,
}

impl MemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[async_trait]
impl InstanceStore for MemoryInstanceStore {
    async fn find_by_id(&self, id: &str) -> Result<ExtensionInstance, StoreError> {
        self.instances
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn add(&self, instance: ExtensionInstance) -> Result<(), StoreError> {
        if let Some(previous) = self.instances.insert(instance.id.clone(), instance) {
            tracing::debug!(instance_id = %previous.id, "replaced existing instance");
        }
        Ok(())
    }

    async fn update(&self, instance: ExtensionInstance) -> Result<(), StoreError> {
        let mut entry = self.instances.get_mut(&instance.id).ok_or(StoreError::NotFound)?;
        *entry.value_mut() = instance;
        Ok(())
    }

    async fn remove_by_id(&self, id: &str) -> Result<(), StoreError> {
        self.instances.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::instance::InstanceContext;

    fn instance(id: &str) -> ExtensionInstance {
        ExtensionInstance {
            id: id.to_string(),
            enabled: true,
            context: InstanceContext {
                id: "C1".to_string(),
                kind: "project".to_string(),
            },
            scopes: vec!["user:read".to_string()],
            secret: b"secret".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_add_and_find() {
        let store = MemoryInstanceStore::new();
        store.add(instance("I1")).await.unwrap();

        let found = store.find_by_id("I1").await.unwrap();
        assert_eq!(found, instance("I1"));
        assert!(matches!(store.find_by_id("I2").await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_add_replaces_existing() {
        let store = MemoryInstanceStore::new();
        store.add(instance("I1")).await.unwrap();

        let mut changed = instance("I1");
        changed.enabled = false;
        store.add(changed).await.unwrap();

        assert_eq!(store.len(), 1);
        assert!(!store.find_by_id("I1").await.unwrap().enabled);
    }

    #[tokio::test]
    async fn test_update_requires_existing_record() {
        let store = MemoryInstanceStore::new();
        assert!(matches!(store.update(instance("I1")).await, Err(StoreError::NotFound)));

        store.add(instance("I1")).await.unwrap();
        let mut changed = instance("I1");
        changed.scopes = vec![];
        store.update(changed).await.unwrap();

        assert!(store.find_by_id("I1").await.unwrap().scopes.is_empty());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = MemoryInstanceStore::new();
        store.add(instance("I1")).await.unwrap();

        store.remove_by_id("I1").await.unwrap();
        store.remove_by_id("I1").await.unwrap();
        assert!(store.is_empty());
    }
}
