//! Entity store persisted in a [`PersistenceBackend`].
//!
//! Each collection is one JSON value under `entity_<collection>`; the
//! settings object lives under `entity_settings`.

use std::sync::Arc;

use async_trait::async_trait;
use safekeep_core::{Collection, EntityCollection, EntityStore};
use safekeep_storage::{keys, read_json, write_json, PersistenceBackend, StorageError};
use serde_json::Value;

const SETTINGS: &str = "settings";

pub struct BackendEntityStore {
    backend: Arc<dyn PersistenceBackend>,
}

impl BackendEntityStore {
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        BackendEntityStore { backend }
    }
}

#[async_trait]
impl EntityStore for BackendEntityStore {
    async fn load_collection(
        &self,
        collection: Collection,
    ) -> Result<EntityCollection, StorageError> {
        let value: Option<Value> =
            read_json(self.backend.as_ref(), &keys::entity(collection.as_str())).await?;
        Ok(value.map(EntityCollection::from_value).unwrap_or_default())
    }

    async fn save_collection(
        &self,
        collection: Collection,
        records: EntityCollection,
    ) -> Result<(), StorageError> {
        write_json(
            self.backend.as_ref(),
            &keys::entity(collection.as_str()),
            records.as_value(),
        )
        .await
    }

    async fn load_settings(&self) -> Result<Option<Value>, StorageError> {
        read_json(self.backend.as_ref(), &keys::entity(SETTINGS)).await
    }

    async fn save_settings(&self, settings: Value) -> Result<(), StorageError> {
        write_json(self.backend.as_ref(), &keys::entity(SETTINGS), &settings).await
    }

    async fn clear_all(&self) -> Result<(), StorageError> {
        for key in self.backend.list_keys(keys::ENTITY_PREFIX).await? {
            self.backend.delete(&key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safekeep_storage::MemoryBackend;
    use serde_json::json;

    #[tokio::test]
    async fn collections_and_settings_persist_under_entity_keys() {
        let backend = Arc::new(MemoryBackend::new("entities"));
        let store = BackendEntityStore::new(backend.clone());

        store
            .save_collection(Collection::Menu, vec![json!({"id": "d1", "price": 3})].into())
            .await
            .unwrap();
        store
            .save_settings(json!({"restaurantName": "Chez"}))
            .await
            .unwrap();
        backend.put("backup_list", b"[]").await.unwrap();

        assert_eq!(store.load_collection(Collection::Menu).await.unwrap().len(), 1);
        assert!(store.load_collection(Collection::Orders).await.unwrap().is_empty());
        assert_eq!(
            backend.list_keys("entity_").await.unwrap(),
            vec!["entity_menu".to_string(), "entity_settings".to_string()]
        );

        store.clear_all().await.unwrap();
        assert!(store.load_settings().await.unwrap().is_none());
        assert_eq!(backend.list_keys("").await.unwrap(), vec!["backup_list".to_string()]);
    }
}
