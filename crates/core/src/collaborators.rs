//! Host-side collaborators.
//!
//! The engine never owns the application's data. It reads the live state
//! through a [`StateSource`], writes restored state back through an
//! [`EntityStore`], and asks the host to reload through a [`ReinitSignal`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use safekeep_storage::StorageError;
use serde_json::Value;

use crate::state::{ApplicationStateSnapshot, Collection, EntityCollection};

/// Produces the current application state on demand.
#[async_trait]
pub trait StateSource: Send + Sync {
    async fn current_state(&self) -> ApplicationStateSnapshot;
}

/// Durable per-collection storage for the application's entities.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn load_collection(&self, collection: Collection)
        -> Result<EntityCollection, StorageError>;

    async fn save_collection(
        &self,
        collection: Collection,
        records: EntityCollection,
    ) -> Result<(), StorageError>;

    async fn load_settings(&self) -> Result<Option<Value>, StorageError>;

    async fn save_settings(&self, settings: Value) -> Result<(), StorageError>;

    /// Remove every collection and the settings.
    async fn clear_all(&self) -> Result<(), StorageError>;
}

/// Tells the host application to reload its state after a restore.
pub trait ReinitSignal: Send + Sync {
    fn reinitialize(&self);
}

/// Reinit signal for hosts that reload on their own; it only logs.
pub struct LogReinit;

impl ReinitSignal for LogReinit {
    fn reinitialize(&self) {
        tracing::info!("state restored; host reinitialization requested");
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// A state source holding a fixed snapshot that can be swapped out.
pub struct StaticStateSource {
    state: Mutex<ApplicationStateSnapshot>,
}

impl StaticStateSource {
    pub fn new(state: ApplicationStateSnapshot) -> Self {
        StaticStateSource {
            state: Mutex::new(state),
        }
    }

    pub fn replace(&self, state: ApplicationStateSnapshot) {
        *lock(&self.state) = state;
    }
}

#[async_trait]
impl StateSource for StaticStateSource {
    async fn current_state(&self) -> ApplicationStateSnapshot {
        lock(&self.state).clone()
    }
}

/// An entity store held in memory.
#[derive(Default)]
pub struct MemoryEntityStore {
    collections: Mutex<HashMap<Collection, EntityCollection>>,
    settings: Mutex<Option<Value>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        MemoryEntityStore::default()
    }

    /// Load every collection and the settings into one snapshot.
    pub fn snapshot(&self) -> ApplicationStateSnapshot {
        let collections = lock(&self.collections);
        let mut state = ApplicationStateSnapshot::empty();
        for c in Collection::ALL {
            if let Some(records) = collections.get(&c) {
                state = state.with_collection(c, records.clone());
            }
        }
        if let Some(settings) = lock(&self.settings).clone() {
            state = state.with_settings(settings);
        }
        state
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn load_collection(
        &self,
        collection: Collection,
    ) -> Result<EntityCollection, StorageError> {
        Ok(lock(&self.collections)
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_collection(
        &self,
        collection: Collection,
        records: EntityCollection,
    ) -> Result<(), StorageError> {
        lock(&self.collections).insert(collection, records);
        Ok(())
    }

    async fn load_settings(&self) -> Result<Option<Value>, StorageError> {
        Ok(lock(&self.settings).clone())
    }

    async fn save_settings(&self, settings: Value) -> Result<(), StorageError> {
        *lock(&self.settings) = Some(settings);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StorageError> {
        lock(&self.collections).clear();
        *lock(&self.settings) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_store_roundtrip_and_clear() {
        let store = MemoryEntityStore::new();
        store
            .save_collection(Collection::Menu, vec![json!({ "id": "d1" })].into())
            .await
            .unwrap();
        store.save_settings(json!({ "restaurantName": "Tasca" })).await.unwrap();

        let snap = store.snapshot();
        assert_eq!(snap.collection(Collection::Menu).len(), 1);
        assert_eq!(snap.settings()["restaurantName"], "Tasca");

        store.clear_all().await.unwrap();
        assert!(store.load_collection(Collection::Menu).await.unwrap().is_empty());
        assert!(store.load_settings().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn static_source_can_be_replaced() {
        let source = StaticStateSource::new(ApplicationStateSnapshot::empty());
        assert_eq!(source.current_state().await.record_count(), 0);
        source.replace(
            ApplicationStateSnapshot::empty()
                .with_collection(Collection::Users, vec![json!({ "id": "u1" })]),
        );
        assert_eq!(source.current_state().await.record_count(), 1);
    }
}
