#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use safekeep_core::{
    ApplicationStateSnapshot, Collection, EncryptionKey, MemoryAuditLog, MemoryEntityStore,
    ReinitSignal, StaticStateSource,
};
use safekeep_engine::{BackupEngine, EngineConfig, RemoteReplica};
use safekeep_storage::{MemoryBackend, PersistenceBackend};
use serde_json::{json, Value};

#[derive(Default)]
pub struct CountingReinit(AtomicUsize);

impl CountingReinit {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl ReinitSignal for CountingReinit {
    fn reinitialize(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// An engine over in-memory backends with every collaborator reachable.
pub struct Rig {
    pub engine: Arc<BackupEngine>,
    pub primary: Arc<MemoryBackend>,
    pub fallback: Arc<MemoryBackend>,
    pub mirrors: Vec<Arc<MemoryBackend>>,
    pub store: Arc<MemoryEntityStore>,
    pub source: Arc<StaticStateSource>,
    pub audit: Arc<MemoryAuditLog>,
    pub reinit: Arc<CountingReinit>,
}

pub struct RigBuilder {
    mirrors: Vec<Arc<MemoryBackend>>,
    replicas: Vec<Arc<dyn RemoteReplica>>,
    state: ApplicationStateSnapshot,
}

impl RigBuilder {
    pub fn mirror(mut self, mirror: MemoryBackend) -> Self {
        self.mirrors.push(Arc::new(mirror));
        self
    }

    pub fn replica(mut self, replica: Arc<dyn RemoteReplica>) -> Self {
        self.replicas.push(replica);
        self
    }

    pub fn state(mut self, state: ApplicationStateSnapshot) -> Self {
        self.state = state;
        self
    }

    pub fn build(self) -> Rig {
        let primary = Arc::new(MemoryBackend::new("primary"));
        let fallback = Arc::new(MemoryBackend::new("fallback"));
        let store = Arc::new(MemoryEntityStore::new());
        let source = Arc::new(StaticStateSource::new(self.state));
        let audit = Arc::new(MemoryAuditLog::new());
        let reinit = Arc::new(CountingReinit::default());

        let mut builder = BackupEngine::builder(EngineConfig::default())
            .key(EncryptionKey::from_bytes([9u8; 32]))
            .primary(primary.clone())
            .fallback(fallback.clone())
            .entity_store(store.clone())
            .state_source(source.clone())
            .audit(audit.clone())
            .reinit(reinit.clone());
        for mirror in &self.mirrors {
            builder = builder.mirror(mirror.clone() as Arc<dyn PersistenceBackend>);
        }
        for replica in self.replicas {
            builder = builder.replica(replica);
        }

        Rig {
            engine: Arc::new(builder.build().expect("engine builds")),
            primary,
            fallback,
            mirrors: self.mirrors,
            store,
            source,
            audit,
            reinit,
        }
    }
}

pub fn rig() -> RigBuilder {
    RigBuilder {
        mirrors: Vec::new(),
        replicas: Vec::new(),
        state: restaurant("Chez Test"),
    }
}

/// A rig with three healthy mirrors.
pub fn raid_rig() -> RigBuilder {
    (1..=3).fold(rig(), |b, i| b.mirror(MemoryBackend::new(&format!("mirror{i}"))))
}

pub fn categories() -> Vec<Value> {
    vec![
        json!({"id": "cat-1", "name": "Starters"}),
        json!({"id": "cat-2", "name": "Mains"}),
    ]
}

pub fn dishes() -> Vec<Value> {
    vec![
        json!({"id": "dish-1", "name": "Soup", "price": 6.5, "categoryId": "cat-1"}),
        json!({"id": "dish-2", "name": "Steak", "price": 24, "categoryId": "cat-2"}),
        json!({"id": "dish-3", "name": "Risotto", "price": 18, "categoryId": "cat-2"}),
    ]
}

/// A valid state with 2 categories and 3 dishes, named `name`.
pub fn restaurant(name: &str) -> ApplicationStateSnapshot {
    ApplicationStateSnapshot::empty()
        .with_collection(Collection::Categories, categories())
        .with_collection(Collection::Menu, dishes())
        .with_settings(json!({"restaurantName": name, "currency": "EUR"}))
}

/// `restaurant(name)` with one dish priced below zero.
pub fn broken_restaurant(name: &str) -> ApplicationStateSnapshot {
    let mut menu = dishes();
    menu[1]["price"] = json!(-1);
    restaurant(name).with_collection(Collection::Menu, menu)
}
