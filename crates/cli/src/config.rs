//! `safekeep.toml`: backend selection, secrets, replicas and engine tuning.
//!
//! ```toml
//! [storage]
//! backend = "filesystem"      # or "memory"
//! root = "./safekeep-data"
//! mirrors = 3
//! fallback = "./safekeep-fallback"
//!
//! [encryption]
//! secret_env = "SAFEKEEP_SECRET"
//!
//! [[remote.replicas]]
//! kind = "simulated"
//! name = "dr-site"
//!
//! [state]
//! source_file = "state.json"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use safekeep_core::{AlertChannel, AuditSink, EntityStore, MemoryAuditLog, StateSource};
use safekeep_engine::replica::SimulatedReplica;
use safekeep_engine::{
    BackendEntityStore, BackupEngine, EncryptionConfig, EngineConfig, RemoteReplica,
    ResilienceConfig, WatchdogConfig,
};
use safekeep_storage::{FsBackend, MemoryBackend, PersistenceBackend};
use serde::Deserialize;

use crate::source::FileStateSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Filesystem,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub backend: BackendKind,
    pub root: PathBuf,
    pub mirrors: usize,
    pub fallback: Option<PathBuf>,
}

impl Default for StorageSection {
    fn default() -> Self {
        StorageSection {
            backend: BackendKind::Filesystem,
            root: PathBuf::from("safekeep-data"),
            mirrors: 3,
            fallback: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EncryptionSection {
    pub secret: Option<String>,
    pub secret_env: Option<String>,
    #[serde(flatten)]
    pub params: EncryptionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReplicaSection {
    Http {
        id: String,
        base_url: String,
        #[serde(default)]
        auth_token_env: Option<String>,
    },
    Simulated {
        name: String,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    pub replicas: Vec<ReplicaSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AlertsSection {
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StateSection {
    /// JSON snapshot the live state is read from.
    pub source_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub storage: StorageSection,
    pub encryption: EncryptionSection,
    pub remote: RemoteSection,
    pub alerts: AlertsSection,
    pub state: StateSection,
    pub watchdog: WatchdogConfig,
    pub resilience: ResilienceConfig,
    pub max_snapshots: Option<usize>,
    pub mirror_quorum: Option<usize>,
}

impl FileConfig {
    pub fn engine_config(&self) -> EngineConfig {
        let defaults = EngineConfig::default();
        EngineConfig {
            encryption: self.encryption.params.clone(),
            resilience: self.resilience.clone(),
            watchdog: self.watchdog.clone(),
            max_snapshots: self.max_snapshots.unwrap_or(defaults.max_snapshots),
            mirror_quorum: self.mirror_quorum.unwrap_or(defaults.mirror_quorum),
            ..defaults
        }
    }

    fn secret(&self) -> Result<String, String> {
        if let Some(secret) = &self.encryption.secret {
            return Ok(secret.clone());
        }
        match &self.encryption.secret_env {
            Some(var) => std::env::var(var)
                .map_err(|_| format!("environment variable {var} (encryption.secret_env) is not set")),
            None => Err("no encryption secret configured: set encryption.secret or encryption.secret_env".into()),
        }
    }
}

/// Read and parse the configuration file at `path`.
pub fn load(path: &Path) -> Result<FileConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

fn backend(kind: BackendKind, path: PathBuf, name: &str) -> Arc<dyn PersistenceBackend> {
    match kind {
        BackendKind::Filesystem => Arc::new(FsBackend::new(path)),
        BackendKind::Memory => Arc::new(MemoryBackend::new(name)),
    }
}

fn replica(section: &ReplicaSection) -> Result<Arc<dyn RemoteReplica>, String> {
    match section {
        ReplicaSection::Simulated { name } => Ok(Arc::new(SimulatedReplica::new(name))),
        #[cfg(feature = "http")]
        ReplicaSection::Http {
            id,
            base_url,
            auth_token_env,
        } => {
            let token = auth_token_env.as_ref().and_then(|var| std::env::var(var).ok());
            Ok(Arc::new(safekeep_engine::replica::HttpReplica::new(
                id, base_url, token,
            )))
        }
        #[cfg(not(feature = "http"))]
        ReplicaSection::Http { id, .. } => Err(format!(
            "replica '{id}' needs HTTP support; rebuild with the `http` feature"
        )),
    }
}

/// Build the engine the configuration describes.
///
/// The backend is chosen here, once: every tier (primary, mirrors,
/// fallback, entity store) uses the configured kind.
pub fn build_engine(config: &FileConfig) -> Result<BackupEngine, String> {
    let storage = &config.storage;
    let primary = backend(storage.backend, storage.root.join("local"), "local");
    let entities: Arc<dyn EntityStore> = Arc::new(BackendEntityStore::new(backend(
        storage.backend,
        storage.root.join("entities"),
        "entities",
    )));

    let audit: Arc<dyn AuditSink> = Arc::new(MemoryAuditLog::new());
    let mut alerts = AlertChannel::new(Arc::clone(&audit));
    if let Some(url) = &config.alerts.webhook_url {
        #[cfg(feature = "http")]
        {
            alerts = alerts.with_notifier(Arc::new(safekeep_engine::notify::WebhookNotifier::new(url)));
        }
        #[cfg(not(feature = "http"))]
        tracing::warn!(url = %url, "webhook alerts need the `http` feature; ignoring");
    }

    let mut builder = BackupEngine::builder(config.engine_config())
        .secret(config.secret()?)
        .primary(primary)
        .entity_store(entities)
        .audit(audit)
        .alerts(Arc::new(alerts));

    if let Some(path) = &config.state.source_file {
        let source: Arc<dyn StateSource> = Arc::new(FileStateSource::new(path.clone()));
        builder = builder.state_source(source);
    }
    if let Some(path) = &storage.fallback {
        builder = builder.fallback(backend(storage.backend, path.clone(), "fallback"));
    }
    for n in 1..=storage.mirrors {
        builder = builder.mirror(backend(
            storage.backend,
            storage.root.join(format!("mirror-{n}")),
            &format!("mirror-{n}"),
        ));
    }
    for section in &config.remote.replicas {
        builder = builder.replica(replica(section)?);
    }

    builder.build().map_err(|e| e.to_string())
}
