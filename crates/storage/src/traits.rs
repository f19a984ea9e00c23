use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;

/// A flat key/value persistence tier.
///
/// Keys are short ASCII identifiers built by [`crate::keys`]; values are
/// opaque bytes. Implementations must make a completed `put` visible to every
/// later `get` on the same instance, and must never return a partially
/// written value.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a single backend can be
/// shared between the backup engine, the watchdog task, and mirror fan-out
/// tasks.
#[async_trait]
pub trait PersistenceBackend: Send + Sync + 'static {
    /// Short human-readable name, used in logs and tier reports.
    fn name(&self) -> &str;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Read the value under `key`. Returns `Ok(None)` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Remove `key`. Returns whether a value was present.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// List every stored key starting with `prefix`, sorted ascending.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Read and decode a JSON value stored under `key`.
pub async fn read_json<T: DeserializeOwned>(
    backend: &dyn PersistenceBackend,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match backend.get(key).await? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StorageError::Corrupt {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Encode `value` as JSON and store it under `key`.
pub async fn write_json<T: Serialize + Sync>(
    backend: &dyn PersistenceBackend,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec(value).map_err(|e| StorageError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    backend.put(key, &bytes).await
}
