use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::error::StorageError;
use crate::keys::validate_key;
use crate::traits::PersistenceBackend;

/// In-memory backend with browser-storage semantics.
///
/// Values are held as base64 text in a string map, the way a web storage
/// area holds them, and an optional quota (in stored characters) makes
/// writes fail the way a full storage area does.
#[derive(Debug)]
pub struct MemoryBackend {
    name: String,
    quota: Option<usize>,
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryBackend {
    pub fn new(name: &str) -> Self {
        MemoryBackend {
            name: name.to_string(),
            quota: None,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Limit the total number of stored characters (keys + encoded values).
    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Total stored characters, as counted against the quota.
    pub fn used(&self) -> usize {
        self.lock().map(|m| usage(&m)).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Backend(format!("{}: lock poisoned", self.name)))
    }
}

fn usage(entries: &BTreeMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

#[async_trait]
impl PersistenceBackend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        validate_key(key)?;
        let encoded = BASE64.encode(value);
        let mut entries = self.lock()?;

        if let Some(quota) = self.quota {
            let current = usage(&entries) - entries.get(key).map_or(0, |v| key.len() + v.len());
            let needed = key.len() + encoded.len();
            if current + needed > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available: quota.saturating_sub(current),
                });
            }
        }

        entries.insert(key.to_string(), encoded);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        validate_key(key)?;
        let entries = self.lock()?;
        match entries.get(key) {
            Some(encoded) => BASE64
                .decode(encoded)
                .map(Some)
                .map_err(|e| StorageError::Corrupt {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        Ok(self.lock()?.remove(key).is_some())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let entries = self.lock()?;
        Ok(entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
