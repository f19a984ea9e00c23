//! Key validation conformance tests.

use std::future::Future;

use super::TestResult;
use crate::{PersistenceBackend, StorageError};

pub(super) async fn run_key_tests<B, F, Fut>(factory: &F) -> Vec<TestResult>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    vec![
        TestResult::from_result(
            "keys",
            "path_separator_rejected",
            path_separator_rejected(factory).await,
        ),
        TestResult::from_result(
            "keys",
            "rejected_key_stores_nothing",
            rejected_key_stores_nothing(factory).await,
        ),
    ]
}

async fn path_separator_rejected<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    let b = factory().await;
    match b.put("mirror/backup_data_1", b"x").await {
        Err(StorageError::InvalidKey { .. }) => Ok(()),
        Err(e) => Err(format!("expected InvalidKey, got {e}")),
        Ok(()) => Err("key with '/' must be rejected".to_string()),
    }
}

async fn rejected_key_stores_nothing<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    let b = factory().await;
    let _ = b.put("../outside", b"x").await;
    let listed = b.list_keys("").await.map_err(|e| e.to_string())?;
    if !listed.is_empty() {
        return Err(format!("rejected write left keys behind: {listed:?}"));
    }
    Ok(())
}
