//! Prefix listing conformance tests.

use std::future::Future;

use super::TestResult;
use crate::keys;
use crate::PersistenceBackend;

pub(super) async fn run_listing_tests<B, F, Fut>(factory: &F) -> Vec<TestResult>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    vec![
        TestResult::from_result(
            "listing",
            "empty_backend_lists_nothing",
            empty_backend_lists_nothing(factory).await,
        ),
        TestResult::from_result(
            "listing",
            "prefix_filters_exactly",
            prefix_filters_exactly(factory).await,
        ),
        TestResult::from_result(
            "listing",
            "listing_is_sorted",
            listing_is_sorted(factory).await,
        ),
    ]
}

async fn empty_backend_lists_nothing<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    let b = factory().await;
    let listed = b.list_keys("").await.map_err(|e| e.to_string())?;
    if !listed.is_empty() {
        return Err(format!("expected no keys, got {listed:?}"));
    }
    Ok(())
}

async fn prefix_filters_exactly<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    let b = factory().await;
    for key in [
        keys::backup_data("b1"),
        keys::backup_meta("b1"),
        keys::backup_data("b2"),
        keys::BACKUP_LIST.to_string(),
    ] {
        b.put(&key, b"x").await.map_err(|e| e.to_string())?;
    }
    let listed = b
        .list_keys(keys::BACKUP_DATA_PREFIX)
        .await
        .map_err(|e| e.to_string())?;
    let expected = vec![keys::backup_data("b1"), keys::backup_data("b2")];
    if listed != expected {
        return Err(format!("expected {expected:?}, got {listed:?}"));
    }
    Ok(())
}

async fn listing_is_sorted<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    let b = factory().await;
    for key in ["entity_menu", "entity_categories", "entity_users"] {
        b.put(key, b"[]").await.map_err(|e| e.to_string())?;
    }
    let listed = b
        .list_keys(keys::ENTITY_PREFIX)
        .await
        .map_err(|e| e.to_string())?;
    let mut sorted = listed.clone();
    sorted.sort();
    if listed != sorted || listed.len() != 3 {
        return Err(format!("expected 3 sorted keys, got {listed:?}"));
    }
    Ok(())
}
