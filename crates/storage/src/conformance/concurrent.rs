use std::future::Future;
use std::sync::Arc;

use super::TestResult;
use crate::PersistenceBackend;

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<B, F, Fut>(factory: &F) -> Vec<TestResult>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "parallel_writes_to_distinct_keys_all_land",
            parallel_writes_to_distinct_keys_all_land(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "parallel_overwrites_leave_one_whole_value",
            parallel_overwrites_leave_one_whole_value(factory).await,
        ),
    ]
}

// ── Distinct keys ───────────────────────────────────────────────────────────

/// N tasks each write their own key; every value must be readable afterwards.
async fn parallel_writes_to_distinct_keys_all_land<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    let backend = Arc::new(factory().await);
    let mut handles = Vec::new();
    for i in 0..N {
        let b = backend.clone();
        handles.push(tokio::spawn(async move {
            let key = format!("backup_data_{i}");
            b.put(&key, format!("value-{i}").as_bytes()).await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("join: {e}"))?
            .map_err(|e| format!("put: {e}"))?;
    }

    for i in 0..N {
        let key = format!("backup_data_{i}");
        let value = backend
            .get(&key)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("{key} missing"))?;
        if value != format!("value-{i}").as_bytes() {
            return Err(format!("{key} holds the wrong value"));
        }
    }
    Ok(())
}

// ── Same key ────────────────────────────────────────────────────────────────

/// N tasks overwrite one key with distinct same-length values; the survivor
/// must be exactly one of them, never an interleaving.
async fn parallel_overwrites_leave_one_whole_value<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    let backend = Arc::new(factory().await);
    let mut handles = Vec::new();
    for i in 0..N {
        let b = backend.clone();
        handles.push(tokio::spawn(async move {
            let value = vec![i as u8; 1024];
            b.put("backup_list", &value).await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("join: {e}"))?
            .map_err(|e| format!("put: {e}"))?;
    }

    let value = backend
        .get("backup_list")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("value missing")?;
    let first = value.first().copied().ok_or("value is empty")?;
    if value.len() != 1024 || value.iter().any(|b| *b != first) {
        return Err("surviving value is an interleaving of writers".to_string());
    }
    Ok(())
}
