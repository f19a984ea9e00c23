//! Round-trip conformance tests.

use std::future::Future;

use super::{binary_payload, TestResult};
use crate::keys;
use crate::{read_json, write_json, PersistenceBackend};

pub(super) async fn run_roundtrip_tests<B, F, Fut>(factory: &F) -> Vec<TestResult>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    vec![
        TestResult::from_result(
            "roundtrip",
            "binary_value_roundtrips",
            binary_value_roundtrips(factory).await,
        ),
        TestResult::from_result(
            "roundtrip",
            "missing_key_reads_none",
            missing_key_reads_none(factory).await,
        ),
        TestResult::from_result(
            "roundtrip",
            "overwrite_replaces_value",
            overwrite_replaces_value(factory).await,
        ),
        TestResult::from_result(
            "roundtrip",
            "empty_value_roundtrips",
            empty_value_roundtrips(factory).await,
        ),
        TestResult::from_result(
            "roundtrip",
            "json_helpers_roundtrip",
            json_helpers_roundtrip(factory).await,
        ),
    ]
}

async fn binary_value_roundtrips<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    let b = factory().await;
    let payload = binary_payload();
    let key = keys::backup_data("backup_1");
    b.put(&key, &payload).await.map_err(|e| e.to_string())?;
    let read = b.get(&key).await.map_err(|e| e.to_string())?;
    match read {
        Some(bytes) if bytes == payload => Ok(()),
        Some(bytes) => Err(format!(
            "value changed: wrote {} bytes, read {} bytes",
            payload.len(),
            bytes.len()
        )),
        None => Err("value missing after put".to_string()),
    }
}

async fn missing_key_reads_none<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    let b = factory().await;
    match b.get("backup_data_absent").await {
        Ok(None) => Ok(()),
        Ok(Some(_)) => Err("fresh backend returned a value".to_string()),
        Err(e) => Err(format!("missing key must be Ok(None), got error: {e}")),
    }
}

async fn overwrite_replaces_value<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    let b = factory().await;
    b.put(keys::BACKUP_LIST, b"[\"a\"]")
        .await
        .map_err(|e| e.to_string())?;
    b.put(keys::BACKUP_LIST, b"[\"a\",\"b\"]")
        .await
        .map_err(|e| e.to_string())?;
    let read = b
        .get(keys::BACKUP_LIST)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("value missing after overwrite")?;
    if read != b"[\"a\",\"b\"]" {
        return Err(format!(
            "expected second value, got {:?}",
            String::from_utf8_lossy(&read)
        ));
    }
    Ok(())
}

async fn empty_value_roundtrips<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    let b = factory().await;
    b.put("empty", b"").await.map_err(|e| e.to_string())?;
    match b.get("empty").await.map_err(|e| e.to_string())? {
        Some(bytes) if bytes.is_empty() => Ok(()),
        Some(bytes) => Err(format!("expected empty value, got {} bytes", bytes.len())),
        None => Err("empty value must still be present".to_string()),
    }
}

async fn json_helpers_roundtrip<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    let b = factory().await;
    let ids = vec!["backup_1".to_string(), "backup_2".to_string()];
    write_json(&b, keys::BACKUP_LIST, &ids)
        .await
        .map_err(|e| e.to_string())?;
    let read: Option<Vec<String>> = read_json(&b, keys::BACKUP_LIST)
        .await
        .map_err(|e| e.to_string())?;
    if read.as_ref() != Some(&ids) {
        return Err(format!("expected {ids:?}, got {read:?}"));
    }
    Ok(())
}
