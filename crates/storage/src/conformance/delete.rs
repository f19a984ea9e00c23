//! Delete conformance tests.

use std::future::Future;

use super::TestResult;
use crate::PersistenceBackend;

pub(super) async fn run_delete_tests<B, F, Fut>(factory: &F) -> Vec<TestResult>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    vec![
        TestResult::from_result(
            "delete",
            "delete_removes_value",
            delete_removes_value(factory).await,
        ),
        TestResult::from_result(
            "delete",
            "delete_missing_reports_false",
            delete_missing_reports_false(factory).await,
        ),
        TestResult::from_result(
            "delete",
            "delete_leaves_siblings",
            delete_leaves_siblings(factory).await,
        ),
    ]
}

async fn delete_removes_value<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    let b = factory().await;
    b.put("report_1", b"{}").await.map_err(|e| e.to_string())?;
    let removed = b.delete("report_1").await.map_err(|e| e.to_string())?;
    if !removed {
        return Err("delete of a present key must report true".to_string());
    }
    if b.get("report_1").await.map_err(|e| e.to_string())?.is_some() {
        return Err("value still readable after delete".to_string());
    }
    Ok(())
}

async fn delete_missing_reports_false<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    let b = factory().await;
    match b.delete("report_absent").await {
        Ok(false) => Ok(()),
        Ok(true) => Err("delete of an absent key must report false".to_string()),
        Err(e) => Err(format!("delete of an absent key must not fail: {e}")),
    }
}

async fn delete_leaves_siblings<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    let b = factory().await;
    b.put("backup_data_a", b"a").await.map_err(|e| e.to_string())?;
    b.put("backup_data_b", b"b").await.map_err(|e| e.to_string())?;
    b.delete("backup_data_a").await.map_err(|e| e.to_string())?;
    let listed = b.list_keys("backup_data_").await.map_err(|e| e.to_string())?;
    if listed != vec!["backup_data_b".to_string()] {
        return Err(format!("expected only backup_data_b, got {listed:?}"));
    }
    Ok(())
}
