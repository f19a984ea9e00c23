//! Conformance test suite for `PersistenceBackend` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `PersistenceBackend` implementation can run to verify the guarantees the
//! backup engine relies on:
//!
//! - **Round-trip**: stored bytes come back unchanged, including binary data
//! - **Listing**: prefix listing is exact and sorted
//! - **Delete**: removal is idempotent and reports presence correctly
//! - **Keys**: path-like keys are rejected before anything is stored
//! - **Concurrent**: parallel writers to distinct keys never interfere
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty backend for each test:
//!
//! ```ignore
//! use safekeep_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let report = run_conformance_suite(|| async { MemoryBackend::new("t") }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod delete;
mod keys;
mod listing;
mod roundtrip;

use std::fmt;
use std::future::Future;

use crate::PersistenceBackend;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "roundtrip", "listing").
    pub category: String,
    /// Test name (e.g. "binary_value_roundtrips").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a persistence backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// backend, ensuring test isolation.
pub async fn run_conformance_suite<B, F, Fut>(factory: F) -> ConformanceReport
where
    B: PersistenceBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = B>,
{
    let mut results = Vec::new();

    results.extend(roundtrip::run_roundtrip_tests(&factory).await);
    results.extend(listing::run_listing_tests(&factory).await);
    results.extend(delete::run_delete_tests(&factory).await);
    results.extend(keys::run_key_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

/// Bytes covering every byte value, to catch text-only encodings.
fn binary_payload() -> Vec<u8> {
    (0..=255u8).cycle().take(4096).collect()
}
