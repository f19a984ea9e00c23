//! safekeep-engine: the machinery that protects application state.
//!
//! - [`BackupEngine`] -- full backups across local, mirror, and remote tiers,
//!   point-in-time snapshots, verification, and compliance reporting
//! - [`ResilientClient`] -- retry with backoff, circuit breaker, and metrics
//!   around every remote call
//! - [`ReplicaSet`] and [`RemoteReplica`] -- the off-site tier
//! - [`Watchdog`] -- periodic health checks with auto-recovery
//! - [`EngineConfig`] -- tuning, with defaults for every field
//!
//! The `http` feature (on by default) adds [`replica::HttpReplica`] and
//! [`notify::WebhookNotifier`], both built on `ureq`.

pub mod backup;
pub mod config;
#[cfg(feature = "http")]
pub mod notify;
pub mod replica;
pub mod resilience;
pub mod store;
pub mod watchdog;

pub use backup::{BackupEngine, BackupEngineBuilder, ComplianceReport, VerificationSummary};
pub use config::{EncryptionConfig, EngineConfig, ResilienceConfig, WatchdogConfig};
pub use replica::{RemoteReplica, ReplicaError, ReplicaSet, SimulatedReplica};
pub use resilience::{CallError, CircuitState, HealthMetrics, ResilientClient};
pub use store::BackendEntityStore;
pub use watchdog::{AcknowledgeRemediation, CycleReport, Remediation, StabilityReport, Watchdog};
