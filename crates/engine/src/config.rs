//! Engine configuration.
//!
//! Every section deserializes with defaults, so a configuration file only
//! needs to name the values it overrides.

use std::time::Duration;

use safekeep_core::crypto::{DEFAULT_SALT, MIN_ITERATIONS};
use safekeep_core::{SafekeepError, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Stamped on every backup record.
    pub schema_version: String,
    pub encryption: EncryptionConfig,
    pub resilience: ResilienceConfig,
    /// Point-in-time snapshots kept before the oldest is evicted.
    pub max_snapshots: usize,
    /// Mirrors that must verify for a backup to count as mirrored.
    pub mirror_quorum: usize,
    pub watchdog: WatchdogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            schema_version: SCHEMA_VERSION.to_string(),
            encryption: EncryptionConfig::default(),
            resilience: ResilienceConfig::default(),
            max_snapshots: 10,
            mirror_quorum: 2,
            watchdog: WatchdogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    pub salt: String,
    pub iterations: u32,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        EncryptionConfig {
            salt: String::from_utf8_lossy(DEFAULT_SALT).into_owned(),
            iterations: MIN_ITERATIONS,
        }
    }
}

/// Retry and circuit-breaker settings for every remote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_jitter_ms: u64,
    /// Consecutive failed calls that open the breaker.
    pub failure_threshold: u32,
    pub cooldown_ms: u64,
    /// Latencies kept for the rolling average.
    pub latency_window: usize,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        ResilienceConfig {
            max_retries: 3,
            base_delay_ms: 800,
            max_jitter_ms: 200,
            failure_threshold: 3,
            cooldown_ms: 30_000,
            latency_window: 100,
        }
    }
}

impl ResilienceConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    pub interval_secs: u64,
    pub max_resolution_iterations: u32,
    /// Error entries fetched per remediation pass.
    pub recent_error_limit: usize,
    /// Error entries inspected by stability validation.
    pub stability_error_window: usize,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        WatchdogConfig {
            interval_secs: 900,
            max_resolution_iterations: 5,
            recent_error_limit: 50,
            stability_error_window: 10,
        }
    }
}

impl WatchdogConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl EngineConfig {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), SafekeepError> {
        let fail = |msg: String| Err(SafekeepError::Config(msg));
        if self.encryption.iterations < MIN_ITERATIONS {
            return fail(format!(
                "encryption.iterations must be at least {MIN_ITERATIONS}, got {}",
                self.encryption.iterations
            ));
        }
        if self.encryption.salt.is_empty() {
            return fail("encryption.salt must not be empty".into());
        }
        if self.max_snapshots == 0 {
            return fail("max_snapshots must be at least 1".into());
        }
        if self.mirror_quorum == 0 {
            return fail("mirror_quorum must be at least 1".into());
        }
        if self.resilience.failure_threshold == 0 {
            return fail("resilience.failure_threshold must be at least 1".into());
        }
        if self.resilience.latency_window == 0 {
            return fail("resilience.latency_window must be at least 1".into());
        }
        if self.watchdog.interval_secs == 0 {
            return fail("watchdog.interval_secs must be at least 1".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_tuning() {
        let c = EngineConfig::default();
        assert_eq!(c.schema_version, "1.5.0");
        assert_eq!(c.encryption.iterations, 100_000);
        assert_eq!(c.resilience.max_retries, 3);
        assert_eq!(c.resilience.base_delay_ms, 800);
        assert_eq!(c.resilience.max_jitter_ms, 200);
        assert_eq!(c.resilience.failure_threshold, 3);
        assert_eq!(c.resilience.cooldown(), Duration::from_secs(30));
        assert_eq!(c.max_snapshots, 10);
        assert_eq!(c.mirror_quorum, 2);
        assert_eq!(c.watchdog.interval(), Duration::from_secs(15 * 60));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let c: EngineConfig =
            serde_json::from_str(r#"{ "resilience": { "max_retries": 1 } }"#).unwrap();
        assert_eq!(c.resilience.max_retries, 1);
        assert_eq!(c.resilience.base_delay_ms, 800);
        assert_eq!(c.max_snapshots, 10);
    }

    #[test]
    fn weak_key_derivation_is_rejected() {
        let mut c = EngineConfig::default();
        c.encryption.iterations = 1_000;
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("iterations"));
    }
}
