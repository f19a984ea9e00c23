use std::sync::Arc;

use safekeep_engine::{BackupEngine, Watchdog};
use serde_json::json;

use crate::{print_json, OutputFormat};

pub(crate) async fn cmd_verify(engine: &BackupEngine, output: OutputFormat) -> Result<(), String> {
    let summary = engine
        .validate_all_backups()
        .await
        .map_err(|e| format!("verification failed: {}", e))?;

    match output {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => {
            println!(
                "checked {} backups: {} corrupted, {} missing",
                summary.checked,
                summary.corrupted.len(),
                summary.missing.len()
            );
            for id in &summary.corrupted {
                println!("  corrupted  {}", id);
            }
            for id in &summary.missing {
                println!("  missing    {}", id);
            }
        }
    }
    if summary.corrupted.is_empty() {
        Ok(())
    } else {
        Err(format!("{} corrupted backup(s)", summary.corrupted.len()))
    }
}

pub(crate) async fn cmd_health(engine: BackupEngine, output: OutputFormat) -> Result<(), String> {
    let watchdog = Watchdog::new(Arc::new(engine));
    let healthy = watchdog.health_check().await;
    let alerts = watchdog.engine().alerts().alerts();
    let replicas = watchdog.engine().replica_health();

    match output {
        OutputFormat::Json => print_json(&json!({
            "healthy": healthy,
            "alerts": alerts,
            "replicas": replicas,
        }))?,
        OutputFormat::Text => {
            println!("state: {}", if healthy { "healthy" } else { "UNHEALTHY" });
            for alert in &alerts {
                println!("  [{}] {}", alert.severity, alert.message);
            }
            for metrics in &replicas {
                println!(
                    "  replica {}: circuit {:?}, {} calls, {} errors",
                    metrics.client, metrics.circuit, metrics.total_calls, metrics.total_errors
                );
            }
        }
    }
    if healthy {
        Ok(())
    } else {
        Err("state is invalid and could not be recovered".into())
    }
}

pub(crate) async fn cmd_report(engine: &BackupEngine, output: OutputFormat) -> Result<(), String> {
    let report = engine
        .generate_compliance_report()
        .await
        .map_err(|e| format!("report failed: {}", e))?;

    match output {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            println!("backups:      {}", report.total_backups);
            println!("health score: {:.0}%", report.health_score * 100.0);
            match &report.last_backup {
                Some(last) => println!("last backup:  {} ({})", last.id, last.status),
                None => println!("last backup:  none"),
            }
            println!("encryption:   {}", report.security.encryption);
            println!("hashing:      {}", report.security.hashing);
            println!("key deriv.:   {}", report.security.key_derivation);
            println!("redundancy:   {}", report.security.redundancy);
            println!("log entries:  {}", report.compliance_logs.len());
            Ok(())
        }
    }
}
