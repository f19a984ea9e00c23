use safekeep_core::{BackupKind, BackupRecord};
use safekeep_engine::BackupEngine;
use serde_json::json;

use super::timestamp;
use crate::{print_json, OutputFormat};

fn describe(record: &BackupRecord) -> String {
    format!(
        "{}  {}  {:<8} {:<10} {:>9} B  [{}]",
        record.id,
        timestamp(record.timestamp),
        record.kind.to_string(),
        record.status.to_string(),
        record.size_bytes,
        record.tier_list()
    )
}

pub(crate) async fn cmd_backup(
    engine: &BackupEngine,
    kind: BackupKind,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), String> {
    let created = engine
        .create_full_backup(kind)
        .await
        .map_err(|e| format!("backup failed: {}", e))?;

    match (output, created) {
        (OutputFormat::Json, record) => print_json(&json!({ "backup": record })),
        (OutputFormat::Text, Some(record)) => {
            if !quiet {
                println!("created {}", describe(&record));
            } else {
                println!("{}", record.id);
            }
            Ok(())
        }
        (OutputFormat::Text, None) => {
            if !quiet {
                println!("skipped: current state failed validation");
            }
            Ok(())
        }
    }
}

pub(crate) async fn cmd_list(engine: &BackupEngine, output: OutputFormat) -> Result<(), String> {
    let backups = engine.list_backups().await.map_err(|e| e.to_string())?;
    match output {
        OutputFormat::Json => print_json(&backups),
        OutputFormat::Text => {
            if backups.is_empty() {
                println!("no backups");
            }
            for record in &backups {
                println!("{}", describe(record));
            }
            Ok(())
        }
    }
}

pub(crate) async fn cmd_show(
    engine: &BackupEngine,
    id: &str,
    output: OutputFormat,
) -> Result<(), String> {
    let record = engine
        .backup_record(id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("no backup with id '{}'", id))?;

    match output {
        OutputFormat::Json => print_json(&record),
        OutputFormat::Text => {
            println!("id:        {}", record.id);
            println!("taken:     {}", timestamp(record.timestamp));
            println!("kind:      {}", record.kind);
            println!("status:    {}", record.status);
            println!("schema:    {}", record.schema_version);
            println!("size:      {} bytes", record.size_bytes);
            println!("sha256:    {}", record.content_hash);
            println!("tiers:     {}", record.tier_list());
            println!(
                "integrity: {}  georeplicated: {}  encrypted: {}",
                record.compliance.integrity_checked,
                record.compliance.georeplicated,
                record.compliance.encrypted
            );
            Ok(())
        }
    }
}
