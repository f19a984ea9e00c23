use safekeep_engine::BackupEngine;
use serde_json::json;

use super::timestamp;
use crate::{print_json, OutputFormat};

pub(crate) async fn cmd_snapshot(
    engine: &BackupEngine,
    label: Option<&str>,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), String> {
    let id = engine
        .create_snapshot(label)
        .await
        .map_err(|e| format!("snapshot failed: {}", e))?;
    match output {
        OutputFormat::Json => print_json(&json!({ "snapshot": id })),
        OutputFormat::Text => {
            if quiet {
                println!("{}", id);
            } else {
                println!("created snapshot {}", id);
            }
            Ok(())
        }
    }
}

pub(crate) async fn cmd_snapshots(engine: &BackupEngine, output: OutputFormat) -> Result<(), String> {
    let snapshots = engine.list_snapshots().await.map_err(|e| e.to_string())?;
    match output {
        OutputFormat::Json => {
            let rows: Vec<_> = snapshots
                .iter()
                .map(|s| {
                    json!({
                        "id": s.id,
                        "timestamp": timestamp(s.timestamp),
                        "label": s.label,
                        "records": s.state.record_count(),
                    })
                })
                .collect();
            print_json(&rows)
        }
        OutputFormat::Text => {
            if snapshots.is_empty() {
                println!("no snapshots");
            }
            for s in &snapshots {
                println!(
                    "{}  {}  {:>6} records  {}",
                    s.id,
                    timestamp(s.timestamp),
                    s.state.record_count(),
                    s.label.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
    }
}

pub(crate) async fn cmd_rewind(
    engine: &BackupEngine,
    id: &str,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), String> {
    if !engine.restore_to_point_in_time(id).await {
        return Err(format!("rewind to snapshot '{}' failed", id));
    }
    match output {
        OutputFormat::Json => print_json(&json!({ "rewound": id })),
        OutputFormat::Text => {
            if !quiet {
                println!("rewound state to snapshot {}", id);
            }
            Ok(())
        }
    }
}
