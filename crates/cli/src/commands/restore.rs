use safekeep_engine::BackupEngine;
use serde_json::json;

use crate::{print_json, OutputFormat};

pub(crate) async fn cmd_restore(
    engine: &BackupEngine,
    id: &str,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), String> {
    if !engine.restore_system(id).await {
        return Err(format!("restore from backup '{}' failed", id));
    }
    match output {
        OutputFormat::Json => print_json(&json!({ "restored": id })),
        OutputFormat::Text => {
            if !quiet {
                println!("restored state from {}", id);
            }
            Ok(())
        }
    }
}
