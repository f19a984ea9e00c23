use std::sync::Arc;

use safekeep_engine::{BackupEngine, CycleReport, Watchdog};

use crate::{print_json, OutputFormat};

fn print_cycle(report: &CycleReport, output: OutputFormat) -> Result<(), String> {
    match output {
        OutputFormat::Json => print_json(report),
        OutputFormat::Text => {
            println!("healthy:   {}", report.healthy);
            println!(
                "backup:    {}",
                report.backup.as_deref().unwrap_or("skipped")
            );
            if let Some(v) = &report.verification {
                println!(
                    "verified:  {} ({} corrupted, {} missing)",
                    v.checked,
                    v.corrupted.len(),
                    v.missing.len()
                );
            }
            if let Some(s) = &report.stability {
                println!("stability: {}", s.message);
            }
            if let Some(e) = &report.error {
                println!("error:     {}", e);
            }
            Ok(())
        }
    }
}

pub(crate) async fn cmd_watch(
    engine: BackupEngine,
    once: bool,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), String> {
    let watchdog = Watchdog::new(Arc::new(engine));

    if once {
        let report = watchdog
            .run_cycle()
            .await
            .ok_or_else(|| "a watchdog cycle is already running".to_string())?;
        print_cycle(&report, output)?;
        return match report.error {
            Some(e) => Err(format!("watchdog cycle failed: {}", e)),
            None => Ok(()),
        };
    }

    if !quiet && output == OutputFormat::Text {
        eprintln!(
            "watchdog running every {}s; press Ctrl-C to stop",
            watchdog.engine().config().watchdog.interval_secs
        );
    }
    watchdog
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;
    Ok(())
}
