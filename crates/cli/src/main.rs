mod commands;
mod config;
mod source;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use safekeep_core::BackupKind;
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Encrypted, replicated backups and auto-recovery for restaurant state.
#[derive(Parser)]
#[command(
    name = "safekeep",
    version,
    about = "Encrypted, replicated backups and auto-recovery for restaurant state"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "safekeep.toml")]
    config: PathBuf,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log engine activity to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture the current state and take a full backup
    Backup {
        /// Backup kind: manual, auto, or snapshot
        #[arg(long, default_value = "manual")]
        kind: BackupKind,
    },

    /// List backups, newest first
    List,

    /// Show one backup record
    Show {
        /// Backup id
        id: String,
    },

    /// Restore the state from a backup
    Restore {
        /// Backup id
        id: String,
    },

    /// Take a point-in-time snapshot
    Snapshot {
        /// Free-form label stored with the snapshot
        #[arg(long)]
        label: Option<String>,
    },

    /// List point-in-time snapshots, oldest first
    Snapshots,

    /// Rewind the state to a point-in-time snapshot
    Rewind {
        /// Snapshot id
        id: String,
    },

    /// Decrypt and hash-check every backup
    Verify,

    /// Check the live state, recovering from backup if it is invalid
    Health,

    /// Generate and store a compliance report
    Report,

    /// Run the watchdog until interrupted
    Watch {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(
                &format!("failed to start async runtime: {}", e),
                cli.output,
                cli.quiet,
            );
            process::exit(1);
        }
    };

    if let Err(msg) = runtime.block_on(run(cli.command, &cli.config, cli.output, cli.quiet)) {
        report_error(&msg, cli.output, cli.quiet);
        process::exit(1);
    }
}

async fn run(
    command: Commands,
    config_path: &std::path::Path,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), String> {
    let file = config::load(config_path)?;
    let engine = config::build_engine(&file)?;

    match command {
        Commands::Backup { kind } => commands::backup::cmd_backup(&engine, kind, output, quiet).await,
        Commands::List => commands::backup::cmd_list(&engine, output).await,
        Commands::Show { id } => commands::backup::cmd_show(&engine, &id, output).await,
        Commands::Restore { id } => commands::restore::cmd_restore(&engine, &id, output, quiet).await,
        Commands::Snapshot { label } => {
            commands::snapshot::cmd_snapshot(&engine, label.as_deref(), output, quiet).await
        }
        Commands::Snapshots => commands::snapshot::cmd_snapshots(&engine, output).await,
        Commands::Rewind { id } => commands::snapshot::cmd_rewind(&engine, &id, output, quiet).await,
        Commands::Verify => commands::health::cmd_verify(&engine, output).await,
        Commands::Health => commands::health::cmd_health(engine, output).await,
        Commands::Report => commands::health::cmd_report(&engine, output).await,
        Commands::Watch { once } => commands::watch::cmd_watch(engine, once, output, quiet).await,
    }
}

/// Print an error to stderr in the selected output format.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{{\"error\": \"{}\"}}", msg.replace('"', "\\\""));
        }
    }
}

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let pretty = serde_json::to_string_pretty(value)
        .map_err(|e| format!("serialization error: {}", e))?;
    println!("{}", pretty);
    Ok(())
}
