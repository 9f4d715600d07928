//! Backup archive garbage collector.
//!
//! Reconciles a directory of `<uuid>.tar.gz` backup archives against the
//! panel's backup records, deleting archives whose record was soft-deleted
//! or never existed. Runs once at startup and then on a cron schedule.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::Parser;

mod config;
mod db;
mod gc;
mod observability;
mod schedule;

use config::GcConfig;
use db::MysqlBackupRepo;
use gc::{GcJob, start_gc_worker};

#[derive(Parser, Debug)]
#[command(name = "backup-gc", version, about = "Garbage collector for orphaned backup archives")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (all keys have defaults when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run the scheduled garbage collector (default)
    Run,
    /// Perform a single reconciliation pass and exit
    Once,
    /// Write a starter configuration file
    Init {
        /// Output file
        #[arg(short, long, default_value = "backup-gc.toml")]
        output: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Init { output, force }) => run_init(&output, force),
        Some(Command::Once) => run_once(args.config.as_deref()).await,
        Some(Command::Run) | None => run_service(args.config.as_deref()).await,
    }
}

/// Load config and initialize tracing, exiting on a bad config file.
///
/// Config loading happens before the subscriber exists, so load-time
/// failures go to stderr and defaulted keys are reported afterwards.
fn startup(config_path: Option<&Path>) -> GcConfig {
    let config = match GcConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    observability::init_tracing(&config.logging);
    config.log_defaulted_keys();
    tracing::info!(
        backup_path = %config.cleanup.backup_path.display(),
        schedule = %config.cleanup.schedule,
        "configuration loaded"
    );

    config
}

/// Connect to the panel database, exiting on failure.
///
/// No database means no authoritative live set, so the process must not
/// proceed to schedule reconciliation runs.
async fn connect_repo(config: &GcConfig) -> Arc<MysqlBackupRepo> {
    match MysqlBackupRepo::connect(&config.database).await {
        Ok(repo) => Arc::new(repo),
        Err(e) => {
            tracing::error!(error = %e, "database connection failed");
            std::process::exit(1);
        }
    }
}

/// Run the long-lived service: one eager run, then the schedule loop.
async fn run_service(config_path: Option<&Path>) {
    let config = startup(config_path);

    // Validation already proved the expression parses.
    let cron_schedule = match schedule::parse(&config.cleanup.schedule) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "invalid cron schedule");
            std::process::exit(1);
        }
    };

    let repo = connect_repo(&config).await;
    let job = Arc::new(GcJob::new(repo, config.cleanup.backup_path.clone()));

    tracing::info!("running initial cleanup");
    job.trigger().await;

    start_gc_worker(job, cron_schedule).await;
}

/// Run a single reconciliation pass and exit.
async fn run_once(config_path: Option<&Path>) {
    let config = startup(config_path);
    let repo = connect_repo(&config).await;
    let job = GcJob::new(repo, config.cleanup.backup_path.clone());

    match job.run().await {
        Ok(result) => {
            tracing::info!(
                live = result.live_identifiers,
                deleted = result.sweep.deleted,
                skipped = result.sweep.skipped_invalid,
                failed = result.sweep.delete_failures,
                "backup cleanup run completed"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "backup cleanup run failed");
            std::process::exit(1);
        }
    }
}

/// Write a starter configuration file.
fn run_init(output: &Path, force: bool) {
    if output.exists() && !force {
        eprintln!(
            "Config file already exists: {}\nUse --force to overwrite.",
            output.display()
        );
        std::process::exit(1);
    }

    if let Err(e) = std::fs::write(output, DEFAULT_CONFIG_TOML) {
        eprintln!("Failed to write config file: {e}");
        std::process::exit(1);
    }

    println!("Created config file: {}", output.display());
    println!();
    println!("To start the collector, run:");
    println!("  backup-gc run --config {}", output.display());
}

const DEFAULT_CONFIG_TOML: &str = r#"# backup-gc configuration.
# Every key is optional; the values below are the defaults.

[database]
host = "localhost"
port = 3306
user = "pterodactyl"
# Usually supplied via an environment variable:
# password = "${DB_PASSWORD}"
password = ""
database = "panel"

[cleanup]
# Directory holding the <uuid>.tar.gz backup archives.
backup_path = "/mnt/pterodactyl"
# Standard 5-field cron expression. A run also fires once at startup.
schedule = "0 2 * * *"

[logging]
level = "info"
format = "compact"
"#;
