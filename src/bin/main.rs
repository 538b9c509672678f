use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use pine_host::{
    Evaluator, ExpressionTreeCompiler, LocalFileStore, PersistentProcess, SnapshotHandle,
    StoreLock, config, sha256_bytes, telemetry,
};

#[derive(Parser)]
#[command(name = "pine-host", version, about = "Persistent PineVM application host")]
struct Cli {
    /// Process store directory (overrides the config file)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Config file path
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Host the process until stdin closes, snapshotting periodically
    Run {
        /// Seconds between provisional-reduction snapshots
        #[arg(long, default_value_t = 600)]
        snapshot_interval_secs: u64,
    },
    /// Print the process status as JSON
    Status,
    /// Store a provisional reduction for the current state
    Snapshot,
    /// Compact the store down to the files restore needs
    Truncate {
        /// Wall-clock budget for the deletion loop
        #[arg(long, default_value_t = 10_000)]
        budget_ms: u64,
    },
    /// Replay the log and print the restored state
    Verify,
}

fn main() {
    let cli = Cli::parse();

    let cfg = match config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config load failed, using defaults: {e}");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };
    telemetry::init(telemetry::TelemetryConfig::new(
        cli.verbose,
        cfg.logging.clone(),
    ));

    let store_path = cli.store.clone().unwrap_or_else(|| cfg.process_store.clone());
    if let Err(e) = run(cli.command, store_path) {
        tracing::error!("error: {e}");
        std::process::exit(1);
    }
}

fn run(command: Command, store_path: PathBuf) -> pine_host::Result<()> {
    let _lock = StoreLock::acquire(&store_path)?;
    let store = Box::new(LocalFileStore::open(&store_path)?);
    let compiler = Arc::new(ExpressionTreeCompiler);
    let evaluator = Arc::new(Evaluator::new());
    let (process, _cmds) = PersistentProcess::open(store, compiler, evaluator)?;

    match command {
        Command::Run {
            snapshot_interval_secs,
        } => {
            let process = Arc::new(process);
            let _snapshots = SnapshotHandle::spawn(
                Arc::clone(&process),
                Duration::from_secs(snapshot_interval_secs),
            );
            tracing::info!("hosting process; close stdin to stop");
            let mut sink = String::new();
            let _ = std::io::Read::read_to_string(&mut std::io::stdin(), &mut sink);
            process.dispose()?;
        }
        Command::Status => {
            let status = process.status()?;
            println!("{}", serde_json::to_string_pretty(&status).unwrap_or_default());
        }
        Command::Snapshot => {
            let reduction = process.store_reduction_record_for_current_state()?;
            println!("{}", reduction.reduced_composition_hash_base16);
        }
        Command::Truncate { budget_ms } => {
            let report = process.truncate_process_history(Duration::from_millis(budget_ms))?;
            println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
        }
        Command::Verify => match process.last_composition_log_record_hash()? {
            Some(head) => {
                let state_json = process.state_json()?;
                println!("head: {head}");
                println!("state sha256: {}", sha256_bytes(state_json.as_bytes()));
            }
            None => println!("store holds no process"),
        },
    }
    Ok(())
}
