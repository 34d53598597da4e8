mod config;
mod escalate;
mod hardware;
mod monitor;
mod probe;
mod process;
mod runtime;
mod signals;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Liveness watchdog for the hub process: monitors its heartbeat marker,
/// kills the hub when the heartbeat goes stale, reboots the host when the
/// probe path itself is dead, and keeps the hardware watchdog fed so a hung
/// hubwatch still ends in a reset.
#[derive(Parser, Debug)]
#[command(name = "hubwatch", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "/etc/hubwatch.toml")]
    config: PathBuf,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (per-tick probe readings, selector decisions)
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let cfg = match config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("hubwatch: {e}");
            return ExitCode::FAILURE;
        }
    };

    let default_level = if cli.verbose {
        "debug"
    } else {
        cfg.log.level.as_str()
    };
    init_tracing(default_level);
    tracing::info!(config = %cli.config.display(), "hubwatch starting");

    if cli.dry_run {
        println!("hubwatch v{}", env!("CARGO_PKG_VERSION"));
        println!("Config file: {}", cli.config.display());
        println!("{cfg:#?}");
        println!("Dry run mode — config validated, not running.");
        return ExitCode::SUCCESS;
    }

    let device = if cfg.hardware.disable {
        tracing::info!("hardware watchdog disabled by config");
        None
    } else {
        match hardware::WatchdogDevice::open(&cfg.hardware.device, cfg.hardware.timeout_secs) {
            Ok(device) => Some(device),
            Err(e) => {
                tracing::error!(error = %e, "cannot arm hardware watchdog");
                return ExitCode::FAILURE;
            }
        }
    };

    let signals = match signals::Signals::install() {
        Ok(signals) => signals,
        Err(e) => {
            tracing::error!(error = %e, "cannot install signal handlers");
            return ExitCode::FAILURE;
        }
    };

    runtime::Runtime::new(cfg, device, signals).run().await;
    ExitCode::SUCCESS
}
