//! AutoVol - Volatility 3 scan automation CLI
//!
//! Runs a tier of Volatility 3 plugins against a memory dump and files each
//! plugin's output in a fresh, timestamped run directory.
//!
//! ```text
//! autovol -f /cases/host.raw -s full -o /cases/out
//! ```

use anyhow::{Context, Result};
use autovol_core::{
    RunContext, RunCoordinator, RunLog, RunSummary, ScanConfig, ScanTier, DEFAULT_TOOLKIT_PATH,
    SUMMARY_FILE_NAME,
};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, warn, Level};

/// Exit code used when the run is interrupted with Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "autovol")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Volatility 3 memory forensics automation", long_about = None)]
struct Cli {
    /// Path to the memory dump
    #[arg(short = 'f', long)]
    memory_file: PathBuf,

    /// Scan tier
    #[arg(short = 's', long, value_enum, default_value_t = ScanTier::Normal)]
    scan_type: ScanTier,

    /// Directory that receives the run directory (default: system temp dir)
    #[arg(short, long, env = "AUTOVOL_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Volatility 3 entry point
    #[arg(long, env = "AUTOVOL_VOLATILITY_PATH", default_value = DEFAULT_TOOLKIT_PATH)]
    volatility_path: PathBuf,

    /// Interpreter to launch the entry point with (e.g. python3)
    #[arg(long, env = "AUTOVOL_PYTHON")]
    python: Option<PathBuf>,

    /// Maximum number of plugins running at once
    #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u16).range(1..))]
    threads: u16,

    /// Per-plugin timeout in seconds (default: none)
    #[arg(long)]
    timeout: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn scan_config(&self) -> ScanConfig {
        let mut config = ScanConfig::new(&self.memory_file)
            .with_tier(self.scan_type)
            .with_toolkit(&self.volatility_path)
            .with_interpreter(self.python.clone())
            .with_timeout(self.timeout.map(Duration::from_secs))
            .with_jobs(usize::from(self.threads));
        if let Some(dir) = &self.output_dir {
            config = config.with_output_root(dir);
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let run_log = autovol_core::init_tracing(cli.json, level);

    let config = cli.scan_config();
    let coordinator = RunCoordinator::with_toolkit(config.runner.clone());

    // Dropping the scan future aborts workers; their children are killed on drop.
    tokio::select! {
        result = run_scan(&coordinator, config, &run_log) => match result {
            Ok(summary) => {
                print_summary(&summary);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{:#}", e);
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; artifacts written so far are kept");
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}

async fn run_scan(
    coordinator: &RunCoordinator,
    config: ScanConfig,
    run_log: &RunLog,
) -> Result<RunSummary> {
    let dump = config.dump.clone();
    let ctx = RunContext::prepare(config, chrono::Local::now())
        .with_context(|| format!("Cannot start scan of {}", dump.display()))?;

    match run_log.attach(&ctx.run_dir) {
        Ok(path) => debug!(log = %path.display(), "Run log attached"),
        Err(e) => warn!("Run log unavailable, logging to stderr only: {}", e),
    }

    coordinator
        .execute(&ctx)
        .await
        .with_context(|| format!("Scan of {} failed", dump.display()))
}

fn print_summary(summary: &RunSummary) {
    println!("Run ID: {}", summary.run_id);
    println!("Tier: {}", summary.tier);
    println!("Output: {}", summary.run_dir.display());
    println!("Duration: {}ms", summary.duration_ms);
    println!();

    for outcome in &summary.outcomes {
        let mark = if outcome.status.is_success() { "✓" } else { "✗" };
        println!(
            "  {} {} ({}ms, {})",
            mark, outcome.identifier, outcome.duration_ms, outcome.status
        );
    }

    println!();
    println!(
        "Summary: {}/{} plugins succeeded",
        summary.succeeded, summary.total
    );
    if summary.failed > 0 {
        println!("Failed: {}", summary.failed_identifiers().join(", "));
    }
    println!(
        "Details: {}",
        summary.run_dir.join(SUMMARY_FILE_NAME).display()
    );
}
