use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tsmarker::config::ScanConfig;
use tsmarker::format::ts::{spawn_scan, ScanOutcome, Scanner};

#[derive(Parser)]
#[clap(version, about = "Inspect an MPEG transport stream frame by frame")]
struct Opt {
    /// Transport stream file to scan
    input: PathBuf,

    /// Split every program into <DIR>/<pmt_pid>.m2ts
    #[clap(long, value_name = "DIR")]
    split: Option<PathBuf>,

    /// Config file read instead of ./tsmarker.toml
    #[clap(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log progress every N frames (0 disables)
    #[clap(long, value_name = "N")]
    progress: Option<u64>,

    /// Check the CRC of every PSI section
    #[clap(long, default_value_t = false)]
    verify_crc: bool,

    /// Log every decoded unit
    #[clap(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::parse();

    let level = if opt.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = match &opt.config {
        Some(path) => ScanConfig::load_from(path)?,
        None => ScanConfig::load()?,
    };
    if let Some(dir) = opt.split {
        config.split = true;
        config.output_dir = Some(dir);
    }
    if let Some(interval) = opt.progress {
        config.progress_interval = interval;
    }
    config.verify_crc |= opt.verify_crc;

    let token = CancellationToken::new();
    let scanner = Scanner::from_config(&opt.input, &config)?.with_cancellation(token.clone());
    info!("scanning {}", opt.input.display());
    let mut scan = spawn_scan(scanner);

    let report = tokio::select! {
        result = &mut scan => result??,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, stopping scan");
            token.cancel();
            scan.await??
        }
    };

    println!("{}", report);
    if let ScanOutcome::Truncated(reason) = &report.outcome {
        warn!("input ended early: {}", reason);
    }
    Ok(())
}
