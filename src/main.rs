mod accumulator;
mod cli;
mod config;
mod context;
mod engine;
mod error;
mod frame;
mod metrics;
mod pool;
mod queue;
mod report;
mod source;

use crate::cli::CliArgs;
use crate::config::Config;
use crate::error::{Result, YuvqError};
use crate::report::Reporter;
use chrono::Local;
use log::{error, info, LevelFilter};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

fn main() -> ExitCode {
    let start_time = Instant::now();
    let args = cli::parse_args();

    if let Err(e) = setup_logging(&args) {
        eprintln!("Error setting up logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting yuvq...");
    info!("Arguments: {:?}", args);

    match run(args) {
        Ok(()) => {
            info!("Completed in {:.2?}", start_time.elapsed());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed after {:.2?}: {}", start_time.elapsed(), e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout carries only the report, plus an optional
/// timestamped file.
fn setup_logging(args: &CliArgs) -> std::result::Result<(), fern::InitError> {
    let crate_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut logger = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::Warn)
        .level_for("yuvq", crate_level)
        .chain(std::io::stderr());

    if args.log {
        let log_name = format!("yuvq_{}.log", Local::now().format("%Y%m%d_%H%M%S"));
        let log_dir = args
            .output
            .as_deref()
            .and_then(Path::parent)
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let log_path = log_dir.join(log_name);
        logger = logger.chain(fern::Dispatch::new().chain(fern::log_file(&log_path)?));
        eprintln!("Logging to file: {}", log_path.display());
    }

    logger.apply()?;
    Ok(())
}

fn run(args: CliArgs) -> Result<()> {
    let config = Config::from_args(args)?;
    info!("Reference: {}", config.reference.display());
    info!("Distorted: {}", config.distorted.display());
    info!(
        "Threads: {}, metrics: {:?}, peak sample value {}",
        config.threads,
        config.metrics,
        config.max_sample_value()
    );

    let sink: Box<dyn Write + Send> = match &config.output {
        Some(path) => {
            let file = File::create(path).map_err(|source| YuvqError::Open {
                path: path.clone(),
                source,
            })?;
            info!("Writing report to {}", path.display());
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stdout()),
    };

    let mut reporter = Reporter::new(sink, config.metrics, config.ordered);
    if config.json.is_some() {
        reporter = reporter.keep_records();
    }
    let reporter = Arc::new(reporter);

    let summary = engine::run(&config, Arc::clone(&reporter))?;

    if let Some(path) = &config.json {
        reporter.write_json(path, &config, &summary)?;
    }
    if let Some(psnr) = summary.psnr {
        info!(
            "Average PSNR Y/U/V: {:.4} / {:.4} / {:.4}",
            psnr[0], psnr[1], psnr[2]
        );
    }
    if let Some(ssim) = summary.ssim {
        info!(
            "Average SSIM Y/U/V: {:.4} / {:.4} / {:.4}",
            ssim[0], ssim[1], ssim[2]
        );
    }
    Ok(())
}
