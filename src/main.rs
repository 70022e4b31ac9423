//! # segfetch
//!
//! Command line entry point: parses arguments, installs logging and runs one
//! segmented download.
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing::{Level, debug};

use segfetch::features::save_to_local::cli::LocalArgs;
use segfetch::utils::init_logger;
use segfetch::{DownloadRequest, Downloader};

#[tokio::main]
async fn main() -> ExitCode {
    human_panic::setup_panic!();
    let args = LocalArgs::parse();
    init_logger(if args.verbose { Level::DEBUG } else { Level::WARN });
    debug!(url = %args.url, output = %args.output.display(), threads = args.threads, "Starting.");

    let request = DownloadRequest::from(args);
    let result = match Downloader::new(request) {
        Ok(downloader) => downloader.download().await,
        Err(err) => Err(err),
    };

    match result {
        Ok(outcome) if outcome.is_complete() => {
            eprintln!(
                "{} {} ({} bytes, {} segment(s))",
                "Saved".green().bold(),
                outcome.path().display(),
                outcome.bytes(),
                outcome.segments()
            );
            if let Some(name) = outcome.suggested_filename() {
                eprintln!("{} {name}", "Server suggested filename:".cyan());
            }
            ExitCode::SUCCESS
        }
        Ok(outcome) => {
            eprintln!(
                "{} {} is missing segment(s) {:?}",
                "Incomplete".yellow().bold(),
                outcome.path().display(),
                outcome.failed_segments()
            );
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("{} {err}", "Error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
