use std::path::PathBuf;

use clap::Parser;
use url::Url;

use super::handler::MAX_SEGMENTS;
use super::request::{DownloadRequest, FailurePolicy};
use crate::shared::network::http::config::HttpArgs;

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Segmented, parallel HTTP file downloader", long_about = None)]
pub struct LocalArgs {
    /// Http url of the file to download.
    #[arg(short = 'u', long, value_parser = parse_url)]
    pub url: Url,
    /// Path to save the download to. `~` and `$VARS` are expanded.
    #[arg(short = 'o', long, value_parser = parse_output_path)]
    pub output: PathBuf,
    /// Number of concurrent segments.
    #[arg(short = 'n', long, default_value_t = 4, value_parser = parse_threads)]
    pub threads: usize,
    /// Keep `<output>-<index>` part files after assembling.
    #[arg(long)]
    pub keep_parts: bool,
    /// Disable progress bars.
    #[arg(long)]
    pub no_progress: bool,
    /// What to do when a segment fails.
    #[arg(long, value_enum, default_value_t = FailurePolicy::FailFast)]
    pub failure_policy: FailurePolicy,
    /// Log at debug level. `RUST_LOG` takes precedence.
    #[arg(short = 'v', long)]
    pub verbose: bool,
    #[command(flatten)]
    pub http_args: HttpArgs,
}

impl From<LocalArgs> for DownloadRequest {
    fn from(args: LocalArgs) -> Self {
        DownloadRequest::new(args.url, args.output)
            .with_threads(args.threads)
            .with_show_progress(!args.no_progress)
            .with_keep_parts(args.keep_parts)
            .with_failure_policy(args.failure_policy)
            .with_http(args.http_args)
    }
}

/// Expands the path and rejects existing directories.
fn parse_output_path(path: &str) -> Result<PathBuf, String> {
    let expanded = shellexpand::full(path).map_err(|e| format!("Can't expand {path}: {e}"))?;
    let to_path = PathBuf::from(expanded.as_ref());
    if to_path.is_dir() {
        return Err(format!("{} is a directory, not a path to a file.", to_path.display()));
    }
    Ok(to_path)
}

fn parse_threads(value: &str) -> Result<usize, String> {
    let threads: usize = value.parse().map_err(|e| format!("Invalid thread count {value}: {e}"))?;
    if !(1..=MAX_SEGMENTS).contains(&threads) {
        return Err(format!("Thread count must be between 1 and {MAX_SEGMENTS}."));
    }
    Ok(threads)
}

/// Parses `url`, assuming https when no scheme is given.
fn parse_url(url: &str) -> Result<Url, String> {
    if url.starts_with("https://") || url.starts_with("http://") {
        return Url::parse(url).map_err(|e| format!("Invalid Url {url} {e}"));
    }
    let new_url = format!("https://{url}");
    Url::parse(&new_url).map_err(|e| format!("Invalid Url {url} {e}"))
}
