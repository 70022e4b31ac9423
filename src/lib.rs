//! # segfetch
//!
//! Segmented HTTP downloads. The resource is probed for its size and range
//! support, split into contiguous byte ranges, fetched over parallel
//! connections into part files and reassembled in order.
//!
//! ```no_run
//! use segfetch::{DownloadRequest, Downloader};
//! # async fn run() -> Result<(), segfetch::CliantError> {
//! let url = url::Url::parse("https://example.com/tool.tar.gz").expect("url");
//! let request = DownloadRequest::new(url, "tool.tar.gz").with_threads(8);
//! let outcome = Downloader::new(request)?.download().await?;
//! println!("{} bytes in {} segments", outcome.bytes(), outcome.segments());
//! # Ok(())
//! # }
//! ```
pub mod features;
pub mod shared;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use features::save_to_local::{DownloadOutcome, DownloadRequest, Downloader, FailurePolicy};
pub use shared::errors::CliantError;
