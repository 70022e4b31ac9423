//! Download a remote file to the local filesystem.
pub mod assemble;
pub mod cli;
pub mod handler;
pub mod request;
pub mod split_parts;

pub use handler::{Downloader, MAX_SEGMENTS};
pub use request::{DownloadOutcome, DownloadRequest, FailurePolicy};
