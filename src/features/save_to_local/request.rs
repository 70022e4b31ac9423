use std::path::PathBuf;

use clap::ValueEnum;
use derive_getters::Getters;
use derive_setters::Setters;
use url::Url;

use crate::shared::network::http::config::HttpArgs;

/// What happens when one segment fails while others are still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FailurePolicy {
    /// Abort the other segments, delete part files and fail the download.
    #[default]
    FailFast,
    /// Let the other segments finish, assemble what succeeded and report
    /// the failed indices in the outcome.
    BestEffort,
}

/// One download, fixed once built.
#[derive(Debug, Clone, Getters, Setters)]
#[setters(prefix = "with_")]
pub struct DownloadRequest {
    #[setters(skip)]
    url: Url,
    #[setters(skip)]
    output: PathBuf,
    /// Requested number of concurrent segments.
    threads: usize,
    show_progress: bool,
    /// Leave `<output>-<index>` part files on disk after assembling.
    keep_parts: bool,
    failure_policy: FailurePolicy,
    http: HttpArgs,
}

impl DownloadRequest {
    pub fn new(url: Url, output: impl Into<PathBuf>) -> Self {
        Self {
            url,
            output: output.into(),
            threads: 4,
            show_progress: true,
            keep_parts: false,
            failure_policy: FailurePolicy::default(),
            http: HttpArgs::default(),
        }
    }
}

/// Result of a finished download.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct DownloadOutcome {
    /// Assembled file.
    path: PathBuf,
    /// Bytes written to `path`.
    bytes: u64,
    /// Segments fetched, 1 for a single stream download.
    segments: usize,
    /// Indices of segments that failed under [`FailurePolicy::BestEffort`].
    failed_segments: Vec<usize>,
    /// Server provided filename, reported when no segmentation happened.
    suggested_filename: Option<String>,
}

impl DownloadOutcome {
    pub(crate) fn new(
        path: PathBuf,
        bytes: u64,
        segments: usize,
        failed_segments: Vec<usize>,
        suggested_filename: Option<String>,
    ) -> Self {
        Self { path, bytes, segments, failed_segments, suggested_filename }
    }

    pub fn is_complete(&self) -> bool {
        self.failed_segments.is_empty()
    }
}
