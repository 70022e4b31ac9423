use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum CliantError {
    /// Connection, DNS or TLS failure that survived every retry attempt.
    #[error("Network connection error while fetching {url}: {source}")]
    Transport {
        url: Url,
        #[source]
        source: reqwest_middleware::Error,
    },

    /// The response body broke off after the headers arrived.
    #[error("Error reading response body from {url}: {source}")]
    Stream {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("Download of {url} failed with HTTP status {status}: {message}")]
    Download {
        url: Url,
        status: StatusCode,
        message: String,
    },

    #[error("Filesystem error on {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Can't reassemble part file {}: {source}", part.display())]
    Assembly {
        part: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Segment {index} failed: {source}")]
    Segment {
        index: usize,
        #[source]
        source: Box<CliantError>,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Critical system failure: {0}")]
    Fatal(String),
}

impl CliantError {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, err: opendal::Error) -> Self {
        CliantError::Filesystem { path: path.into(), source: err.into() }
    }

    pub(crate) fn assembly(part: impl Into<PathBuf>, err: opendal::Error) -> Self {
        CliantError::Assembly { part: part.into(), source: err.into() }
    }

    /// HTTP status carried by this error, looking through segment wrappers.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            CliantError::Download { status, .. } => Some(*status),
            CliantError::Segment { source, .. } => source.status(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for CliantError {
    fn from(error: anyhow::Error) -> Self {
        CliantError::Config(format!("{error:#}"))
    }
}
