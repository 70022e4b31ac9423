use anyhow::Context;
use derive_getters::Getters;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, HeaderMap, RANGE};
use reqwest::{Client, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

pub mod config;
pub mod retry;

use self::config::HttpArgs;
use self::retry::RetryTransport;
use super::content_disposition::parse_content_disposition;
use super::{ByteRange, RangeEnd};
use crate::shared::errors::CliantError;
use crate::shared::fs::LocalFs;
use crate::shared::progress_tracker::ProgressTracker;

/// Offset the probe asks for. Not 0, so servers that answer `bytes=0-`
/// with a plain 200 still have to reveal partial content support.
pub const PROBE_OFFSET: u64 = 2;

/// What the probe learned about a resource.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct ProbeResult {
    /// Total size in bytes, `None` when the server didn't say.
    total_size: Option<u64>,
    range_supported: bool,
    /// Filename from `Content-Disposition`, if any.
    suggested_filename: Option<String>,
}

/// HTTP client shared by every probe and segment of a download.
pub struct HttpAdapter {
    client: ClientWithMiddleware,
    retry: RetryTransport,
    basic_auth: Option<(String, Option<SecretString>)>,
}

impl HttpAdapter {
    #[instrument(name = "new_http_adapter", skip_all, fields(max_attempts = http_args.retry_args.max_attempts))]
    pub fn new(http_args: &HttpArgs) -> Result<Self, CliantError> {
        let client = Client::try_from(http_args)
            .context("Can't create http client due to misconfiguration.")?;
        let client: ClientWithMiddleware = ClientBuilder::new(client)
            .with(TracingMiddleware::default()) // Enable built-in http client tracing and logging.
            .build();
        let basic_auth = http_args
            .username
            .clone()
            .map(|user| (user, http_args.password.clone()));
        Ok(Self {
            client,
            retry: RetryTransport::from(http_args.retry_args),
            basic_auth,
        })
    }

    /// Sends a GET for `range` through the retrying transport.
    ///
    /// Any HTTP status comes back as a response; only connection level
    /// failures that outlived every retry become errors.
    async fn send(&self, url: &Url, range: ByteRange) -> Result<Response, CliantError> {
        let range_header = range.header_value();
        debug!(url = url.as_str(), range = %range_header, "Sending request.");
        self.retry
            .execute(|| {
                let mut request = self.client.get(url.clone()).header(RANGE, range_header.as_str());
                if let Some((user, password)) = &self.basic_auth {
                    request = request.basic_auth(user, password.as_ref().map(|p| p.expose_secret()));
                }
                request.send()
            })
            .await
            .map_err(|source| {
                error!("could'nt reach {url} due to :{source}");
                CliantError::Transport { url: url.clone(), source }
            })
    }

    /// Learns size and range support of `url` without reading the body.
    ///
    /// Asks for `bytes=2-`. A 206 means ranges work and the total is the
    /// offset plus `Content-Length`; a 200 means they don't and the total is
    /// `Content-Length` alone, if sent. Anything else is a failure.
    #[instrument(name = "probe", skip(self), fields(url = url.as_str()))]
    pub async fn probe(&self, url: &Url) -> Result<ProbeResult, CliantError> {
        let resp = self.send(url, ByteRange::open(PROBE_OFFSET)).await?;
        let status = resp.status();
        let suggested_filename = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_disposition);

        let (total_size, range_supported) = match status {
            StatusCode::PARTIAL_CONTENT => {
                let length = content_length(url, status, resp.headers())?.ok_or_else(|| {
                    CliantError::Download {
                        url: url.clone(),
                        status,
                        message: "partial content response without Content-Length".into(),
                    }
                })?;
                (Some(PROBE_OFFSET + length), true)
            }
            StatusCode::OK => (content_length(url, status, resp.headers())?, false),
            status => return Err(status_error(url, status)),
        };
        // Dropping the response here closes the connection before the body is read.
        drop(resp);

        info!(
            total_size,
            range_supported,
            suggested_filename = suggested_filename.as_deref(),
            "Probe finished."
        );
        Ok(ProbeResult { total_size, range_supported, suggested_filename })
    }

    /// Downloads `range` of `url` into `name` inside `store`.
    ///
    /// Returns the number of bytes written. A status other than 200 or 206
    /// fails immediately without retrying, and so does a 200 answering any
    /// range other than `bytes=0-`.
    #[instrument(name = "fetch", skip(self, store, tracker), fields(url = url.as_str(), range = %range))]
    pub async fn fetch(
        &self,
        url: &Url,
        range: ByteRange,
        store: &LocalFs,
        name: &str,
        tracker: &mut dyn ProgressTracker,
    ) -> Result<u64, CliantError> {
        let mut resp = self.send(url, range).await?;
        match resp.status() {
            StatusCode::PARTIAL_CONTENT => {}
            StatusCode::OK if range.start > 0 || range.end != RangeEnd::Open => {
                warn!("Server ignored range {range} for {url} and sent the full body.");
                return Err(CliantError::Download {
                    url: url.clone(),
                    status: StatusCode::OK,
                    message: format!("range {range} ignored, full body sent"),
                });
            }
            StatusCode::OK => {}
            status => return Err(status_error(url, status)),
        }

        let mut file = store.create(name).await?;
        loop {
            match resp.chunk().await {
                Ok(Some(bytes)) => {
                    let bytes_size = bytes.len();
                    file.append_bytes(bytes).await?;
                    tracker.update(bytes_size);
                }
                Ok(None) => break,
                Err(source) => {
                    error!(error = %source, "Can't get next chunk from {url}.");
                    return Err(CliantError::Stream { url: url.clone(), source });
                }
            }
        }
        let written = file.close_fs().await?;
        tracker.finish();
        info!(written, file = name, "Reach the EOF, streaming completed.");
        Ok(written)
    }
}

fn status_error(url: &Url, status: StatusCode) -> CliantError {
    CliantError::Download {
        url: url.clone(),
        status,
        message: status.canonical_reason().unwrap_or("unexpected status").to_string(),
    }
}

fn content_length(url: &Url, status: StatusCode, headers: &HeaderMap) -> Result<Option<u64>, CliantError> {
    let Some(header) = headers.get(CONTENT_LENGTH) else {
        warn!("No Content-Length for url {url}");
        return Ok(None);
    };
    header
        .to_str()
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Some)
        .ok_or_else(|| CliantError::Download {
            url: url.clone(),
            status,
            message: format!("unparsable Content-Length {header:?}"),
        })
}
