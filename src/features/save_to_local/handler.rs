use std::path::{Path, PathBuf};
use std::sync::Arc;

use path_clean::PathClean;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use super::assemble::{reassemble, remove_parts};
use super::request::{DownloadOutcome, DownloadRequest, FailurePolicy};
use super::split_parts::split_parts;
use crate::shared::errors::CliantError;
use crate::shared::fs::LocalFs;
use crate::shared::network::ByteRange;
use crate::shared::network::http::{HttpAdapter, ProbeResult};
use crate::shared::progress_tracker::{NoOpProgressTracker, ProgressTracker, TerminalSession};

/// Upper bound on concurrent segment connections for one download.
pub const MAX_SEGMENTS: usize = 64;

/// Part files registered by workers as they start.
type PartRegistry = Arc<Mutex<Vec<String>>>;

/// Runs one [`DownloadRequest`]: probe, split, fetch in parallel, reassemble.
pub struct Downloader {
    request: DownloadRequest,
    adapter: Arc<HttpAdapter>,
    session: Option<TerminalSession>,
}

impl Downloader {
    pub fn new(request: DownloadRequest) -> Result<Self, CliantError> {
        let adapter = Arc::new(HttpAdapter::new(request.http())?);
        let session = request.show_progress().then(TerminalSession::new);
        Ok(Self { request, adapter, session })
    }

    fn tracker(&self, label: String, total: Option<u64>) -> Box<dyn ProgressTracker> {
        match &self.session {
            Some(session) => Box::new(session.reporter(label, total)),
            None => Box::new(NoOpProgressTracker),
        }
    }

    /// Downloads the request's URL to its output path.
    ///
    /// Falls back to a single stream when the probe fails or the server
    /// doesn't do ranges; the thread count is ignored then.
    #[instrument(name = "download", skip(self), fields(url = self.request.url().as_str(), output = %self.request.output().display()))]
    pub async fn download(&self) -> Result<DownloadOutcome, CliantError> {
        let (root, output_name) = split_output(self.request.output())?;
        let store = Arc::new(LocalFs::new(&root)?);

        let probe = match self.adapter.probe(self.request.url()).await {
            Ok(probe) => Some(probe),
            Err(err) => {
                warn!(error = %err, "Probe failed, falling back to a single stream.");
                None
            }
        };

        let segmented_total = probe
            .as_ref()
            .filter(|probe| *probe.range_supported())
            .and_then(|probe| *probe.total_size())
            .filter(|total| *total > 0);

        match segmented_total {
            Some(total) => self.download_segments(store, &output_name, total).await,
            None => self.download_single(&store, &output_name, probe).await,
        }
    }

    async fn download_single(
        &self,
        store: &LocalFs,
        output_name: &str,
        probe: Option<ProbeResult>,
    ) -> Result<DownloadOutcome, CliantError> {
        let total = probe.as_ref().and_then(|probe| *probe.total_size());
        info!(total, "Downloading as a single stream.");
        let mut tracker = self.tracker(output_name.to_string(), total);
        let bytes = self
            .adapter
            .fetch(self.request.url(), ByteRange::open(0), store, output_name, tracker.as_mut())
            .await?;
        Ok(DownloadOutcome::new(
            store.path_of(output_name),
            bytes,
            1,
            vec![],
            probe.and_then(|probe| probe.suggested_filename().clone()),
        ))
    }

    async fn download_segments(
        &self,
        store: Arc<LocalFs>,
        output_name: &str,
        total: u64,
    ) -> Result<DownloadOutcome, CliantError> {
        let requested = *self.request.threads();
        let threads = requested.clamp(1, MAX_SEGMENTS);
        if threads != requested {
            warn!(requested, threads, "Segment count adjusted.");
        }
        let segments = split_parts(total, threads);
        info!(total, segments = segments.len(), "Planned segments.");

        let registry: PartRegistry = Arc::new(Mutex::new(Vec::with_capacity(segments.len())));
        let mut workers = JoinSet::new();
        for segment in &segments {
            let segment = *segment;
            let adapter = Arc::clone(&self.adapter);
            let store = Arc::clone(&store);
            let registry = Arc::clone(&registry);
            let url = self.request.url().clone();
            let part_name = segment.part_name(output_name);
            let mut tracker = self.tracker(format!("part {}", segment.index), segment.range.len());
            workers.spawn(async move {
                registry.lock().await.push(part_name.clone());
                let result = adapter
                    .fetch(&url, segment.range, &store, &part_name, tracker.as_mut())
                    .await;
                (segment.index, result)
            });
        }

        let mut failed_segments = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((_, Ok(_))) => {}
                Ok((index, Err(err))) => {
                    error!(segment = index, url = %self.request.url(), error = %err, "Segment failed.");
                    match self.request.failure_policy() {
                        FailurePolicy::FailFast => {
                            self.abort(&mut workers, &store, &registry).await;
                            return Err(CliantError::Segment { index, source: Box::new(err) });
                        }
                        FailurePolicy::BestEffort => failed_segments.push(index),
                    }
                }
                Err(join_err) => {
                    error!(error = %join_err, "Segment worker died.");
                    self.abort(&mut workers, &store, &registry).await;
                    return Err(CliantError::Fatal(format!("segment worker died: {join_err}")));
                }
            }
        }
        failed_segments.sort_unstable();

        let parts: Vec<String> = segments
            .iter()
            .filter(|segment| !failed_segments.contains(&segment.index))
            .map(|segment| segment.part_name(output_name))
            .collect();
        let bytes = reassemble(&store, output_name, &parts).await?;

        if !failed_segments.is_empty() {
            warn!(failed = ?failed_segments, "Output is missing failed segments.");
        } else if bytes != total {
            warn!(bytes, total, "Assembled size differs from the probed size.");
        }

        if !*self.request.keep_parts() {
            remove_parts(&store, &registry.lock().await).await;
        }

        Ok(DownloadOutcome::new(
            store.path_of(output_name),
            bytes,
            segments.len(),
            failed_segments,
            None,
        ))
    }

    /// Stops every remaining worker and removes the part files registered so far.
    async fn abort(
        &self,
        workers: &mut JoinSet<(usize, Result<u64, CliantError>)>,
        store: &LocalFs,
        registry: &PartRegistry,
    ) {
        workers.abort_all();
        while workers.join_next().await.is_some() {}
        if !*self.request.keep_parts() {
            remove_parts(store, &registry.lock().await).await;
        }
    }
}

/// Splits the output path into its directory and file name.
fn split_output(output: &Path) -> Result<(PathBuf, String), CliantError> {
    let absolute = std::path::absolute(output)
        .map_err(|source| CliantError::Filesystem { path: output.to_path_buf(), source })?
        .clean();
    let name = absolute
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| CliantError::Config(format!("{} is not a file path", output.display())))?
        .to_string();
    let root = absolute.parent().map_or_else(|| PathBuf::from("/"), Path::to_path_buf);
    Ok((root, name))
}
