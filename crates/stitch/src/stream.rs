//! Stream Download Coordinator: fetches a playlist and fans out one segment fetch per part.

use futures::TryStreamExt;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::io::StreamReader;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::client::get_checked;
use crate::config::permits_for;
use crate::playlist::resolve_parts;
use crate::segment::{SavedPart, SegmentFetcher};
use crate::{Outcome, StitchConfig, StitchError, StreamJob};

/// A stream whose parts are all on disk and ready to merge.
#[derive(Debug, Clone)]
pub struct DownloadedStream {
    pub name: String,
    pub dir: PathBuf,
    /// Parts in completion order
    pub parts: Vec<SavedPart>,
}

impl DownloadedStream {
    pub fn total_bytes(&self) -> u64 {
        self.parts.iter().map(|part| part.bytes).sum()
    }
}

pub struct StreamDownloader {
    http_client: Client,
    fetcher: Arc<SegmentFetcher>,
    config: Arc<StitchConfig>,
    /// Shared by every stream so the limit holds across the whole batch
    segment_permits: Arc<Semaphore>,
}

impl StreamDownloader {
    pub fn new(http_client: Client, config: Arc<StitchConfig>) -> Self {
        let fetcher = Arc::new(SegmentFetcher::new(http_client.clone()));
        let segment_permits = Arc::new(Semaphore::new(permits_for(config.segment_concurrency)));
        Self {
            http_client,
            fetcher,
            config,
            segment_permits,
        }
    }

    /// Download every part of `job` and report one outcome named after the stream.
    pub async fn download(&self, job: &StreamJob) -> Outcome<DownloadedStream> {
        let span = info_span!("download", stream = %job.name);
        let result = self.try_download(job).instrument(span).await;
        Outcome::from_result(&job.name, result)
    }

    async fn try_download(&self, job: &StreamJob) -> Result<DownloadedStream, StitchError> {
        let response = get_checked(&self.http_client, &job.playlist_url).await?;
        let body = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));
        let urls = resolve_parts(body, &job.playlist_url).await?;
        debug!(parts = urls.len(), "Resolved playlist");

        // `create_dir` rather than `create_dir_all`: an existing directory means a
        // previous run, and resuming into it is not supported.
        let dir = self.config.stream_dir(&job.name);
        tokio::fs::create_dir(&dir)
            .await
            .map_err(|e| StitchError::filesystem(&dir, e))?;

        let total = urls.len();
        let mut parts = Vec::with_capacity(total);
        if total == 0 {
            info!("Playlist has no parts");
            return Ok(DownloadedStream {
                name: job.name.clone(),
                dir,
                parts,
            });
        }

        // Room for every outcome, so workers never block on a receiver that
        // stopped listening after the first failure.
        let (outcome_tx, mut outcome_rx) = mpsc::channel::<Outcome<SavedPart>>(total);

        for url in urls {
            let fetcher = Arc::clone(&self.fetcher);
            let permits = Arc::clone(&self.segment_permits);
            let outcome_tx = outcome_tx.clone();
            let dir = dir.clone();

            tokio::spawn(
                async move {
                    // The semaphore is never closed, so acquiring only fails after drop.
                    let _permit = permits.acquire_owned().await.ok();
                    let outcome = fetcher.fetch(&url, &dir).await;
                    // Ignored when the stream already failed and dropped the receiver.
                    let _ = outcome_tx.send(outcome).await;
                }
                .in_current_span(),
            );
        }
        drop(outcome_tx);

        for _ in 0..total {
            match outcome_rx.recv().await {
                Some(Outcome::Success { value, .. }) => parts.push(value),
                Some(Outcome::Failure { subject, cause }) => {
                    // Siblings keep running and finish into the buffered channel.
                    warn!(url = %subject, "Aborting stream on first failed segment");
                    return Err(StitchError::segment(subject, cause));
                }
                None => {
                    return Err(StitchError::internal(format!(
                        "segment workers exited after reporting {} of {total} outcomes",
                        parts.len()
                    )));
                }
            }
        }

        Ok(DownloadedStream {
            name: job.name.clone(),
            dir,
            parts,
        })
    }
}
