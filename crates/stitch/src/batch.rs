//! Batch Orchestrator: drives the download stage and the merge stage over every stream of a batch.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tracing::{error, info, warn};

use crate::config::permits_for;
use crate::merge::{MergeCoordinator, MergedStream};
use crate::stream::{DownloadedStream, StreamDownloader};
use crate::{Outcome, StitchConfig, StitchError, StreamJob, create_client};

/// Final state of one stream after both stages.
#[derive(Debug)]
pub enum StreamStatus {
    DownloadFailed(StitchError),
    MergeFailed {
        dir: PathBuf,
        cause: StitchError,
    },
    Merged(MergedStream),
}

impl StreamStatus {
    pub fn is_merged(&self) -> bool {
        matches!(self, Self::Merged(_))
    }
}

/// Per-stream results of a batch run, keyed by stream name.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub streams: BTreeMap<String, StreamStatus>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.streams.len()
    }

    pub fn merged(&self) -> usize {
        self.streams.values().filter(|s| s.is_merged()).count()
    }

    pub fn download_failures(&self) -> usize {
        self.streams
            .values()
            .filter(|s| matches!(s, StreamStatus::DownloadFailed(_)))
            .count()
    }

    pub fn merge_failures(&self) -> usize {
        self.streams
            .values()
            .filter(|s| matches!(s, StreamStatus::MergeFailed { .. }))
            .count()
    }

    pub fn status(&self, name: &str) -> Option<&StreamStatus> {
        self.streams.get(name)
    }
}

pub struct BatchOrchestrator {
    config: Arc<StitchConfig>,
    downloader: Arc<StreamDownloader>,
    merger: Arc<MergeCoordinator>,
}

impl BatchOrchestrator {
    /// Build the orchestrator with its own HTTP client and the configured merge tool.
    pub fn new(config: StitchConfig) -> Result<Self, StitchError> {
        let merger = MergeCoordinator::new(config.merge.clone());
        Self::with_merger(config, merger)
    }

    pub fn with_merger(config: StitchConfig, merger: MergeCoordinator) -> Result<Self, StitchError> {
        let client = create_client(&config.http)?;
        let config = Arc::new(config);
        let downloader = Arc::new(StreamDownloader::new(client, Arc::clone(&config)));
        Ok(Self {
            config,
            downloader,
            merger: Arc::new(merger),
        })
    }

    pub fn config(&self) -> &StitchConfig {
        &self.config
    }

    /// Download every job concurrently, merge each stream as soon as its download
    /// succeeds, and return once every download and every started merge has reported.
    ///
    /// A failing stream never affects its siblings. The only error returned is
    /// failing to create the root directory.
    pub async fn run(&self, jobs: Vec<StreamJob>) -> Result<BatchReport, StitchError> {
        let root = &self.config.root_dir;
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| StitchError::filesystem(root, e))?;

        let total = jobs.len();
        let mut report = BatchReport::default();
        info!(streams = total, root = %root.display(), "Starting batch");
        if total == 0 {
            return Ok(report);
        }

        let (download_tx, mut download_rx) = mpsc::channel::<Outcome<DownloadedStream>>(total);
        let stream_permits = Arc::new(Semaphore::new(permits_for(self.config.stream_concurrency)));

        for job in jobs {
            let downloader = Arc::clone(&self.downloader);
            let permits = Arc::clone(&stream_permits);
            let download_tx = download_tx.clone();
            tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let outcome = downloader.download(&job).await;
                let _ = download_tx.send(outcome).await;
            });
        }
        drop(download_tx);

        let (merge_tx, mut merge_rx) = mpsc::channel::<Outcome<MergedStream>>(total);
        let mut pending: BTreeMap<String, PathBuf> = BTreeMap::new();

        // First-arrived-first-handled: a stream starts merging while others still download.
        for _ in 0..total {
            let Some(outcome) = download_rx.recv().await else {
                warn!("Download workers exited before every stream reported");
                break;
            };
            match outcome {
                Outcome::Success { subject, value } => {
                    info!(
                        stream = %subject,
                        parts = value.parts.len(),
                        bytes = value.total_bytes(),
                        "downloaded: {subject}"
                    );
                    pending.insert(subject, value.dir.clone());

                    let merger = Arc::clone(&self.merger);
                    let merge_tx = merge_tx.clone();
                    tokio::spawn(async move {
                        let outcome = merger.merge(&value).await;
                        let _ = merge_tx.send(outcome).await;
                    });
                }
                Outcome::Failure { subject, cause } => {
                    error!(stream = %subject, "could not download: {subject} {cause}");
                    report
                        .streams
                        .insert(subject, StreamStatus::DownloadFailed(cause));
                }
            }
        }
        drop(merge_tx);

        for _ in 0..pending.len() {
            let Some(outcome) = merge_rx.recv().await else {
                warn!("Merge workers exited before every stream reported");
                break;
            };
            match outcome {
                Outcome::Success { subject, value } => {
                    info!(stream = %subject, output = %value.output.display(), "merged: {subject}");
                    pending.remove(&subject);
                    report.streams.insert(subject, StreamStatus::Merged(value));
                }
                Outcome::Failure { subject, cause } => {
                    error!(stream = %subject, "could not merge: {subject} {cause}");
                    let dir = pending
                        .remove(&subject)
                        .unwrap_or_else(|| self.config.stream_dir(&subject));
                    report
                        .streams
                        .insert(subject, StreamStatus::MergeFailed { dir, cause });
                }
            }
        }

        // Only reachable if a merge worker panicked before reporting.
        for (name, dir) in pending {
            report.streams.insert(
                name,
                StreamStatus::MergeFailed {
                    dir,
                    cause: StitchError::internal("merge worker exited without reporting"),
                },
            );
        }

        info!(
            streams = report.total(),
            merged = report.merged(),
            download_failures = report.download_failures(),
            merge_failures = report.merge_failures(),
            "Batch finished"
        );
        Ok(report)
    }
}
