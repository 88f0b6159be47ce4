//! # Stitch
//!
//! Batch downloader for segmented streams. Every stream of a batch is a
//! playlist of relative part URLs; parts are fetched concurrently into a
//! per-stream directory and merged into a single file as soon as the stream
//! is complete.
//!
//! ## Features
//!
//! - Concurrent streams and concurrent parts, each with an optional limit
//! - Fixed-width part names derived from the `seg-<n>` token of each URL
//! - Pluggable merge tool (ffmpeg concat demuxer or plain byte concatenation)
//! - Failures stay scoped to the stream they happened in

pub mod batch;
pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod jobs;
pub mod merge;
pub mod outcome;
pub mod playlist;
pub mod segment;
pub mod stream;

pub use batch::{BatchOrchestrator, BatchReport, StreamStatus};
pub use builder::DownloaderConfigBuilder;
pub use config::{DownloaderConfig, MergeConfig, MergeToolKind, StitchConfig};
pub use error::{ErrorKind, StitchError};
pub use jobs::{StreamJob, load_jobs};
pub use merge::{FfmpegConcat, MergeCoordinator, MergeTool, MergedStream, NativeConcat};
pub use outcome::Outcome;
pub use segment::{SavedPart, SegmentFetcher};
pub use stream::{DownloadedStream, StreamDownloader};

pub use client::create_client;
