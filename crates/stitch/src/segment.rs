//! Segment Fetcher: downloads one part URL into its fixed-width file inside a stream directory.

use futures::TryStreamExt;
use regex::Regex;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

use crate::client::get_checked;
use crate::{Outcome, StitchError};

/// Extension of every downloaded part.
pub const PART_EXTENSION: &str = "ts";

static SEGMENT_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"seg-(\d+)").expect("segment index pattern is valid"));

/// One part to download, identified by its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTask {
    pub url: String,
    pub index: u64,
}

impl SegmentTask {
    pub fn from_url(url: impl Into<String>) -> Result<Self, StitchError> {
        let url = url.into();
        let index = segment_index(&url)?;
        Ok(Self { url, index })
    }

    pub fn file_name(&self) -> String {
        part_file_name(self.index)
    }
}

/// A part that is fully on disk.
#[derive(Debug, Clone)]
pub struct SavedPart {
    pub index: u64,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Extract the numeric index from the first `seg-<digits>` token of `url`.
pub fn segment_index(url: &str) -> Result<u64, StitchError> {
    SEGMENT_INDEX
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse::<u64>().ok())
        .ok_or_else(|| StitchError::SegmentIndex {
            url: url.to_string(),
        })
}

/// `00000042.ts` for index 42. Names sort lexicographically in index order
/// for indices below 10^8.
pub fn part_file_name(index: u64) -> String {
    format!("{index:08}.{PART_EXTENSION}")
}

pub struct SegmentFetcher {
    http_client: Client,
}

impl SegmentFetcher {
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }

    /// Download `url` into `dir`, reporting the URL as the outcome subject.
    pub async fn fetch(&self, url: &str, dir: &Path) -> Outcome<SavedPart> {
        let result = self.try_fetch(url, dir).await;
        if let Err(e) = &result {
            warn!(url = %url, error = %e, "Segment download failed");
        }
        Outcome::from_result(url, result)
    }

    async fn try_fetch(&self, url: &str, dir: &Path) -> Result<SavedPart, StitchError> {
        let response = get_checked(&self.http_client, url).await?;

        // Nothing touches the filesystem until the index is known.
        let task = SegmentTask::from_url(url)?;
        let path = dir.join(task.file_name());

        let file = File::create(&path)
            .await
            .map_err(|e| StitchError::filesystem(&path, e))?;
        let mut writer = BufWriter::new(file);

        let mut body = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));
        let bytes = tokio::io::copy(&mut body, &mut writer)
            .await
            .map_err(|e| StitchError::filesystem(&path, e))?;
        writer
            .flush()
            .await
            .map_err(|e| StitchError::filesystem(&path, e))?;

        debug!(url = %url, index = task.index, bytes, path = %path.display(), "Saved segment");
        Ok(SavedPart {
            index: task.index,
            path,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn index_is_taken_from_seg_token() {
        assert_eq!(segment_index("http://h/a/seg-0001.ts").unwrap(), 1);
        assert_eq!(segment_index("http://h/a/seg-42-v1.ts?x=seg-7").unwrap(), 42);
        assert_eq!(segment_index("http://h/a/720p-seg-000123.ts").unwrap(), 123);
    }

    #[test]
    fn missing_or_oversized_index_is_a_parse_error() {
        let err = segment_index("http://h/a/part-1.ts").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);

        let err = segment_index("http://h/a/seg-99999999999999999999999.ts").unwrap_err();
        assert!(matches!(err, StitchError::SegmentIndex { .. }));
    }

    #[test]
    fn file_names_are_fixed_width() {
        assert_eq!(part_file_name(0), "00000000.ts");
        assert_eq!(part_file_name(1), "00000001.ts");
        assert_eq!(part_file_name(12_345_678), "12345678.ts");

        let mut names: Vec<String> = [10, 2, 100, 1].into_iter().map(part_file_name).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["00000001.ts", "00000002.ts", "00000010.ts", "00000100.ts"]
        );
    }

    #[test]
    fn task_derives_name_from_url() {
        let task = SegmentTask::from_url("http://h/a/seg-0007.ts").unwrap();
        assert_eq!(task.index, 7);
        assert_eq!(task.file_name(), "00000007.ts");
    }
}
