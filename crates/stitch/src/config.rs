use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

pub const DEFAULT_ROOT_DIR: &str = "videos";
pub const DEFAULT_MANIFEST_NAME: &str = "concat.txt";
pub const DEFAULT_OUTPUT_EXTENSION: &str = "mp4";
pub const DEFAULT_SEGMENT_CONCURRENCY: usize = 8;
pub const DEFAULT_STREAM_CONCURRENCY: usize = 4;

/// HTTP options shared by every playlist and part request
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Overall timeout for a whole request, zero disables it
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// How long idle pooled connections are kept around
    pub pool_idle_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers, merged over the defaults
    pub headers: HeaderMap,

    /// Explicit proxy URL used for all schemes
    pub proxy: Option<String>,

    /// Whether to use system proxy settings if no explicit proxy is set
    pub use_system_proxy: bool,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(0),
            connect_timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(30),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: DownloaderConfig::get_default_headers(),
            proxy: None,
            use_system_proxy: true,
        }
    }
}

impl DownloaderConfig {
    pub fn builder() -> crate::builder::DownloaderConfigBuilder {
        crate::builder::DownloaderConfigBuilder::new()
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        default_headers
    }
}

/// Which tool concatenates downloaded parts into the final file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum MergeToolKind {
    /// External `ffmpeg` binary using the concat demuxer, codecs copied
    #[default]
    Ffmpeg,
    /// In-process byte concatenation, valid for MPEG-TS parts
    Native,
}

#[derive(Debug, Clone)]
pub struct MergeConfig {
    pub tool: MergeToolKind,
    /// Path or name of the ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Extra output arguments passed to ffmpeg before the output path
    pub extra_args: Vec<String>,
    /// File name of the concat manifest written inside each stream directory
    pub manifest_name: String,
    /// Extension of the merged artifact, without the leading dot
    pub output_extension: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            tool: MergeToolKind::default(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            extra_args: Vec::new(),
            manifest_name: DEFAULT_MANIFEST_NAME.to_owned(),
            output_extension: DEFAULT_OUTPUT_EXTENSION.to_owned(),
        }
    }
}

/// Settings for one batch run
#[derive(Debug, Clone)]
pub struct StitchConfig {
    /// Directory holding one working directory per stream and the merged files
    pub root_dir: PathBuf,
    /// Maximum in-flight part downloads across all streams, `0` for unbounded
    pub segment_concurrency: usize,
    /// Maximum streams downloading at once, `0` for unbounded
    pub stream_concurrency: usize,
    pub merge: MergeConfig,
    pub http: DownloaderConfig,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(DEFAULT_ROOT_DIR),
            segment_concurrency: DEFAULT_SEGMENT_CONCURRENCY,
            stream_concurrency: DEFAULT_STREAM_CONCURRENCY,
            merge: MergeConfig::default(),
            http: DownloaderConfig::default(),
        }
    }
}

impl StitchConfig {
    /// Working directory of a stream: `<root>/<name>`.
    pub fn stream_dir(&self, name: &str) -> PathBuf {
        self.root_dir.join(name)
    }

    /// Merged artifact of a stream directory: `<dir>.<ext>`.
    pub fn output_path(&self, stream_dir: &Path) -> PathBuf {
        output_path_for(stream_dir, &self.merge.output_extension)
    }
}

pub(crate) fn output_path_for(stream_dir: &Path, extension: &str) -> PathBuf {
    // Appended rather than `with_extension` so names containing dots survive.
    let mut path = stream_dir.as_os_str().to_owned();
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}

/// Turn a configured limit into semaphore permits, `0` meaning unbounded.
pub(crate) fn permits_for(limit: usize) -> usize {
    if limit == 0 {
        tokio::sync::Semaphore::MAX_PERMITS
    } else {
        limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_keeps_dotted_names() {
        let config = StitchConfig {
            root_dir: PathBuf::from("videos"),
            ..Default::default()
        };
        let dir = config.stream_dir("show.s01e02");
        assert_eq!(dir, PathBuf::from("videos/show.s01e02"));
        assert_eq!(
            config.output_path(&dir),
            PathBuf::from("videos/show.s01e02.mp4")
        );
    }

    #[test]
    fn zero_limit_is_unbounded() {
        assert_eq!(permits_for(0), tokio::sync::Semaphore::MAX_PERMITS);
        assert_eq!(permits_for(3), 3);
    }
}
