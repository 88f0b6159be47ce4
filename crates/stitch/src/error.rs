use reqwest::StatusCode;
use std::path::{Path, PathBuf};

/// Coarse category of a [`StitchError`], used when reporting per-stream status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Network,
    Parse,
    Filesystem,
    MergeTool,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum StitchError {
    #[error("could not read batch file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed batch file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid stream name `{name}`: {reason}")]
    InvalidStreamName { name: String, reason: &'static str },

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("bad status {}", status.as_u16())]
    HttpStatus { status: StatusCode, url: String },

    #[error("failed to read playlist: {source}")]
    PlaylistRead {
        #[source]
        source: std::io::Error,
    },

    #[error("bad segment number in `{url}`")]
    SegmentIndex { url: String },

    #[error("I/O error on {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write concat manifest {}: {source}", path.display())]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("merge tool error: {reason}")]
    MergeTool { reason: String },

    #[error("segment {url} failed: {source}")]
    Segment {
        url: String,
        #[source]
        source: Box<StitchError>,
    },

    #[error("TLS configuration error: {reason}")]
    Tls { reason: String },

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl StitchError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn http_status(status: StatusCode, url: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
        }
    }

    pub fn filesystem(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn merge_tool(reason: impl Into<String>) -> Self {
        Self::MergeTool {
            reason: reason.into(),
        }
    }

    /// Lift a segment-scoped failure into the failure of its owning stream.
    pub fn segment(url: impl Into<String>, cause: StitchError) -> Self {
        Self::Segment {
            url: url.into(),
            source: Box::new(cause),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigRead { .. } | Self::ConfigParse { .. } | Self::InvalidStreamName { .. } => {
                ErrorKind::Config
            }
            Self::InvalidUrl { .. } | Self::Network { .. } | Self::HttpStatus { .. } => {
                ErrorKind::Network
            }
            Self::PlaylistRead { .. } | Self::SegmentIndex { .. } => ErrorKind::Parse,
            Self::Filesystem { .. } => ErrorKind::Filesystem,
            Self::ManifestWrite { .. } | Self::MergeTool { .. } => ErrorKind::MergeTool,
            // A stream failed because of one of its parts; report the part's category.
            Self::Segment { source, .. } => source.kind(),
            Self::Tls { .. } => ErrorKind::Config,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Whether this error, or the segment failure it wraps, is fatal for the whole run.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Config
    }
}
