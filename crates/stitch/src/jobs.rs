use std::collections::BTreeMap;
use std::path::{Component, Path};

use tracing::debug;

use crate::StitchError;

/// One named stream of the batch and the playlist it is downloaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamJob {
    pub name: String,
    pub playlist_url: String,
}

impl StreamJob {
    pub fn new(name: impl Into<String>, playlist_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            playlist_url: playlist_url.into(),
        }
    }
}

/// Read a JSON object of `name -> playlist URL` and turn it into jobs, ordered by name.
pub async fn load_jobs(path: &Path) -> Result<Vec<StreamJob>, StitchError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| StitchError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

    let jobs = parse_jobs(&content).map_err(|err| match err {
        JobsError::Json(source) => StitchError::ConfigParse {
            path: path.to_path_buf(),
            source,
        },
        JobsError::Name(err) => err,
    })?;
    debug!(path = %path.display(), streams = jobs.len(), "Loaded batch file");
    Ok(jobs)
}

enum JobsError {
    Json(serde_json::Error),
    Name(StitchError),
}

fn parse_jobs(content: &str) -> Result<Vec<StreamJob>, JobsError> {
    let mapping: BTreeMap<String, String> = serde_json::from_str(content).map_err(JobsError::Json)?;
    jobs_from_map(mapping).map_err(JobsError::Name)
}

/// Validate names and build jobs from an in-memory mapping.
pub fn jobs_from_map(
    mapping: impl IntoIterator<Item = (String, String)>,
) -> Result<Vec<StreamJob>, StitchError> {
    mapping
        .into_iter()
        .map(|(name, url)| {
            validate_stream_name(&name)?;
            Ok(StreamJob::new(name, url))
        })
        .collect()
}

/// A stream name becomes a directory under the root, so it must be exactly one
/// plain path component.
pub fn validate_stream_name(name: &str) -> Result<(), StitchError> {
    let invalid = |reason| StitchError::InvalidStreamName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.contains(['/', '\\']) {
        return Err(invalid("name contains a path separator"));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid("name is not a plain directory name")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;

    #[tokio::test]
    async fn loads_mapping_in_name_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"b": "http://h/b/playlist.m3u8", "a": "http://h/a/playlist.m3u8"}}"#
        )
        .unwrap();

        let jobs = load_jobs(file.path()).await.unwrap();
        assert_eq!(
            jobs,
            vec![
                StreamJob::new("a", "http://h/a/playlist.m3u8"),
                StreamJob::new("b", "http://h/b/playlist.m3u8"),
            ]
        );
    }

    #[tokio::test]
    async fn malformed_json_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"a": 1}}"#).unwrap();

        let err = load_jobs(file.path()).await.unwrap_err();
        assert!(matches!(err, StitchError::ConfigParse { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_jobs(&dir.path().join("manifests.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, StitchError::ConfigRead { .. }));
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn rejects_names_that_escape_the_root() {
        for name in ["", ".", "..", "a/b", "..\\a", "/abs"] {
            assert!(validate_stream_name(name).is_err(), "accepted {name:?}");
        }
        for name in ["a", "show.s01e02", "my stream"] {
            assert!(validate_stream_name(name).is_ok(), "rejected {name:?}");
        }
    }
}
