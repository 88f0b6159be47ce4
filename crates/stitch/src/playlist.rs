//! Playlist resolution: turns a playlist body into the absolute URLs of its parts.
//!
//! Only the `./<name>` relative-path convention is recognized. Tags, comments,
//! variant streams and timing metadata are skipped, whatever their encoding.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::trace;

use crate::StitchError;

const RELATIVE_PREFIX: &str = "./";
const RELATIVE_PREFIX_BYTES: &[u8] = RELATIVE_PREFIX.as_bytes();

/// Everything before the last `/` of the playlist URL.
pub fn playlist_base(playlist_url: &str) -> Result<&str, StitchError> {
    playlist_url
        .rfind('/')
        .map(|pos| &playlist_url[..pos])
        .ok_or_else(|| StitchError::invalid_url(playlist_url, "no path separator in URL"))
}

/// Rewrite one playlist line into an absolute part URL, if it is a relative part entry.
pub fn resolve_line(base: &str, line: &str) -> Option<String> {
    line.strip_prefix(RELATIVE_PREFIX)
        .map(|rest| format!("{base}/{rest}"))
}

/// Scan `body` line by line and collect part URLs in playlist order.
///
/// Lines are matched as raw bytes, so metadata in any encoding is skipped.
/// Fails with [`StitchError::PlaylistRead`] only if reading the body fails.
pub async fn resolve_parts<R>(body: R, playlist_url: &str) -> Result<Vec<String>, StitchError>
where
    R: AsyncBufRead + Unpin,
{
    let base = playlist_base(playlist_url)?;
    let mut parts = Vec::new();
    let mut lines = body.split(b'\n');

    while let Some(line) = lines
        .next_segment()
        .await
        .map_err(|source| StitchError::PlaylistRead { source })?
    {
        let trimmed = line.strip_suffix(b"\r").unwrap_or(line.as_slice());
        if !trimmed.starts_with(RELATIVE_PREFIX_BYTES) {
            continue;
        }
        if let Some(url) = resolve_line(base, &String::from_utf8_lossy(trimmed)) {
            trace!(part = %url, "Resolved playlist entry");
            parts.push(url);
        }
    }

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const PLAYLIST: &str = "#EXTM3U\n\
        #EXT-X-VERSION:3\n\
        #EXT-X-TARGETDURATION:10\n\
        #EXTINF:10.0,\n\
        ./seg-0001.ts\n\
        #EXTINF:10.0,\n\
        ./seg-0000.ts\r\n\
        https://cdn.example.com/seg-0009.ts\n\
        seg-0010.ts\n\
        #EXT-X-ENDLIST\n";

    #[test]
    fn base_is_truncated_at_last_separator() {
        assert_eq!(
            playlist_base("http://h/a/playlist.m3u8").unwrap(),
            "http://h/a"
        );
        assert_eq!(
            playlist_base("http://h/a/b/index.m3u8?token=1").unwrap(),
            "http://h/a/b"
        );
        assert!(playlist_base("playlist.m3u8").is_err());
    }

    #[tokio::test]
    async fn keeps_only_relative_entries_in_order() {
        let parts = resolve_parts(PLAYLIST.as_bytes(), "http://h/a/playlist.m3u8")
            .await
            .unwrap();

        assert_eq!(
            parts,
            vec![
                "http://h/a/seg-0001.ts".to_string(),
                "http://h/a/seg-0000.ts".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn marker_must_start_the_line() {
        let body = " ./seg-1.ts\n#./seg-2.ts\n./nested/seg-3.ts\n";
        let parts = resolve_parts(body.as_bytes(), "http://h/v/p.m3u8")
            .await
            .unwrap();
        assert_eq!(parts, vec!["http://h/v/nested/seg-3.ts".to_string()]);
    }

    #[tokio::test]
    async fn empty_playlist_has_no_parts() {
        let parts = resolve_parts("#EXTM3U\n".as_bytes(), "http://h/a/p.m3u8")
            .await
            .unwrap();
        assert!(parts.is_empty());
    }

    #[tokio::test]
    async fn non_utf8_metadata_lines_are_skipped() {
        let body: &[u8] = b"#EXTM3U\n#EXTINF:10,Caf\xe9\n./seg-0000.ts\r\n./seg-0001.ts";
        let parts = resolve_parts(body, "http://h/a/p.m3u8").await.unwrap();
        assert_eq!(
            parts,
            vec![
                "http://h/a/seg-0000.ts".to_string(),
                "http://h/a/seg-0001.ts".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn read_failure_is_a_parse_error() {
        let chunks: Vec<std::io::Result<&'static [u8]>> = vec![
            Ok(&b"./seg-0000.ts\n"[..]),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )),
        ];
        let body = tokio_util::io::StreamReader::new(futures::stream::iter(chunks));

        let err = resolve_parts(body, "http://h/a/p.m3u8").await.unwrap_err();
        assert!(matches!(err, StitchError::PlaylistRead { .. }));
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}
