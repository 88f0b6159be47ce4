//! Merge Coordinator and the tools it can hand a concat manifest to.
//!
//! The coordinator lists the part files of a stream directory, writes a
//! manifest with one `file <name>` line per part, and asks a [`MergeTool`] to
//! concatenate them into `<dir>.<ext>` without re-encoding.

use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{Instrument, debug, error, info_span, warn};

use crate::config::{MergeConfig, MergeToolKind, output_path_for};
use crate::stream::DownloadedStream;
use crate::{Outcome, StitchError};

/// Concatenates the files named in a manifest into one output file.
#[async_trait]
pub trait MergeTool: Send + Sync {
    fn name(&self) -> &str;

    async fn concat(&self, manifest: &Path, output: &Path) -> Result<(), StitchError>;
}

/// A merged stream.
#[derive(Debug, Clone)]
pub struct MergedStream {
    pub name: String,
    pub output: PathBuf,
    pub manifest: PathBuf,
    /// Part file names in the order they were merged
    pub entries: Vec<String>,
}

pub struct MergeCoordinator {
    config: MergeConfig,
    tool: Arc<dyn MergeTool>,
}

impl MergeCoordinator {
    pub fn new(config: MergeConfig) -> Self {
        let tool: Arc<dyn MergeTool> = match config.tool {
            MergeToolKind::Ffmpeg => Arc::new(FfmpegConcat::new(
                config.ffmpeg_path.clone(),
                config.extra_args.clone(),
            )),
            MergeToolKind::Native => Arc::new(NativeConcat),
        };
        Self::with_tool(config, tool)
    }

    pub fn with_tool(config: MergeConfig, tool: Arc<dyn MergeTool>) -> Self {
        Self { config, tool }
    }

    pub fn tool(&self) -> &dyn MergeTool {
        self.tool.as_ref()
    }

    /// Merge a downloaded stream, reporting the stream name as the outcome subject.
    pub async fn merge(&self, stream: &DownloadedStream) -> Outcome<MergedStream> {
        let span = info_span!("merge", stream = %stream.name);
        let result = self.merge_dir(&stream.name, &stream.dir).instrument(span).await;
        if let Err(e) = &result {
            error!(stream = %stream.name, error = %e, "Merge failed");
        }
        Outcome::from_result(&stream.name, result)
    }

    pub async fn merge_dir(&self, name: &str, dir: &Path) -> Result<MergedStream, StitchError> {
        let (manifest, entries) = self.write_manifest(dir).await?;
        let output = output_path_for(dir, &self.config.output_extension);

        debug!(
            tool = self.tool.name(),
            parts = entries.len(),
            output = %output.display(),
            "Concatenating parts"
        );
        // A failed run may leave a partial output behind; it is not removed.
        self.tool.concat(&manifest, &output).await?;

        Ok(MergedStream {
            name: name.to_string(),
            output,
            manifest,
            entries,
        })
    }

    /// Write the concat manifest into `dir` and return its path with the listed entries.
    ///
    /// Lists every regular file except the manifest itself, sorted by name, which is
    /// ascending segment order thanks to the fixed-width part names.
    pub async fn write_manifest(&self, dir: &Path) -> Result<(PathBuf, Vec<String>), StitchError> {
        let entries = list_parts(dir, &self.config.manifest_name).await?;
        let manifest = dir.join(&self.config.manifest_name);

        let write_err = |source: std::io::Error| StitchError::ManifestWrite {
            path: manifest.clone(),
            source,
        };
        let mut writer = BufWriter::new(File::create(&manifest).await.map_err(write_err)?);
        for entry in &entries {
            writer
                .write_all(format!("file {entry}\n").as_bytes())
                .await
                .map_err(write_err)?;
        }
        writer.flush().await.map_err(write_err)?;

        Ok((manifest, entries))
    }
}

async fn list_parts(dir: &Path, manifest_name: &str) -> Result<Vec<String>, StitchError> {
    let fs_err = |e: std::io::Error| StitchError::filesystem(dir, e);
    let mut read_dir = tokio::fs::read_dir(dir).await.map_err(fs_err)?;

    let mut names = Vec::new();
    while let Some(entry) = read_dir.next_entry().await.map_err(fs_err)? {
        if !entry.file_type().await.map_err(fs_err)?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str().map(str::to_owned) else {
            // The manifest is text, so such a file cannot be listed in it.
            warn!(
                dir = %dir.display(),
                file = %file_name.to_string_lossy(),
                "Skipping part with a non UTF-8 file name"
            );
            continue;
        };
        if name != manifest_name {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Lossless concatenation through ffmpeg's concat demuxer.
pub struct FfmpegConcat {
    binary_path: PathBuf,
    extra_args: Vec<String>,
}

impl FfmpegConcat {
    pub fn new(binary_path: impl Into<PathBuf>, extra_args: Vec<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            extra_args,
        }
    }

    fn build_args<'a>(&'a self, manifest: &'a Path, output: &'a Path) -> Vec<&'a OsStr> {
        let mut args: Vec<&'a OsStr> = ["-hide_banner", "-loglevel", "error", "-y"]
            .into_iter()
            .map(OsStr::new)
            .collect();
        args.extend(["-f", "concat", "-safe", "0", "-i"].map(OsStr::new));
        args.push(manifest.as_os_str());
        args.extend(["-c", "copy"].map(OsStr::new));
        args.extend(self.extra_args.iter().map(OsStr::new));
        args.push(output.as_os_str());
        args
    }
}

#[async_trait]
impl MergeTool for FfmpegConcat {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn concat(&self, manifest: &Path, output: &Path) -> Result<(), StitchError> {
        let args = self.build_args(manifest, output);
        debug!(binary = %self.binary_path.display(), ?args, "Running ffmpeg");

        let result = tokio_command(&self.binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                StitchError::merge_tool(format!(
                    "failed to run {}: {e}",
                    self.binary_path.display()
                ))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let detail = stderr.lines().last().unwrap_or("").trim();
            return Err(StitchError::merge_tool(format!(
                "{} exited with {}{}{}",
                self.binary_path.display(),
                result.status,
                if detail.is_empty() { "" } else { ": " },
                detail
            )));
        }
        Ok(())
    }
}

/// Byte-level concatenation of the manifest entries. Valid for MPEG-TS parts,
/// which can be joined without remuxing.
pub struct NativeConcat;

#[async_trait]
impl MergeTool for NativeConcat {
    fn name(&self) -> &str {
        "native"
    }

    async fn concat(&self, manifest: &Path, output: &Path) -> Result<(), StitchError> {
        let base = manifest.parent().unwrap_or(Path::new("."));
        let listing = tokio::fs::read_to_string(manifest)
            .await
            .map_err(|e| StitchError::filesystem(manifest, e))?;

        let out_err = |e: std::io::Error| StitchError::filesystem(output, e);
        let mut writer = BufWriter::new(File::create(output).await.map_err(out_err)?);

        for line in listing.lines() {
            let Some(entry) = line.strip_prefix("file ") else {
                continue;
            };
            let part_path = base.join(entry.trim());
            let mut part = File::open(&part_path)
                .await
                .map_err(|e| StitchError::filesystem(&part_path, e))?;
            tokio::io::copy(&mut part, &mut writer)
                .await
                .map_err(out_err)?;
        }
        writer.flush().await.map_err(out_err)?;
        Ok(())
    }
}

/// `tokio::process::Command` that does not pop up a console window on Windows.
fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    cmd.kill_on_drop(true);
    cmd
}
