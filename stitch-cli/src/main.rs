use std::path::Path;
use std::time::Duration;

use clap::Parser;
use error::AppError;
use stitch_engine::{
    BatchOrchestrator, DownloaderConfig, MergeConfig, StitchConfig, StreamStatus, load_jobs,
};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod error;
mod utils;

use cli::CliArgs;
use utils::parse_headers;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        // Log the full error for debugging
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    // Parse command-line arguments
    let args = CliArgs::parse();

    // Kept alive until the batch finishes so buffered file logs are flushed
    let _log_guard = init_logging(args.verbose, args.quiet, args.log_file.as_deref())?;

    let config = build_config(&args)?;
    info!(
        root = %config.root_dir.display(),
        segment_concurrency = config.segment_concurrency,
        stream_concurrency = config.stream_concurrency,
        merger = ?config.merge.tool,
        "Configuration loaded"
    );
    info!(
        "HTTP timeout configuration: overall={}s, connect={}s, pool idle={}s",
        args.timeout, args.connect_timeout, args.pool_idle_timeout
    );

    let jobs = load_jobs(&args.batch_file).await?;
    if jobs.is_empty() {
        warn!(file = %args.batch_file.display(), "Batch file lists no streams");
    }

    let orchestrator = BatchOrchestrator::new(config)?;
    let report = orchestrator.run(jobs).await?;

    for (name, status) in &report.streams {
        match status {
            StreamStatus::Merged(merged) => {
                info!(stream = %name, output = %merged.output.display(), "Stream complete")
            }
            StreamStatus::DownloadFailed(_) => {
                warn!(stream = %name, "Stream not downloaded")
            }
            StreamStatus::MergeFailed { dir, .. } => {
                warn!(stream = %name, parts = %dir.display(), "Parts kept, merge failed")
            }
        }
    }
    info!(
        "Batch done: {} merged, {} download failures, {} merge failures, {} total",
        report.merged(),
        report.download_failures(),
        report.merge_failures(),
        report.total()
    );
    Ok(())
}

fn init_logging(
    verbose: bool,
    quiet: bool,
    log_file: Option<&Path>,
) -> Result<Option<WorkerGuard>, AppError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(verbose, quiet, rust_log.as_deref());

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(verbose).with_ansi(true))
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    Ok(guard)
}

/// `-q` and `-v` win over `RUST_LOG`; without any of them the level is `info`.
fn log_filter(verbose: bool, quiet: bool, rust_log: Option<&str>) -> EnvFilter {
    if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .parse_lossy(rust_log.unwrap_or_default())
    }
}

fn build_config(args: &CliArgs) -> Result<StitchConfig, AppError> {
    if args.format.is_empty() || args.format.contains(['/', '\\', '.']) {
        return Err(AppError::InvalidInput(format!(
            "invalid output format '{}'",
            args.format
        )));
    }

    let mut http = DownloaderConfig::builder()
        .with_timeout(Duration::from_secs(args.timeout))
        .with_connect_timeout(Duration::from_secs(args.connect_timeout))
        .with_pool_idle_timeout(Duration::from_secs(args.pool_idle_timeout))
        .with_headers(parse_headers(&args.headers)?);

    if let Some(user_agent) = &args.user_agent {
        http = http.with_user_agent(user_agent);
    }

    http = if args.no_proxy {
        info!("All proxy settings disabled (--no-proxy flag)");
        http.with_system_proxy(false)
    } else if let Some(proxy_url) = &args.proxy {
        http.with_proxy(proxy_url)
    } else {
        http.with_system_proxy(true)
    };

    Ok(StitchConfig {
        root_dir: args.output_dir.clone(),
        segment_concurrency: args.segment_concurrency,
        stream_concurrency: args.stream_concurrency,
        merge: MergeConfig {
            tool: args.merger,
            ffmpeg_path: args.ffmpeg.clone(),
            output_extension: args.format.clone(),
            ..MergeConfig::default()
        },
        http: http.build(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitch_engine::MergeToolKind;

    #[test]
    fn config_follows_flags() {
        let args = CliArgs::parse_from([
            "stitch",
            "-o",
            "out",
            "--merger",
            "native",
            "--format",
            "ts",
            "--segment-concurrency",
            "0",
            "--no-proxy",
            "--user-agent",
            "stitch-test",
            "-H",
            "Referer: https://example.com",
        ]);
        let config = build_config(&args).unwrap();

        assert_eq!(config.root_dir, Path::new("out"));
        assert_eq!(config.segment_concurrency, 0);
        assert_eq!(config.merge.tool, MergeToolKind::Native);
        assert_eq!(config.merge.output_extension, "ts");
        assert_eq!(config.merge.manifest_name, "concat.txt");
        assert_eq!(config.http.user_agent, "stitch-test");
        assert!(!config.http.use_system_proxy);
        assert_eq!(config.http.headers["referer"], "https://example.com");
    }

    #[test]
    fn rust_log_sets_the_level_unless_flags_override_it() {
        let hint = |verbose, quiet, rust_log| log_filter(verbose, quiet, rust_log).max_level_hint();

        assert_eq!(hint(false, false, Some("debug")), Some(LevelFilter::DEBUG));
        assert_eq!(hint(false, false, Some("warn")), Some(LevelFilter::WARN));
        assert_eq!(hint(false, false, None), Some(LevelFilter::INFO));
        assert_eq!(hint(false, false, Some("")), Some(LevelFilter::INFO));
        assert_eq!(hint(false, true, Some("debug")), Some(LevelFilter::ERROR));
        assert_eq!(hint(true, false, Some("warn")), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn rejects_bad_format_and_headers() {
        let args = CliArgs::parse_from(["stitch", "--format", ".mp4"]);
        assert!(matches!(build_config(&args), Err(AppError::InvalidInput(_))));

        let args = CliArgs::parse_from(["stitch", "-H", "broken"]);
        assert!(matches!(build_config(&args), Err(AppError::InvalidInput(_))));
    }
}
