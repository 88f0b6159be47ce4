use clap::Parser;
use std::path::PathBuf;
use stitch_engine::MergeToolKind;

/// Define CLI arguments
#[derive(Parser)]
#[command(
    version,
    about = "Batch downloader for segmented streams",
    long_about = "Downloads every stream listed in a batch file and stitches its parts into one file.\n\
                  \n\
                  The batch file is a JSON object mapping a stream name to its playlist URL.\n\
                  Each stream is downloaded into <output-dir>/<name>/ and merged into\n\
                  <output-dir>/<name>.<format> once all of its parts are on disk."
)]
pub struct CliArgs {
    /// JSON batch file mapping stream names to playlist URLs
    #[arg(default_value = "manifests.json")]
    pub batch_file: PathBuf,

    /// Root directory for stream directories and merged files
    #[arg(short, long, default_value = stitch_engine::config::DEFAULT_ROOT_DIR)]
    pub output_dir: PathBuf,

    /// Tool used to merge the parts of a stream
    #[arg(long, value_enum, default_value_t = MergeToolKind::Ffmpeg)]
    pub merger: MergeToolKind,

    /// Path to the ffmpeg binary
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Extension of merged files, without the dot
    #[arg(long, default_value = stitch_engine::config::DEFAULT_OUTPUT_EXTENSION)]
    pub format: String,

    /// Maximum part downloads in flight across all streams, 0 for unlimited
    #[arg(long, default_value_t = stitch_engine::config::DEFAULT_SEGMENT_CONCURRENCY)]
    pub segment_concurrency: usize,

    /// Maximum streams downloading at once, 0 for unlimited
    #[arg(long, default_value_t = stitch_engine::config::DEFAULT_STREAM_CONCURRENCY)]
    pub stream_concurrency: usize,

    /// Overall timeout in seconds for each HTTP request, 0 for none
    #[arg(long, default_value = "0")]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value = "30",
        help = "Connection timeout in seconds (time to establish initial connection)"
    )]
    pub connect_timeout: u64,

    /// Pool idle timeout in seconds
    #[arg(
        long,
        default_value = "30",
        help = "Idle timeout in seconds for pooled connections"
    )]
    pub pool_idle_timeout: u64,

    /// Custom HTTP headers
    #[arg(
        short = 'H',
        long = "header",
        help = "Add custom HTTP header (format: 'Name: Value'). Can be used multiple times."
    )]
    pub headers: Vec<String>,

    /// Proxy URL (e.g., "http://proxy.example.com:8080")
    #[arg(long, conflicts_with = "no_proxy")]
    pub proxy: Option<String>,

    /// Ignore system proxy settings
    #[arg(long)]
    pub no_proxy: bool,

    /// Override the User-Agent header
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, conflicts_with = "quiet", help = "Enable detailed debug logging")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
