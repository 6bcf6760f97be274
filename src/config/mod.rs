pub mod file;
pub mod setup;

use crate::adapters::slack::DEFAULT_API_URL;
use crate::core::batcher::DEFAULT_BATCH_LINES;
use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{validate_positive_number, validate_range, validate_url, Validate};
use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Parser)]
#[command(name = "slackcat")]
#[command(about = "redirect a file to slack")]
#[command(version)]
pub struct CliConfig {
    /// Slack channel or group to post to, optionally as team:channel
    #[arg(short, long)]
    pub channel: Option<String>,

    /// Initial comment for snippet
    #[arg(long)]
    pub comment: Option<String>,

    /// Configure slackcat via oauth
    #[arg(long)]
    pub configure: bool,

    /// Filename for upload. Defaults to current timestamp
    #[arg(short = 'n', long)]
    pub filename: Option<String>,

    /// Specify filetype for syntax highlighting
    #[arg(long)]
    pub filetype: Option<String>,

    /// Skip posting file to Slack. Useful for testing
    #[arg(long)]
    pub noop: bool,

    /// Stream messages to Slack continuously instead of uploading a single snippet
    #[arg(short, long)]
    pub stream: bool,

    /// Print stdin to screen before posting
    #[arg(short, long)]
    pub tee: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    pub log_json: bool,

    /// Maximum lines per streamed message
    #[arg(long, default_value_t = DEFAULT_BATCH_LINES)]
    pub batch_lines: usize,

    /// Post buffered lines at least this often while streaming
    #[arg(long, default_value = "3000")]
    pub flush_interval_ms: u64,

    /// HTTP timeout per Slack API call, in seconds
    #[arg(long = "timeout", default_value = "30")]
    pub timeout_secs: u64,

    /// Config file to use instead of the default location
    #[arg(long, env = "SLACKCAT_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "SLACKCAT_API_URL", default_value = DEFAULT_API_URL, hide = true)]
    pub api_url: String,

    /// File to upload; reads stdin when omitted or '-'
    pub file: Option<PathBuf>,
}

impl CliConfig {
    pub fn input_path(&self) -> Option<&Path> {
        self.file.as_deref().filter(|p| *p != Path::new("-"))
    }
}

impl ConfigProvider for CliConfig {
    fn batch_lines(&self) -> usize {
        self.batch_lines
    }

    fn flush_interval_ms(&self) -> u64 {
        self.flush_interval_ms
    }

    fn tee(&self) -> bool {
        self.tee
    }

    fn filename(&self) -> Option<&str> {
        self.filename.as_deref().filter(|s| !s.is_empty())
    }

    fn filetype(&self) -> Option<&str> {
        self.filetype.as_deref().filter(|s| !s.is_empty())
    }

    fn comment(&self) -> Option<&str> {
        self.comment.as_deref().filter(|s| !s.is_empty())
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_url("api_url", &self.api_url)?;
        validate_positive_number("batch_lines", self.batch_lines, 1)?;
        validate_range("flush_interval_ms", self.flush_interval_ms, 100, 3_600_000)?;
        validate_range("timeout", self.timeout_secs, 1, 600)?;
        Ok(())
    }
}
