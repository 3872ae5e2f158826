use clap::{Parser, Subcommand, ValueEnum};
use rompatch::Format;
use std::path::PathBuf;
use tracing::Level;

#[derive(Debug, Parser)]
#[command(name = "rompatch")]
#[command(about = "Create and apply IPS and APS ROM patches", long_about = None)]
pub struct Cli {
    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a patch from an original and a modified image
    Create {
        /// Path to the original image
        #[arg(value_name = "ORIGINAL")]
        original: PathBuf,

        /// Path to the modified image
        #[arg(value_name = "MODIFIED")]
        modified: PathBuf,

        /// Patch file (defaults to the modified image with the format's extension)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Patch format
        #[arg(long, value_enum, default_value_t = FormatArg::Ips)]
        format: FormatArg,

        /// Description stored in APS patches
        #[arg(short, long, default_value = "")]
        description: String,

        /// Overwrite an existing patch file
        #[arg(short, long)]
        force: bool,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Apply a patch to a copy of an image
    Apply {
        /// Path to the patch file
        #[arg(value_name = "PATCH")]
        patch: PathBuf,

        /// Path to the original image, which is left untouched
        #[arg(value_name = "ORIGINAL")]
        original: PathBuf,

        /// Patched image (defaults to the original name with `.patched` added)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Patch format (detected from the file when omitted)
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Overwrite an existing output file
        #[arg(short, long)]
        force: bool,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Display the header and records of a patch file
    Info {
        /// Path to the patch file
        #[arg(value_name = "PATCH")]
        patch: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Ips,
    Aps,
}

impl From<FormatArg> for Format {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Ips => Format::Ips,
            FormatArg::Aps => Format::Aps,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}
