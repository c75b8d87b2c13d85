//! Logger initialization for the bridge host.
//!
//! Standard output carries the framed protocol, so logs go to a file in the
//! temp directory, to stderr, or both.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

pub const DEFAULT_LOG_FILE_NAME: &str = "notes_bridge.log";

/// Destination for log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogDestination {
    #[default]
    File,
    Stderr,
    Both,
}

impl FromStr for LogDestination {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(LogDestination::File),
            "stderr" => Ok(LogDestination::Stderr),
            "both" => Ok(LogDestination::Both),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub destination: LogDestination,
    pub level: LevelFilter,
    pub file: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            destination: LogDestination::File,
            level: LevelFilter::Info,
            file: std::env::temp_dir().join(DEFAULT_LOG_FILE_NAME),
        }
    }
}

/// Install the global logger. A log file that cannot be opened degrades to
/// stderr.
pub fn initialize(settings: &LogSettings) {
    let config = build_config();
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();

    if matches!(
        settings.destination,
        LogDestination::File | LogDestination::Both
    ) {
        if let Some(file_logger) = create_file_logger(settings.level, config.clone(), &settings.file)
        {
            loggers.push(file_logger);
        }
    }
    if settings.destination != LogDestination::File || loggers.is_empty() {
        loggers.push(stderr_logger(settings.level, config));
    }

    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn stderr_logger(level: LevelFilter, config: Config) -> Box<TermLogger> {
    TermLogger::new(level, config, TerminalMode::Stderr, ColorChoice::Never)
}

fn create_file_logger(
    level: LevelFilter,
    config: Config,
    path: &Path,
) -> Option<Box<WriteLogger<std::fs::File>>> {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not open log file at {:?}: {}", path, err);
            None
        }
    }
}
