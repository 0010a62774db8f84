// Logging for scanrelay
//
// Log records go through the `log` facade to a small logger that writes either
// plain text lines or JSON lines, to stderr, to a file, or to both. Console and
// file have independent level thresholds.
//
// Text line:  2026-10-19 14:30:45 [INFO] scanrelay::relay::bridge: Relaying ...
// JSON line:  {"timestamp":"2026-10-19 14:30:45","level":"INFO","target":"...","message":"..."}

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use log::{Level, LevelFilter, Metadata, Record};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}. Valid options: text, json", s)),
        }
    }
}

/// Where log lines are written
#[derive(Debug, Clone, PartialEq)]
pub enum LogDestination {
    Console,
    File(PathBuf),
    Both(PathBuf),
}

impl LogDestination {
    fn file_path(&self) -> Option<&Path> {
        match self {
            LogDestination::Console => None,
            LogDestination::File(path) | LogDestination::Both(path) => Some(path),
        }
    }

    fn writes_console(&self) -> bool {
        !matches!(self, LogDestination::File(_))
    }
}

/// One JSON log line
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonLogEntry {
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub console_level: LevelFilter,
    pub file_level: Option<LevelFilter>,
    pub format: LogFormat,
    pub destination: LogDestination,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_level: LevelFilter::Info,
            file_level: None,
            format: LogFormat::Text,
            destination: LogDestination::Console,
        }
    }
}

impl LogConfig {
    /// Most verbose level any output accepts
    pub fn max_level(&self) -> LevelFilter {
        match self.file_level {
            Some(file_level) if file_level > self.console_level => file_level,
            _ => self.console_level,
        }
    }
}

pub struct RelayLogger {
    config: LogConfig,
    file: Option<Mutex<File>>,
}

impl RelayLogger {
    pub fn new(config: LogConfig) -> Result<Self> {
        let file = match config.destination.file_path() {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open log file: {}", path.display()))?;
                Some(Mutex::new(file))
            }
            None => None,
        };
        Ok(Self { config, file })
    }

    fn timestamp() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    fn format_line(&self, level: Level, target: &str, message: &str) -> String {
        let timestamp = Self::timestamp();
        let level_name = level.to_string().to_uppercase();

        if self.config.format == LogFormat::Json {
            let entry = JsonLogEntry {
                timestamp: timestamp.clone(),
                level: level_name.clone(),
                target: target.to_string(),
                message: message.to_string(),
            };
            if let Ok(json) = serde_json::to_string(&entry) {
                return json;
            }
        }
        format!("{} [{}] {}: {}", timestamp, level_name, target, message)
    }

    fn console_enabled(&self, level: Level) -> bool {
        self.config.destination.writes_console() && level <= self.config.console_level
    }

    fn file_enabled(&self, level: Level) -> bool {
        self.file.is_some() && self.config.file_level.map_or(false, |max| level <= max)
    }
}

impl log::Log for RelayLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console_enabled(metadata.level()) || self.file_enabled(metadata.level())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = self.format_line(record.level(), record.target(), &record.args().to_string());

        if self.console_enabled(record.level()) {
            let _ = writeln!(io::stderr(), "{}", line);
        }

        if self.file_enabled(record.level()) {
            if let Some(file) = &self.file {
                if let Err(e) = writeln!(file.lock(), "{}", line) {
                    eprintln!("File logging error: {}", e);
                }
            }
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
        if let Some(file) = &self.file {
            let _ = file.lock().flush();
        }
    }
}

/// Install the global logger
pub fn init_logger(config: LogConfig) -> Result<()> {
    let max_level = config.max_level();
    let logger = RelayLogger::new(config)?;

    log::set_boxed_logger(Box::new(logger)).context("Failed to set global logger")?;
    log::set_max_level(max_level);

    Ok(())
}

pub fn parse_log_level(level_str: &str) -> Result<LevelFilter> {
    match level_str.to_lowercase().as_str() {
        "error" => Ok(LevelFilter::Error),
        "warn" => Ok(LevelFilter::Warn),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        "off" => Ok(LevelFilter::Off),
        _ => Err(anyhow::anyhow!(
            "Invalid log level: {}. Valid levels: error, warn, info, debug, trace, off",
            level_str
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;
    use tempfile::tempdir;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(parse_log_level("warn").unwrap(), LevelFilter::Warn);
        assert_eq!(parse_log_level("TRACE").unwrap(), LevelFilter::Trace);
        assert_eq!(parse_log_level("off").unwrap(), LevelFilter::Off);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_max_level() {
        let mut config = LogConfig::default();
        assert_eq!(config.max_level(), LevelFilter::Info);

        config.file_level = Some(LevelFilter::Trace);
        assert_eq!(config.max_level(), LevelFilter::Trace);

        config.file_level = Some(LevelFilter::Error);
        assert_eq!(config.max_level(), LevelFilter::Info);
    }

    #[test]
    fn test_text_line_format() {
        let logger = RelayLogger::new(LogConfig::default()).unwrap();
        let line = logger.format_line(Level::Info, "scanrelay::relay", "Relaying 'x'");

        assert!(line.contains("[INFO] scanrelay::relay: Relaying 'x'"));
        assert_eq!(line.chars().nth(4), Some('-'));
        assert_eq!(line.chars().nth(10), Some(' '));
        assert_eq!(line.chars().nth(13), Some(':'));
    }

    #[test]
    fn test_json_line_format() {
        let config = LogConfig {
            format: LogFormat::Json,
            ..LogConfig::default()
        };
        let logger = RelayLogger::new(config).unwrap();
        let line = logger.format_line(Level::Warn, "bus", "closed");

        let entry: JsonLogEntry = serde_json::from_str(&line).unwrap();
        assert_eq!(entry.level, "WARN");
        assert_eq!(entry.target, "bus");
        assert_eq!(entry.message, "closed");
    }

    #[test]
    fn test_file_destination_respects_file_level() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("relay.log");
        let config = LogConfig {
            console_level: LevelFilter::Off,
            file_level: Some(LevelFilter::Info),
            format: LogFormat::Text,
            destination: LogDestination::File(path.clone()),
        };
        let logger = RelayLogger::new(config).unwrap();

        logger.log(
            &Record::builder()
                .level(Level::Info)
                .target("test")
                .args(format_args!("kept"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .target("test")
                .args(format_args!("dropped"))
                .build(),
        );
        logger.flush();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("kept"));
        assert!(!content.contains("dropped"));
    }

    #[test]
    fn test_unwritable_log_file_is_an_error() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            destination: LogDestination::File(dir.path().join("missing").join("relay.log")),
            file_level: Some(LevelFilter::Info),
            ..LogConfig::default()
        };
        assert!(RelayLogger::new(config).is_err());
    }
}
