//! Application initialization and configuration

use anyhow::{Context, Result};
use log::{debug, LevelFilter};

use crate::relay::ListenArgs;
use crate::{cli, config, logging};

pub fn load_configuration(args: &cli::Args) -> Result<config::ConfigManager> {
    let mut manager = match &args.config_file {
        Some(config_file) => {
            debug!("Loading configuration from explicit file: {}", config_file.display());
            config::ConfigManager::load_from_file(config_file.clone())?
        }
        None => config::ConfigManager::load()?,
    };

    if let Some(section_name) = &args.config_name {
        manager.select_section(section_name.clone());
    }

    Ok(manager)
}

/// Build the logger configuration. Command line flags win over the config file.
pub fn configure_logging(args: &cli::Args, config: &config::ConfigManager) -> Result<logging::LogConfig> {
    let console_level = if args.debug {
        LevelFilter::Trace
    } else if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Error
    } else {
        config
            .get_log_level("base", "console-level")?
            .unwrap_or(LevelFilter::Info)
    };

    let format = match args
        .log_format
        .as_deref()
        .or_else(|| config.get_value("base", "log-format").map(String::as_str))
    {
        Some(format) => format
            .parse::<logging::LogFormat>()
            .map_err(|e| anyhow::anyhow!(e))
            .context("Invalid log format")?,
        None => logging::LogFormat::Text,
    };

    let log_file = args.log_file.clone().or_else(|| config.get_path("base", "log-file"));

    let file_level = match &args.log_file_level {
        Some(level) => Some(logging::parse_log_level(level)?),
        None => config.get_log_level("base", "file-level")?,
    };

    let (destination, file_level) = match log_file {
        // File level defaults to the console level
        Some(path) => (
            logging::LogDestination::Both(path),
            Some(file_level.unwrap_or(console_level)),
        ),
        None => {
            if file_level.is_some() {
                return Err(anyhow::anyhow!("A file log level was given without a log file"));
            }
            (logging::LogDestination::Console, None)
        }
    };

    Ok(logging::LogConfig {
        console_level,
        file_level,
        format,
        destination,
    })
}

/// Merge listen arguments: command line first, then the `[relay]` config section.
/// Anything still unset falls back to the relay's built-in defaults later.
pub fn resolve_listen_args(args: &cli::Args, config: &config::ConfigManager) -> ListenArgs {
    let from_cli = args.listen_args();
    let from_config = config.relay_args();

    ListenArgs {
        filter_key: from_cli.filter_key.or(from_config.filter_key),
        payload_field: from_cli.payload_field.or(from_config.payload_field),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigManager, Configuration};
    use clap::Parser;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn args(argv: &[&str]) -> cli::Args {
        cli::Args::try_parse_from(std::iter::once("scanrelay").chain(argv.iter().copied())).unwrap()
    }

    fn config(entries: &[(&str, &str, &str)]) -> ConfigManager {
        let mut config = Configuration::new();
        for (section, key, value) in entries {
            config
                .entry(section.to_string())
                .or_insert_with(HashMap::new)
                .insert(key.to_string(), value.to_string());
        }
        ConfigManager::from_config(config)
    }

    #[test]
    fn test_logging_defaults() {
        let log_config = configure_logging(&args(&[]), &config(&[])).unwrap();

        assert_eq!(log_config.console_level, LevelFilter::Info);
        assert_eq!(log_config.format, logging::LogFormat::Text);
        assert_eq!(log_config.destination, logging::LogDestination::Console);
        assert!(log_config.file_level.is_none());
    }

    #[test]
    fn test_flags_override_config() {
        let cfg = config(&[
            ("base", "console-level", "warn"),
            ("base", "log-format", "json"),
        ]);

        let log_config = configure_logging(&args(&[]), &cfg).unwrap();
        assert_eq!(log_config.console_level, LevelFilter::Warn);
        assert_eq!(log_config.format, logging::LogFormat::Json);

        let log_config = configure_logging(&args(&["--debug", "--log-format", "text"]), &cfg).unwrap();
        assert_eq!(log_config.console_level, LevelFilter::Trace);
        assert_eq!(log_config.format, logging::LogFormat::Text);
    }

    #[test]
    fn test_log_file_from_config() {
        let cfg = config(&[("base", "log-file", "/tmp/scanrelay.log")]);
        let log_config = configure_logging(&args(&["--quiet"]), &cfg).unwrap();

        assert_eq!(
            log_config.destination,
            logging::LogDestination::Both(PathBuf::from("/tmp/scanrelay.log"))
        );
        assert_eq!(log_config.file_level, Some(LevelFilter::Error));
    }

    #[test]
    fn test_invalid_config_level_is_an_error() {
        let cfg = config(&[("base", "console-level", "loud")]);
        assert!(configure_logging(&args(&[]), &cfg).is_err());
    }

    #[test]
    fn test_file_level_without_file_is_an_error() {
        let cfg = config(&[("base", "file-level", "debug")]);
        assert!(configure_logging(&args(&[]), &cfg).is_err());
    }

    #[test]
    fn test_resolve_listen_args() {
        let cfg = config(&[
            ("relay", "filter-key", "acme.SCAN"),
            ("relay", "payload-field", "code"),
        ]);

        let merged = resolve_listen_args(&args(&["--payload-field", "data"]), &cfg);
        assert_eq!(merged, ListenArgs::new().filter_key("acme.SCAN").payload_field("data"));

        let merged = resolve_listen_args(&args(&[]), &config(&[]));
        assert_eq!(merged, ListenArgs::default());
    }
}
