use anyhow::Result;
use clap::Parser;
use log::debug;
use std::path::PathBuf;

use crate::relay::ListenArgs;

/// Barcode broadcast relay
#[derive(Parser, Debug)]
#[command(name = "scanrelay")]
#[command(about = "Relays barcode-scan broadcast notifications read as JSON lines from stdin to stdout")]
#[command(version)]
pub struct Args {
    /// Topic of barcode notifications (default: com.scanner.BARCODE)
    #[arg(long = "filter-key", alias = "action", value_name = "TOPIC")]
    pub filter_key: Option<String>,

    /// Field holding the scanned code (default: barcode)
    #[arg(long = "payload-field", alias = "extra-key", value_name = "FIELD")]
    pub payload_field: Option<String>,

    /// Verbose output (debug level logging)
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (error level logging only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug output (trace level logging)
    #[arg(long)]
    pub debug: bool,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT")]
    pub log_format: Option<String>,

    /// Log file path for file output
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log level for file output (independent of console level)
    #[arg(long, value_name = "LEVEL")]
    pub log_file_level: Option<String>,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Configuration section name
    #[arg(long, value_name = "SECTION")]
    pub config_name: Option<String>,
}

impl Args {
    /// Listen arguments given on the command line; unset flags stay unset
    pub fn listen_args(&self) -> ListenArgs {
        ListenArgs {
            filter_key: self.filter_key.clone(),
            payload_field: self.payload_field.clone(),
        }
    }
}

/// Parse command line arguments
pub fn parse_args() -> Args {
    let args = Args::parse();
    debug!("Parsed CLI arguments: {:?}", args);
    args
}

/// Validate CLI argument combinations
pub fn validate_args(args: &Args) -> Result<()> {
    let log_flags_count = [args.verbose, args.quiet, args.debug]
        .iter()
        .filter(|&&flag| flag)
        .count();

    if log_flags_count > 1 {
        return Err(anyhow::anyhow!(
            "Conflicting log level flags: only one of --verbose, --quiet, or --debug may be specified"
        ));
    }

    if let Some(format) = &args.log_format {
        format
            .parse::<crate::logging::LogFormat>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }

    if let Some(level) = &args.log_file_level {
        crate::logging::parse_log_level(level)?;
    }

    if args.log_file_level.is_some() && args.log_file.is_none() {
        return Err(anyhow::anyhow!(
            "--log-file-level requires --log-file to be specified"
        ));
    }

    if matches!(args.filter_key.as_deref(), Some("")) {
        return Err(anyhow::anyhow!("--filter-key must not be empty"));
    }

    Ok(())
}
