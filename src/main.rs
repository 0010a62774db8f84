use std::process;

use anyhow::Result;
use log::{error, info};

use scanrelay::{app, cli, logging, relay::RelayError};

fn main() {
    if let Err(e) = run() {
        // Registration failures are actionable by the user (e.g. a missing permission)
        match e.downcast_ref::<RelayError>() {
            Some(relay_error) if relay_error.is_permission_denied() => {
                eprintln!("{:#}", e);
                eprintln!("Grant the required permission and try again.");
            }
            _ => {
                error!("Application error: {:#}", e);
                eprintln!("Error: {:#}", e);
            }
        }
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::parse_args();
    cli::validate_args(&args)?;

    let config_manager = app::load_configuration(&args)?;

    let log_config = app::configure_logging(&args, &config_manager)?;
    logging::init_logger(log_config)?;

    let listen_args = app::resolve_listen_args(&args, &config_manager);
    let channel_name = config_manager.channel_name();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let summary = runtime.block_on(async {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        app::run_relay(stdin, &mut stdout, &channel_name, &listen_args).await
    })?;

    info!(
        "Forwarded {} value(s) from {} line(s)",
        summary.written, summary.lines
    );
    Ok(())
}
