use std::io;
use std::process::ExitCode;

use tracing::debug;
use tracing_subscriber::EnvFilter;
use wg_easy_vpn::{cli, commands};

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = cli::parse_args();
    init_logging(cli.verbose);

    let result = cli
        .settings()
        .and_then(|settings| {
            debug!("Settings: {:?}", settings);
            commands::run(&settings, &cli.command)
        });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", console::style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
