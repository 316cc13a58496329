mod config;
mod logging;
mod pipeline;

use std::process::ExitCode;

use clap::Parser;
use export_logging::export_error;

use crate::config::{Cli, Settings};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::initialize(cli.log_to, cli.log_level);

    let settings = match Settings::load(cli) {
        Ok(settings) => settings,
        Err(err) => {
            export_error!("Configuration error: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    match pipeline::run(&settings).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            export_error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
