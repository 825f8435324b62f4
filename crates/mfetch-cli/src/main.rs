use mfetch_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // The log file is preferred; a read-only state dir must not stop the CLI.
    if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable, using stderr: {:#}", e);
    }

    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("mfetch error: {:#}", err);
        std::process::exit(1);
    }
}
