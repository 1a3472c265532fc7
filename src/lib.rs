pub mod app;

use std::process::ExitCode;

use clap::Parser;

use app::cli::{execute, Cli};
use app::logging::init_logging;

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();
    match execute(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
