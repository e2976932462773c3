//! Provides the main entry point to the program.
use human_panic::{metadata, setup_panic};
use std::process::ExitCode;
use steelplan::cli::run_cli;
use steelplan::log::is_logger_initialised;

fn main() -> ExitCode {
    setup_panic!(metadata!().support("Please report the bug along with the scenario you ran."));

    if let Err(err) = run_cli() {
        if is_logger_initialised() {
            ::log::error!("{err:?}");
        } else {
            eprintln!("Error: {err:?}");
        }

        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
