//! `switchyardd` entrypoint.
//!
//! Delegates to [`switchyard::run_daemon`], which loads configuration,
//! bootstraps the communicator, serves JSONL requests, and blocks until a
//! termination signal arrives.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match switchyard::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let mut stderr = io::stderr().lock();
            // Nothing more can be reported if stderr is gone.
            writeln!(stderr, "switchyardd: {error}").ok();
            ExitCode::FAILURE
        }
    }
}
