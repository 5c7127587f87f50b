//! plugpack - Command-line build runner for web front-end plugins

use std::process::ExitCode;

use plugpack::cli;

fn main() -> ExitCode {
    cli::run()
}
