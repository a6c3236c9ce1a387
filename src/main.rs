//! Assetline - command-line front-end asset pipeline

use std::process::ExitCode;

use assetline::cli;

fn main() -> ExitCode {
    cli::run()
}
