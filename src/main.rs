//! sharedtiles - command-line tool for flip-aware tile deduplication

use std::process::ExitCode;

use sharedtiles::cli;

fn main() -> ExitCode {
    cli::run()
}
