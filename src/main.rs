use clap::Parser;

use aichitect::cli::{self, CliArgs};
use aichitect::logger;

fn main() -> std::process::ExitCode {
    // Initialize session log (overwrites previous session log)
    logger::init();

    let args = CliArgs::parse();
    cli::run(args)
}
