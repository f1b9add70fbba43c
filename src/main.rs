use std::process::ExitCode;

use clap::Parser;
use log::error;

use bosun::cli::Cli;

fn main() -> ExitCode {
    let args = Cli::parse();

    env_logger::builder()
        .format_timestamp(None)
        .filter_level(args.verbosity)
        .init();

    if let Err(e) = bosun::run(&args) {
        error!("bosun failed: {e:?}");
        return ExitCode::from(2);
    }
    ExitCode::SUCCESS
}
