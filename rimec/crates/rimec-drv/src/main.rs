use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rimec_drv::{run, Cli, CompileFailed};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Compile failures already rendered their diagnostics.
            if err.downcast_ref::<CompileFailed>().is_none() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
