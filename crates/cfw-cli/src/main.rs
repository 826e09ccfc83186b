//! The `cfw` binary: parses CLI arguments, wires up tracing, dispatches
//! to the selected subcommand, and maps the result onto the exit codes
//! of spec §6 (0 success, 2 config error, 3 transient I/O, 4 integrity
//! violation, 5 cancelled).

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cfw_cli::cli::Cli;
use cfw_cli::dispatch;
use cfw_cli::env::CfwEnv;

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level.to_string())))
        .init();

    let env = CfwEnv::from_process();
    let (result, code) = dispatch(cli, &env);

    match result {
        Ok(summary) => println!("{summary}"),
        Err(err) => eprintln!("cfw: {err}"),
    }
    ExitCode::from(code)
}
