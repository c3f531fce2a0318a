use std::process::ExitCode as ProcessExitCode;

use clap::Parser;

fn main() -> ProcessExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = mt_cli::Cli::parse();
    match mt_cli::run(&cli) {
        Ok(mt_cli::ExitCode(code)) => ProcessExitCode::from(code as u8),
        Err(err) => {
            eprintln!("mt: {err}");
            ProcessExitCode::from(74)
        }
    }
}
