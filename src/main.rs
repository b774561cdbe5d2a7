use sqlload::config::{self, Config, ParseOutcome};
use sqlload::engine::Engine;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let outcome = match config::parse_args(&args) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let bag = match outcome {
        ParseOutcome::PrintHelp => {
            println!("{}", config::HELP_TEXT);
            return ExitCode::SUCCESS;
        }
        ParseOutcome::PrintCheck(bag) => {
            for (key, value) in bag.iter() {
                println!("{key}={value}");
            }
            return ExitCode::SUCCESS;
        }
        ParseOutcome::Run(bag) => bag,
    };

    let config = match Config::from_bag(bag) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match Engine::run(config).await {
        Ok(_summary) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "engine exited with a fatal error");
            ExitCode::FAILURE
        }
    }
}
