use clap::Parser;
use tracing_subscriber::EnvFilter;

use conclave::cli;
use conclave::config;
use conclave::errors::ConclaveError;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .init();

    let result = match cli.command {
        cli::Commands::Run(args) => cli::run::handle_run(args).await,
        cli::Commands::Round(args) => cli::round::handle_round(args).await,
        cli::Commands::Suspensions(args) => cli::suspensions::handle_suspensions(args).await,
        cli::Commands::Checkpoints(args) => cli::checkpoints::handle_checkpoints(args).await,
        cli::Commands::Validate(args) => handle_validate(args).await,
    };

    match result {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            let exit_code = match &e {
                ConclaveError::Config(_) => 2,
                ConclaveError::NotFound(_) => 3,
                ConclaveError::Expired(_) => 4,
                ConclaveError::NotVersioned(_) => 5,
                _ => 1,
            };
            std::process::exit(exit_code);
        }
    }
}

async fn handle_validate(args: cli::commands::ValidateArgs) -> Result<(), ConclaveError> {
    let path = std::path::PathBuf::from(&args.config);
    let _config = config::parse_config(&path).await?;
    println!("Configuration is valid: {}", args.config);
    Ok(())
}
