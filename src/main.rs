use clap::Parser;
use std::sync::Arc;
use trailstop::cli::{Cli, Commands};
use trailstop::config::{Config, ConfigError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(ConfigError::Io { path, source }) => {
            eprintln!("Warning: Could not load config from {}: {}", path.display(), source);
            eprintln!("Using default configuration");
            Config::default()
        }
        Err(e) => return Err(e.into()),
    };

    // Initialize telemetry
    let _telemetry = trailstop::telemetry::init_telemetry(&config.telemetry, &cli.command.log_label())?;

    match cli.command {
        Commands::Run(args) => {
            args.execute(Arc::new(config)).await?;
        }
        Commands::Check(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
