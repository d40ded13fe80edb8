mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use dataharvest::config::Config;
use dataharvest::observability;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    observability::init_tracing(&config.telemetry.log_filter);

    match cli.command {
        Commands::Server(args) => dataharvest::api::run(config, args.address).await?,
        Commands::Config => print!("{}", toml::to_string_pretty(&config)?),
    }

    Ok(())
}
