use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dataharvest")]
#[command(about = "DataHarvest task service", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to DATAHARVEST_CONFIG or config/dataharvest.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API
    Server(ServerArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to (overrides server.bind_addr)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}
