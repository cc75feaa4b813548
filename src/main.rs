use clap::{Parser, Subcommand};
use std::path::PathBuf;

use whereizit::client::StoreClient;
use whereizit::commands::{AreaCommand, AuthCommand, ConfigCommand, ReportCommand, WatchCommand};
use whereizit::config::Config;

#[derive(Parser)]
#[command(name = "whereizit")]
#[command(version)]
#[command(about = "Browse, add, and report map-pinned areas", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage areas
    Area(AreaCommand),

    /// Report an area for moderation
    Report(ReportCommand),

    /// Manage the account
    Auth(AuthCommand),

    /// Watch the live area map on the console
    Watch(WatchCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whereizit=warn".into()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(Config::default_config_path);
    let config = Config::load(cli.config)?;
    let client = StoreClient::new(config.server_url.clone(), config.api_key.clone());

    match cli.command {
        Some(Commands::Area(cmd)) => cmd.run(&client, &config).await?,
        Some(Commands::Report(cmd)) => cmd.run(&client, &config).await?,
        Some(Commands::Auth(cmd)) => cmd.run(&client, &config, &config_path).await?,
        Some(Commands::Watch(cmd)) => cmd.run(&client).await?,
        Some(Commands::Config(cmd)) => cmd.run(&config, &config_path)?,
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
