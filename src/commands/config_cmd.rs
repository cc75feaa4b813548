use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::Config;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Write a config file with the current values
    Init,
}

impl ConfigCommand {
    pub fn run(
        &self,
        config: &Config,
        config_path: &PathBuf,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");
                        println!("Config file: {}", config_path.display());
                        println!();
                        println!("server_url: {}", config.server_url);
                        println!(
                            "api_key: {}",
                            if config.api_key.is_empty() {
                                "(not set)"
                            } else {
                                "(set)"
                            }
                        );
                        match (config.home_lat, config.home_lng) {
                            (Some(lat), Some(lng)) => println!("home: ({lat}, {lng})"),
                            _ => println!("home: (not set)"),
                        }
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                config.save(config_path)?;
                println!("Wrote {}", config_path.display());
                Ok(())
            }
        }
    }
}
