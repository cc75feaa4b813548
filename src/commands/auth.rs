use clap::{Args, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;

use crate::client::StoreClient;
use crate::config::Config;

#[derive(Args)]
pub struct AuthCommand {
    #[command(subcommand)]
    pub command: AuthSubcommand,
}

#[derive(Subcommand)]
pub enum AuthSubcommand {
    /// Create an account and store its API key in the config file
    Register {
        /// Email address (the account identity)
        #[arg(long)]
        email: String,

        /// Display name
        #[arg(long)]
        display_name: Option<String>,
    },

    /// Show the current account
    Whoami,

    /// Forget the stored API key
    Signout,

    /// Delete the account (registered areas remain)
    DeleteAccount {
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl AuthCommand {
    pub async fn run(
        &self,
        client: &StoreClient,
        config: &Config,
        config_path: &PathBuf,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            AuthSubcommand::Register {
                email,
                display_name,
            } => {
                let account = client.register(email, display_name.as_deref()).await?;

                let mut updated = config.clone();
                updated.api_key = account.api_key.clone();
                updated.save(config_path)?;

                println!("Registered {}", account.principal.email);
                println!("API key stored in {}", config_path.display());
                println!("Key (keep it safe, it is shown only once): {}", account.api_key);
                Ok(())
            }

            AuthSubcommand::Whoami => {
                if config.api_key.is_empty() {
                    println!("Not signed in");
                    return Ok(());
                }
                let principal = client.me().await?;
                println!("{} ({})", principal.email, principal.uid);
                if let Some(name) = &principal.display_name {
                    println!("Display name: {}", name);
                }
                Ok(())
            }

            AuthSubcommand::Signout => {
                let mut updated = config.clone();
                updated.api_key.clear();
                updated.save(config_path)?;
                println!("Signed out");
                Ok(())
            }

            AuthSubcommand::DeleteAccount { force } => {
                if config.api_key.is_empty() {
                    return Err("not signed in".into());
                }

                if !force {
                    print!("Delete the account? Registered areas remain. [y/N] ");
                    io::stdout().flush()?;
                    let mut answer = String::new();
                    io::stdin().read_line(&mut answer)?;
                    if !answer.trim().eq_ignore_ascii_case("y") {
                        println!("Aborted");
                        return Ok(());
                    }
                }

                client.delete_account().await?;

                let mut updated = config.clone();
                updated.api_key.clear();
                updated.save(config_path)?;
                println!("Account deleted");
                Ok(())
            }
        }
    }
}
