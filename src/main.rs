use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use matrix_secrets::comms::local_api::{self, AppState};
use matrix_secrets::config::Config;
use matrix_secrets::issuance::{CredentialIssuer, UserId};
use matrix_secrets::security::auth::ApiToken;
use matrix_secrets::store::ConfigStore;
use matrix_secrets::transport::MatrixClient;
use matrix_secrets::utils;

#[derive(Parser)]
#[command(name = "matrix-secrets", version, about = "Matrix access token broker")]
struct AppCli {
    /// Config file path
    #[arg(short, long, default_value = "config.json", global = true)]
    config: String,

    /// Subcommands
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server (configuration and issuance API)
    Serve {
        /// Overrides the port from the config file
        #[arg(long)]
        port: Option<u16>,
    },
    /// Issue an access token once and print it as JSON
    Issue {
        /// Full user id, e.g. @alice:example.org
        user_id: String,
        /// Log out every existing session before issuing
        #[arg(long, default_value_t = false)]
        logout_other_devices: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::logging::init();

    let args = AppCli::parse();
    let config = Config::from_file(&args.config)?;
    let store = ConfigStore::new(config.build_storage()?);

    match args.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.port);
            info!("Starting matrix-secrets {} on port {port}", matrix_secrets::VERSION);
            let state = AppState::new(
                store,
                MatrixClient::new(),
                ApiToken::new(config.api_token.clone()),
            );
            local_api::serve(state, port).await?;
        }
        Commands::Issue {
            user_id,
            logout_other_devices,
        } => {
            let user: UserId = user_id.parse()?;
            let issuer = CredentialIssuer::new(store, MatrixClient::new());
            let creds = issuer
                .credentials(&user, logout_other_devices)
                .await
                .with_context(|| format!("issuing credentials for {user}"))?;
            println!("{}", serde_json::to_string_pretty(&creds)?);
        }
    }

    Ok(())
}
