//! # Document Vault CLI (`dvx`)
//!
//! The `dvx` binary is the operator's interface to the connector. It can
//! run the public HTTP server or exercise the vault directly from the
//! terminal with the same search/fetch paths the agent tools use.
//!
//! ## Usage
//!
//! ```bash
//! dvx --config ./config/docvault.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dvx serve` | Start the HTTP server (OAuth endpoints, tools, `/mcp`) |
//! | `dvx search "<query>"` | Search the vault and print normalized results |
//! | `dvx fetch <id>` | Download a document and print its extracted text |
//! | `dvx cabinets` | List the cabinets visible to the authorized user |
//! | `dvx auth status` | Show whether a stored credential exists |
//!
//! ## Examples
//!
//! ```bash
//! # Start the connector, then authorize in a browser via /oauth/start
//! dvx serve --config ./config/docvault.toml
//!
//! # Search with inline overrides
//! dvx search "indemnification clause cabinetId:NG-12 top:5 orderby:lastMod"
//!
//! # Pull a document's full text
//! dvx fetch 4844-9411-1293
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docvault::client::VaultClient;
use docvault::config::{load_config, Config};
use docvault::oauth::AuthFlowEngine;
use docvault::token_store::{FileTokenStore, TokenStore};

/// Document Vault Connector CLI — a remote MCP connector for a cloud
/// document repository.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docvault.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "dvx",
    about = "Document Vault Connector — OAuth-backed search and fetch for a cloud document repository",
    version,
    long_about = "The connector exposes a cloud document-management repository to agent clients: \
    a browser OAuth flow stores tokens server-side, and the search and fetch tools answer over \
    MCP Streamable HTTP or REST with normalized results and extracted plain text."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docvault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the public HTTP server.
    ///
    /// Serves the OAuth endpoints, the REST tool dispatch, and the MCP
    /// Streamable HTTP endpoint under `/mcp`, all on `[server].bind`.
    Serve,

    /// Search the vault and print normalized results.
    ///
    /// The query string supports inline overrides: `cabinetId:<id>`,
    /// `top:<n>`, `orderby:<relevance|lastMod>`, `select:<fields>`.
    /// Remaining words become the search text.
    Search {
        /// Query text, optionally with key:value overrides.
        query: String,
    },

    /// Download a document and print its extracted text.
    Fetch {
        /// Vault document id.
        id: String,
    },

    /// List the cabinets visible to the authorized user.
    Cabinets,

    /// Credential management.
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Show whether a stored credential exists and when it expires.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => docvault::server::run_server(&config).await,
        Commands::Search { query } => {
            let client = build_client(&config)?;
            docvault::search::run_search(&config, &client, &query).await
        }
        Commands::Fetch { id } => {
            let client = build_client(&config)?;
            docvault::fetch::run_fetch(&config, &client, &id).await
        }
        Commands::Cabinets => {
            let client = build_client(&config)?;
            docvault::cabinets::run_cabinets(&client).await?;
            Ok(())
        }
        Commands::Auth { command } => match command {
            AuthCommands::Status => run_auth_status(&config).await,
        },
    }
}

/// Wire the store, flow engine, and client the same way the server does,
/// so CLI calls share the stored credential and its renewal path.
fn build_client(config: &Config) -> Result<VaultClient> {
    let store: Arc<dyn TokenStore> =
        Arc::new(FileTokenStore::new(config.storage.token_path.clone()));
    let oauth = Arc::new(AuthFlowEngine::new(config.oauth.clone(), store.clone())?);
    VaultClient::new(&config.api, store, oauth)
}

async fn run_auth_status(config: &Config) -> Result<()> {
    let store = FileTokenStore::new(config.storage.token_path.clone());
    match store.load().await? {
        None => {
            println!("Not authorized. Start the server and visit /oauth/start.");
        }
        Some(credential) => {
            println!("Credential stored at {}", config.storage.token_path.display());
            println!(
                "  refresh token: {}",
                if credential.refresh_token.is_some() {
                    "present"
                } else {
                    "absent"
                }
            );
            match credential.expires_at {
                Some(ts) => println!(
                    "  access token:  {}",
                    if credential.is_expired() {
                        format!("expired (at unix {ts})")
                    } else {
                        format!("valid until unix {ts}")
                    }
                ),
                None => println!("  access token:  no recorded expiry"),
            }
        }
    }
    Ok(())
}
