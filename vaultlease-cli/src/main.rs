//! Vaultlease CLI
//!
//! Reads a secret from Vault using the auth method selected by the
//! environment.
//!
//! # Usage
//!
//! ```bash
//! # Log in with an app-role and print a secret as JSON
//! export VAULT_ADDR=https://vault.example.com:8200
//! export VAULT_APP_ROLE=svc VAULT_APP_ROLE_ID=... VAULT_APP_SECRET_ID=...
//! vaultlease get secret/database
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};
use vaultlease_core::{ClientProvider, SecretData};

#[derive(Parser)]
#[command(name = "vaultlease")]
#[command(about = "Read secrets from Vault")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the data stored at a secret path as JSON
    Get {
        /// Secret path (e.g., secret/database)
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Get { path } => get_secret(&path).await,
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn get_secret(path: &str) -> Result<()> {
    let secrets = SecretData::configure_default()
        .await
        .context("failed to configure vault client")?;
    debug!(method = %secrets.provider().kind(), %path, "reading secret");

    let data = secrets
        .read_data(path)
        .await
        .with_context(|| format!("failed to read secret {path}"))?;

    println!("{}", render(data)?);
    Ok(())
}

/// Compact JSON for the secret data, `null` when there is none.
fn render(data: Option<Map<String, Value>>) -> Result<String> {
    let value = data.map(Value::Object).unwrap_or(Value::Null);
    serde_json::to_string(&value).context("failed to encode secret data")
}
