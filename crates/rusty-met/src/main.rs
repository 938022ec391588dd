//! rusty-met: headless front end for the Metronome wallet forms

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use eyre::{Result, WrapErr};
use zeroize::Zeroizing;

use rusty_met_forms_adapters::{FormsAdapterConfig, HttpLedgerAdapter};

mod convert;
mod onboard;
mod output;
mod send;

#[derive(Parser)]
#[command(author, version, about = "Convert ETH to MET, send MET and create wallets")]
struct Cli {
    /// JSON config file; RUSTY_MET_* variables override it
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert ETH to MET
    Convert(convert::Options),
    /// Send MET to another address
    Send(send::Options),
    /// Create a wallet from a new or existing recovery phrase
    Onboard(onboard::Options),
}

/// Account password, also read from `RUSTY_MET_PASSWORD`.
#[derive(Args)]
pub struct PasswordArg {
    #[arg(long, env = "RUSTY_MET_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl std::fmt::Debug for PasswordArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordArg")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl PasswordArg {
    pub fn take(self) -> Zeroizing<String> {
        Zeroizing::new(self.password.unwrap_or_default())
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<FormsAdapterConfig> {
    let base = match path {
        Some(path) => FormsAdapterConfig::from_json_file(path)?,
        None => FormsAdapterConfig::default(),
    };
    Ok(base.with_overrides(|key| std::env::var(key).ok())?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref()).wrap_err("failed to load configuration")?;
    tracing::info!(ledger = %config.ledger_base_url, "starting rusty-met");

    let ledger = HttpLedgerAdapter::with_config(&config)?;
    match cli.command {
        Commands::Convert(opts) => convert::run(&config, ledger, opts).await,
        Commands::Send(opts) => send::run(&config, ledger, opts).await,
        Commands::Onboard(opts) => onboard::run(ledger, opts).await,
    }
}
