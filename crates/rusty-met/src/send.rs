use alloy::primitives::Address;
use clap::Args;
use eyre::{Result, WrapErr};

use rusty_met_forms_adapters::{FormSession, FormsAdapterConfig, HttpLedgerAdapter};
use rusty_met_forms_core::units::{to_base, MET_DECIMALS};
use rusty_met_forms_core::{SendField, SendTokenForm};

use crate::{output, PasswordArg};

#[derive(Debug, Args)]
pub struct Options {
    #[arg(long)]
    from: Address,

    /// Recipient, 0x-prefixed
    #[arg(long)]
    to: String,

    /// MET to send
    #[arg(long, conflicts_with = "max", required_unless_present = "max")]
    amount: Option<String>,

    /// Send the whole MET balance
    #[arg(long)]
    max: bool,

    /// Current MET balance of the account
    #[arg(long, value_name = "MET")]
    balance: String,

    /// Token contract; defaults to the configured MET address
    #[arg(long)]
    token: Option<Address>,

    /// Gas price in gwei
    #[arg(long)]
    gas_price: Option<String>,

    #[arg(long)]
    gas_limit: Option<String>,

    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    password: PasswordArg,
}

pub async fn run(config: &FormsAdapterConfig, ledger: HttpLedgerAdapter, opts: Options) -> Result<()> {
    let balance = to_base(&opts.balance, MET_DECIMALS).wrap_err("invalid --balance")?;
    let token = opts.token.unwrap_or(config.met_token_address);
    let session = FormSession::new(
        SendTokenForm::new(opts.from, token, &config.gas_defaults()),
        config.send_constraints(balance),
        ledger,
        config.debounce_window_ms,
    );

    if opts.gas_price.is_some() || opts.gas_limit.is_some() {
        session.update_form(|form| form.set_use_custom_gas(true)).await;
    }
    if let Some(price) = opts.gas_price {
        session.edit(SendField::GasPrice, Some(price)).await;
    }
    if let Some(limit) = opts.gas_limit {
        session.edit(SendField::GasLimit, Some(limit)).await;
    }
    session.edit(SendField::ToAddress, Some(opts.to)).await;
    if opts.max {
        session.use_max().await;
    } else {
        session.edit(SendField::MtnAmount, opts.amount).await;
    }

    output::review(&session).await?;
    if opts.dry_run {
        return Ok(());
    }
    output::submit(&session, &opts.password.take()).await
}
