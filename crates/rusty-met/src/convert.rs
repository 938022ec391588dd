use alloy::primitives::Address;
use clap::Args;
use eyre::{Result, WrapErr};

use rusty_met_forms_adapters::{FormSession, FormsAdapterConfig, HttpLedgerAdapter};
use rusty_met_forms_core::units::{to_base, ETHER_DECIMALS};
use rusty_met_forms_core::{ConvertField, ConvertForm};

use crate::{output, PasswordArg};

#[derive(Debug, Args)]
pub struct Options {
    /// Account converting the ETH
    #[arg(long)]
    from: Address,

    /// ETH to convert; "," is accepted as decimal separator
    #[arg(long, conflicts_with = "max", required_unless_present = "max")]
    amount: Option<String>,

    /// Convert the whole spendable balance
    #[arg(long)]
    max: bool,

    /// Current ETH balance of the account
    #[arg(long, value_name = "ETH")]
    balance: String,

    /// Gas price in gwei; implies custom gas
    #[arg(long)]
    gas_price: Option<String>,

    /// Gas limit; implies custom gas
    #[arg(long)]
    gas_limit: Option<String>,

    /// Print the confirmation and stop
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    password: PasswordArg,
}

pub async fn run(config: &FormsAdapterConfig, ledger: HttpLedgerAdapter, opts: Options) -> Result<()> {
    let balance = to_base(&opts.balance, ETHER_DECIMALS).wrap_err("invalid --balance")?;
    let session = FormSession::new(
        ConvertForm::new(opts.from, &config.gas_defaults()),
        config.convert_constraints(balance)?,
        ledger,
        config.debounce_window_ms,
    );

    if opts.gas_price.is_some() || opts.gas_limit.is_some() {
        session.update_form(|form| form.set_use_custom_gas(true)).await;
    }
    if let Some(price) = opts.gas_price {
        session.edit(ConvertField::GasPrice, Some(price)).await;
    }
    if let Some(limit) = opts.gas_limit {
        session.edit(ConvertField::GasLimit, Some(limit)).await;
    }
    if opts.max {
        session.use_max().await;
    } else {
        session.edit(ConvertField::EthAmount, opts.amount).await;
    }

    output::review(&session).await?;
    if opts.dry_run {
        return Ok(());
    }
    output::submit(&session, &opts.password.take()).await
}
