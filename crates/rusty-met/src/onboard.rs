use clap::Args;
use eyre::{bail, eyre, Result};
use serde_json::json;
use zeroize::Zeroizing;

use rusty_met_forms_adapters::{HttpLedgerAdapter, OnboardingOutcome, OnboardingSession};
use rusty_met_forms_core::{Bip39PhraseSource, OnboardingField};

use crate::{output, PasswordArg};

#[derive(Args)]
pub struct Options {
    /// Restore from an existing phrase instead of generating one
    #[arg(long)]
    recover: bool,

    /// Phrase to restore from; read from stdin when absent
    #[arg(long, env = "RUSTY_MET_MNEMONIC", hide_env_values = true)]
    mnemonic: Option<String>,

    /// Opt out of anonymous usage data collection
    #[arg(long)]
    no_data_collection: bool,

    #[command(flatten)]
    password: PasswordArg,
}

async fn read_line(prompt: &'static str) -> Result<Zeroizing<String>> {
    tokio::task::spawn_blocking(move || {
        eprintln!("{prompt}");
        let mut line = Zeroizing::new(String::new());
        std::io::stdin().read_line(&mut line)?;
        Ok::<_, std::io::Error>(line)
    })
    .await?
    .map_err(|e| eyre!("failed to read stdin: {e}"))
}

pub async fn run(ledger: HttpLedgerAdapter, opts: Options) -> Result<()> {
    let session = OnboardingSession::start(&Bip39PhraseSource, ledger)?;
    session.accept_terms(!opts.no_data_collection).await?;

    let password = opts.password.take();
    session
        .edit(OnboardingField::Password, Some(password.to_string()))
        .await;
    session
        .edit(OnboardingField::PasswordAgain, Some(password.to_string()))
        .await;
    if !session.submit_password().await? {
        let message = session
            .inspect(|f| {
                f.error(OnboardingField::Password)
                    .or_else(|| f.error(OnboardingField::PasswordAgain))
                    .map(str::to_owned)
            })
            .await
            .unwrap_or_default();
        bail!("{message}");
    }

    if opts.recover {
        session.toggle_own_phrase().await;
        let phrase = match opts.mnemonic {
            Some(phrase) => Zeroizing::new(phrase),
            None => read_line("Enter your recovery passphrase:").await?,
        };
        session
            .edit(OnboardingField::UserMnemonic, Some(phrase.to_string()))
            .await;
    } else {
        let shown = session
            .inspect(|f| f.displayed_phrase().map(|p| Zeroizing::new(p.to_owned())))
            .await
            .ok_or_else(|| eyre!("no recovery phrase generated"))?;
        eprintln!("Write down your recovery passphrase:\n\n    {}\n", shown.as_str());
        session.toggle_copied().await;
        let typed = read_line("Type the recovery passphrase to confirm it:").await?;
        session
            .edit(OnboardingField::MnemonicAgain, Some(typed.to_string()))
            .await;
    }

    match session.accept().await? {
        OnboardingOutcome::Created(result) => {
            output::print_json(&json!({"status": "created", "result": result}))
        }
        OnboardingOutcome::Rejected(message) => bail!("wallet creation failed: {message}"),
        OnboardingOutcome::Disabled => bail!("a recovery phrase must have exactly 12 words"),
        OnboardingOutcome::Invalid => {
            let message = session
                .inspect(|f| {
                    f.error(OnboardingField::UserMnemonic)
                        .or_else(|| f.error(OnboardingField::MnemonicAgain))
                        .map(str::to_owned)
                })
                .await
                .unwrap_or_default();
            bail!("{message}")
        }
    }
}
