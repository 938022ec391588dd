use std::fmt::Debug;

use eyre::{bail, Result};
use serde_json::{json, Value};

use rusty_met_forms_adapters::{FormSession, SubmitOutcome, SystemClockAdapter};
use rusty_met_forms_core::ports::ClockPort;
use rusty_met_forms_core::{ErrorMap, Form, LedgerPort, ReviewOutcome};

pub fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_errors<K: Debug>(errors: &ErrorMap<K>) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field:?}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Reviews the composed form and prints the confirmation. Fails with the
/// field errors when the form does not validate.
pub async fn review<F, L>(session: &FormSession<F, L>) -> Result<()>
where
    F: Form,
    L: LedgerPort + 'static,
{
    session.wait_for_estimates().await;
    if session.review().await? == ReviewOutcome::Invalid {
        let errors = session.inspect(|w| render_errors(w.errors())).await;
        bail!("form is invalid: {errors}");
    }
    let view = session.inspect(|w| w.confirmation()).await;
    if let Some(view) = view {
        eprintln!("{}\n{}", view.title, view.summary);
    }
    Ok(())
}

pub async fn submit<F, L>(session: &FormSession<F, L>, password: &str) -> Result<()>
where
    F: Form,
    L: LedgerPort + 'static,
{
    match session.confirm(password).await? {
        SubmitOutcome::Succeeded(result) => print_json(&json!({
            "status": "succeeded",
            "result": result,
            "completedAtMs": SystemClockAdapter.now_ms().ok(),
        })),
        SubmitOutcome::Failed(failure) if failure.is_credential() => {
            bail!("{} (set RUSTY_MET_PASSWORD and try again)", failure.message)
        }
        SubmitOutcome::Failed(failure) => bail!("submission failed: {}", failure.message),
        SubmitOutcome::PasswordRequired(message) => {
            bail!("{message}: pass --password or set RUSTY_MET_PASSWORD")
        }
    }
}
