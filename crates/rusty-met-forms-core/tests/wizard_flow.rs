use alloy::primitives::{Address, U256};
use serde_json::json;

use rusty_met_forms_core::units::{ten_pow, to_base, ETHER_DECIMALS, GWEI_DECIMALS};
use rusty_met_forms_core::{
    CompletionOutcome, ConfirmOutcome, ConvertConstraints, ConvertField, ConvertForm, EstimateKind,
    FailureKind, FinishOutcome, Form, GasDefaults, GasLimitBounds, PortError, ReviewOutcome, Screen,
    SendConstraints, SendField, SendTokenForm, TimestampMs, Wizard, WizardStatus,
    DEFAULT_DEBOUNCE_MS,
};

const RECIPIENT: &str = "0x15dd2028C976beaA6668E286b496A518F457b5Cf";

fn sender() -> Address {
    "0x1000000000000000000000000000000000000001"
        .parse()
        .expect("valid sender")
}

fn token() -> Address {
    "0x000000000000000000000000000000000000BEEF"
        .parse()
        .expect("valid token")
}

fn ether(s: &str) -> U256 {
    to_base(s, ETHER_DECIMALS).expect("valid amount")
}

fn convert_constraints(available: &str) -> ConvertConstraints {
    ConvertConstraints {
        available_eth: ether(available),
        fee_reserve: U256::ZERO,
        eth_rate: 2_000.0,
        max_gas_price: U256::from(200u64) * ten_pow(GWEI_DECIMALS),
        gas_limit: GasLimitBounds::default(),
    }
}

fn convert_wizard(available: &str) -> Wizard<ConvertForm> {
    Wizard::new(
        ConvertForm::new(sender(), &GasDefaults::default()),
        convert_constraints(available),
        DEFAULT_DEBOUNCE_MS,
    )
}

fn send_wizard(available: &str) -> Wizard<SendTokenForm> {
    Wizard::new(
        SendTokenForm::new(sender(), token(), &GasDefaults::default()),
        SendConstraints {
            available_mtn: ether(available),
            max_gas_price: U256::from(200u64) * ten_pow(GWEI_DECIMALS),
            gas_limit: GasLimitBounds::default(),
        },
        DEFAULT_DEBOUNCE_MS,
    )
}

fn at(ms: u64) -> TimestampMs {
    TimestampMs(ms)
}

fn dispatch(outcome: ConfirmOutcome) -> rusty_met_forms_core::SubmissionTicket {
    match outcome {
        ConfirmOutcome::Dispatch(ticket) => ticket,
        other => panic!("expected dispatch, got {other:?}"),
    }
}

#[test]
fn comma_amount_reviews_into_exact_base_units() {
    let mut wizard = convert_wizard("100");
    wizard.edit(ConvertField::EthAmount, Some("12,5".to_owned()), at(0));
    assert!(wizard.errors().is_empty());

    assert_eq!(wizard.review().expect("review"), ReviewOutcome::Ready);
    assert_eq!(wizard.status(), WizardStatus::Reviewing);
    let snapshot = wizard.snapshot().expect("snapshot");
    assert_eq!(snapshot.value, U256::from(125u64) * ten_pow(17));
    assert_eq!(snapshot.display_amount, "12.5");
    assert_eq!(snapshot.usd_amount.as_deref(), Some("25000.00"));
    assert!(wizard.errors().is_empty());

    let view = wizard.confirmation().expect("confirmation view");
    assert!(view.summary.starts_with("You will convert 12.5 ETH ($25000.00)"));
    assert_eq!(view.edit_label, "Edit this conversion");
}

#[test]
fn invalid_fields_keep_wizard_composing() {
    let mut wizard = convert_wizard("100");
    wizard.edit(ConvertField::EthAmount, Some("250".to_owned()), at(0));
    wizard.edit(ConvertField::GasPrice, Some("500".to_owned()), at(0));

    assert_eq!(wizard.review().expect("review"), ReviewOutcome::Invalid);
    assert_eq!(wizard.status(), WizardStatus::Composing);
    assert!(wizard.snapshot().is_none());
    assert_eq!(wizard.error(ConvertField::EthAmount), Some("Insufficient funds"));
    assert_eq!(wizard.error(ConvertField::GasPrice), Some("Gas price is too high"));
    assert_eq!(wizard.error(ConvertField::GasLimit), None);

    // Fixing one field leaves the other error in place.
    wizard.edit(ConvertField::EthAmount, Some("1".to_owned()), at(10));
    assert_eq!(wizard.error(ConvertField::EthAmount), None);
    assert_eq!(wizard.error(ConvertField::GasPrice), Some("Gas price is too high"));
}

#[test]
fn edits_during_review_do_not_touch_snapshot() {
    let mut wizard = convert_wizard("100");
    wizard.edit(ConvertField::EthAmount, Some("1".to_owned()), at(0));
    wizard.review().expect("review");

    wizard.edit(ConvertField::EthAmount, Some("2".to_owned()), at(10));
    assert_eq!(wizard.snapshot().expect("snapshot").value, ether("1"));

    let ticket = dispatch(wizard.confirm("secret").expect("confirm"));
    assert_eq!(ticket.payload["value"], json!(ether("1").to_string()));

    wizard
        .finish(ticket.attempt, Err(PortError::Rejected("nonce too low".to_owned())))
        .expect("finish");
    wizard.back_to_edit().expect("back to edit");
    assert_eq!(wizard.status(), WizardStatus::Composing);
    assert!(wizard.snapshot().is_none());
    assert!(wizard.failure().is_none());
    assert_eq!(wizard.form().value(ConvertField::EthAmount), Some("2"));
}

#[test]
fn back_to_edit_preserves_live_values() {
    let mut wizard = send_wizard("50");
    wizard.edit(SendField::ToAddress, Some(RECIPIENT.to_owned()), at(0));
    wizard.edit(SendField::MtnAmount, Some("3".to_owned()), at(0));
    wizard.review().expect("review");
    wizard.back_to_edit().expect("edit");

    assert_eq!(wizard.status(), WizardStatus::Composing);
    assert_eq!(wizard.form().value(SendField::MtnAmount), Some("3"));
    assert_eq!(wizard.form().value(SendField::ToAddress), Some(RECIPIENT));
}

#[test]
fn repeated_confirm_dispatches_once() {
    let mut wizard = convert_wizard("100");
    wizard.edit(ConvertField::EthAmount, Some("1".to_owned()), at(0));
    wizard.review().expect("review");

    let ticket = dispatch(wizard.confirm("secret").expect("first confirm"));
    assert_eq!(ticket.operation, "mtn-convert-eth");
    for _ in 0..5 {
        let err = wizard.confirm("secret").expect_err("second confirm must fail");
        assert_eq!(err, PortError::Conflict("SUBMISSION_IN_FLIGHT".to_owned()));
    }
    assert_eq!(wizard.attempts(), 1);
    assert_eq!(wizard.screen(), Screen::Pending);

    let outcome = wizard
        .finish(ticket.attempt, Ok(json!({"transactionHash": "0xabc"})))
        .expect("finish");
    assert!(matches!(outcome, FinishOutcome::Succeeded(_)));
    assert_eq!(wizard.status(), WizardStatus::Succeeded);
    assert_eq!(wizard.screen(), Screen::Done);
    assert!(wizard.confirm("secret").is_err());
}

#[test]
fn empty_password_is_a_prompt_not_a_submission() {
    let mut wizard = convert_wizard("100");
    wizard.edit(ConvertField::EthAmount, Some("1".to_owned()), at(0));
    wizard.review().expect("review");

    let outcome = wizard.confirm("").expect("confirm");
    assert_eq!(
        outcome,
        ConfirmOutcome::PasswordRequired("Password is required".to_owned())
    );
    assert_eq!(wizard.status(), WizardStatus::Reviewing);
    assert_eq!(wizard.password_error(), Some("Password is required"));
    assert_eq!(wizard.attempts(), 0);
}

#[test]
fn credential_failure_returns_to_review_with_snapshot() {
    let mut wizard = send_wizard("50");
    wizard.edit(SendField::ToAddress, Some(RECIPIENT.to_owned()), at(0));
    wizard.edit(SendField::MtnAmount, Some("3".to_owned()), at(0));
    wizard.review().expect("review");
    let snapshot_before = wizard.snapshot().cloned().expect("snapshot");

    let ticket = dispatch(wizard.confirm("wrong").expect("confirm"));
    let outcome = wizard
        .finish(ticket.attempt, Err(PortError::Credential("Invalid password".to_owned())))
        .expect("finish");

    let FinishOutcome::Failed(failure) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(failure.kind, FailureKind::Credential);
    assert_eq!(wizard.status(), WizardStatus::Failed);
    // Send forms return to compose on failure, except for credential errors.
    assert_eq!(wizard.screen(), Screen::Review);
    assert_eq!(wizard.snapshot(), Some(&snapshot_before));
    assert!(wizard.errors().is_empty());
    assert_eq!(
        wizard.failure().map(|f| f.message.as_str()),
        Some("Invalid password")
    );

    let retry = dispatch(wizard.confirm("right").expect("retry"));
    assert_eq!(retry.attempt, 2);
    assert_eq!(retry.payload["password"], "right");
    assert_eq!(retry.payload["value"], ticket.payload["value"]);
    assert!(wizard.failure().is_none());
}

#[test]
fn general_failure_follows_form_policy() {
    let mut wizard = send_wizard("50");
    wizard.edit(SendField::ToAddress, Some(RECIPIENT.to_owned()), at(0));
    wizard.edit(SendField::MtnAmount, Some("3".to_owned()), at(0));
    wizard.review().expect("review");
    let ticket = dispatch(wizard.confirm("secret").expect("confirm"));
    wizard
        .finish(ticket.attempt, Err(PortError::Transport(String::new())))
        .expect("finish");

    assert_eq!(wizard.screen(), Screen::Compose);
    assert_eq!(
        wizard.failure().map(|f| f.message.as_str()),
        Some("Unknown error")
    );

    // Reviewing again from a failed attempt restarts the cycle.
    wizard.edit(SendField::MtnAmount, Some("4".to_owned()), at(10));
    assert_eq!(wizard.review().expect("review"), ReviewOutcome::Ready);
    assert!(wizard.failure().is_none());
    assert_eq!(wizard.snapshot().expect("snapshot").value, ether("4"));
}

#[test]
fn stale_submission_result_is_rejected() {
    let mut wizard = convert_wizard("100");
    wizard.edit(ConvertField::EthAmount, Some("1".to_owned()), at(0));
    wizard.review().expect("review");
    let ticket = dispatch(wizard.confirm("secret").expect("confirm"));

    let err = wizard
        .finish(ticket.attempt + 1, Ok(json!({})))
        .expect_err("unknown attempt");
    assert!(err.to_string().contains("STALE_SUBMISSION_RESULT"));
    assert_eq!(wizard.status(), WizardStatus::Submitting);
}

#[test]
fn amount_edit_triggers_both_convert_estimates() {
    let mut wizard = convert_wizard("100");
    let kinds = wizard.edit(ConvertField::EthAmount, Some("2".to_owned()), at(0));
    assert_eq!(kinds, vec![EstimateKind::GasLimit, EstimateKind::ConversionReturn]);
    assert!(wizard
        .edit(ConvertField::GasPrice, Some("12".to_owned()), at(0))
        .is_empty());

    assert!(wizard.take_due_estimates(at(499)).is_empty());
    let due = wizard.take_due_estimates(at(500));
    assert_eq!(due.len(), 2);

    let gas = due
        .iter()
        .find(|r| r.kind == EstimateKind::GasLimit)
        .expect("gas request");
    assert_eq!(gas.input.operation, "metronome-convert-eth-gas-limit");
    assert_eq!(gas.input.payload["value"], json!(ether("2").to_string()));
    assert_eq!(
        wizard.complete_estimate(gas, Ok(json!({"gasLimit": 150_000}))),
        CompletionOutcome::Applied(U256::from(150_000u64))
    );
    assert_eq!(wizard.form().value(ConvertField::GasLimit), Some("150000"));

    let ret = due
        .iter()
        .find(|r| r.kind == EstimateKind::ConversionReturn)
        .expect("return request");
    wizard.complete_estimate(ret, Ok(json!({"result": ether("40").to_string()})));
    assert_eq!(wizard.form().estimate(), Some(ether("40")));
    assert!(wizard.estimates_idle());

    wizard.review().expect("review");
    let view = wizard.confirmation().expect("view");
    assert!(view.summary.contains("get approximately 40 MET"));
    assert_eq!(wizard.snapshot().expect("snapshot").gas_limit, 150_000);
}

#[test]
fn estimation_failure_never_blocks_review() {
    let mut wizard = convert_wizard("100");
    wizard.edit(ConvertField::EthAmount, Some("2".to_owned()), at(0));
    for request in wizard.take_due_estimates(at(500)) {
        let outcome =
            wizard.complete_estimate(&request, Err(PortError::Transport("offline".to_owned())));
        assert_eq!(outcome, CompletionOutcome::Failed);
    }
    assert!(wizard.errors().is_empty());
    assert_eq!(wizard.review().expect("review"), ReviewOutcome::Ready);
    let view = wizard.confirmation().expect("view");
    assert!(view.summary.contains("could not be estimated"));
}

#[test]
fn custom_gas_keeps_user_gas_limit() {
    let mut wizard = convert_wizard("100");
    wizard.form_mut().set_use_custom_gas(true);
    wizard.edit(ConvertField::GasLimit, Some("300000".to_owned()), at(0));
    wizard.edit(ConvertField::EthAmount, Some("2".to_owned()), at(0));
    let request = wizard
        .take_due_estimate(EstimateKind::GasLimit, at(500))
        .expect("due");
    wizard.complete_estimate(&request, Ok(json!({"gasLimit": 150_000})));
    assert_eq!(wizard.form().value(ConvertField::GasLimit), Some("300000"));
    assert_eq!(
        wizard.estimate(EstimateKind::GasLimit).map(|e| e.value),
        Some(U256::from(150_000u64))
    );
}

#[test]
fn send_estimate_requires_recipient_and_amount() {
    let mut wizard = send_wizard("50");
    wizard.edit(SendField::MtnAmount, Some("3".to_owned()), at(0));
    assert!(wizard.take_due_estimates(at(500)).is_empty(), "no recipient yet");

    wizard.edit(SendField::ToAddress, Some(RECIPIENT.to_owned()), at(600));
    let due = wizard.take_due_estimates(at(1_100));
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].input.operation, "tokens-get-gas-limit");
    assert_eq!(due[0].input.payload["token"], token().to_string());
}

#[test]
fn max_fills_spendable_amount() {
    let mut wizard = Wizard::new(
        ConvertForm::new(sender(), &GasDefaults::default()),
        ConvertConstraints {
            fee_reserve: ether("0.5"),
            ..convert_constraints("3")
        },
        DEFAULT_DEBOUNCE_MS,
    );
    let kinds = wizard.use_max(at(0));
    assert_eq!(wizard.form().value(ConvertField::EthAmount), Some("2.5"));
    assert_eq!(kinds.len(), 2);
    assert_eq!(wizard.form().usd_amount(), Some("5000.00"));
}

#[test]
fn balance_update_clears_stale_amount_error() {
    let mut wizard = convert_wizard("1");
    wizard.edit(ConvertField::EthAmount, Some("2".to_owned()), at(0));
    assert_eq!(wizard.error(ConvertField::EthAmount), Some("Insufficient funds"));
    wizard.set_constraints(convert_constraints("5"));
    assert_eq!(wizard.error(ConvertField::EthAmount), None);
}

#[test]
fn send_custom_gas_keeps_user_gas_limit() {
    let mut wizard = send_wizard("50");
    wizard.form_mut().set_use_custom_gas(true);
    wizard.edit(SendField::GasLimit, Some("300000".to_owned()), at(0));
    wizard.edit(SendField::ToAddress, Some(RECIPIENT.to_owned()), at(0));
    wizard.edit(SendField::MtnAmount, Some("3".to_owned()), at(0));
    let request = wizard
        .take_due_estimate(EstimateKind::GasLimit, at(500))
        .expect("due");
    let outcome = wizard.complete_estimate(&request, Ok(json!({"gasLimit": 65_000})));

    assert_eq!(outcome, CompletionOutcome::Applied(U256::from(65_000u64)));
    assert_eq!(wizard.form().value(SendField::GasLimit), Some("300000"));
}

#[test]
fn send_estimate_fills_gas_limit_by_default() {
    let mut wizard = send_wizard("50");
    wizard.edit(SendField::ToAddress, Some(RECIPIENT.to_owned()), at(0));
    wizard.edit(SendField::MtnAmount, Some("3".to_owned()), at(0));
    let request = wizard
        .take_due_estimate(EstimateKind::GasLimit, at(500))
        .expect("due");
    wizard.complete_estimate(&request, Ok(json!({"gasLimit": "65000"})));
    assert_eq!(wizard.form().value(SendField::GasLimit), Some("65000"));
}

#[test]
fn edits_while_submitting_are_ignored() {
    let mut wizard = convert_wizard("100");
    wizard.edit(ConvertField::EthAmount, Some("1".to_owned()), at(0));
    wizard.review().expect("review");
    let ticket = dispatch(wizard.confirm("secret").expect("confirm"));

    let triggered = wizard.edit(ConvertField::EthAmount, Some("7".to_owned()), at(10));
    assert!(triggered.is_empty());
    assert!(wizard.use_max(at(20)).is_empty());
    assert_eq!(wizard.form().value(ConvertField::EthAmount), Some("1"));

    wizard
        .finish(ticket.attempt, Err(PortError::Rejected("nonce too low".to_owned())))
        .expect("finish");
    wizard.edit(ConvertField::EthAmount, Some("7".to_owned()), at(30));
    assert_eq!(wizard.form().value(ConvertField::EthAmount), Some("7"));
}
