mod common;

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::{json, Value};
use tiny_http::{Method, Response, Server, StatusCode};

use rusty_met_forms_adapters::{
    FormSession, FormsAdapterConfig, HttpLedgerAdapter, OnboardingOutcome, OnboardingSession,
    SubmitOutcome,
};
use rusty_met_forms_core::{
    Bip39PhraseSource, ConvertField, ConvertForm, LedgerPort, OnboardingField, PortError,
    ReviewOutcome, Screen,
};

use common::{ether, sender, PASSWORD, VALID_PHRASE};

type Recorded = Arc<Mutex<Vec<(String, Value)>>>;

fn spawn_mock_ledger(calls: Recorded) -> (String, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").expect("start server");
    let addr = format!("http://{}", server.server_addr());

    let join = thread::spawn(move || {
        for _ in 0..32 {
            let mut req = match server.recv() {
                Ok(r) => r,
                Err(_) => break,
            };
            let method = req.method().clone();
            let path = req.url().to_owned();
            let mut raw = String::new();
            let _ = req.as_reader().read_to_string(&mut raw);
            let body: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);
            if let Ok(mut g) = calls.lock() {
                g.push((path.clone(), body.clone()));
            }

            let (code, payload) = match (method, path.as_str()) {
                (Method::Post, "/invoke/mtn-convert-eth") if body["password"] == "secret" => {
                    (200, json!({"transactionHash": "0xabc"}).to_string())
                }
                (Method::Post, "/invoke/mtn-convert-eth") => (
                    400,
                    json!({"code": "WRONG_PASSWORD", "message": "Wrong password"}).to_string(),
                ),
                (Method::Post, "/invoke/metronome-convert-eth-gas-limit") => {
                    (200, json!({"gasLimit": 95_000}).to_string())
                }
                (Method::Post, "/invoke/metronome-convert-eth-estimate") => {
                    (200, json!({"result": "30000000000000000000"}).to_string())
                }
                (Method::Post, "/invoke/tokens-get-gas-limit") => (500, "boom".to_owned()),
                (Method::Post, "/invoke/send-token") => (401, String::new()),
                (Method::Post, "/invoke/create-wallet") => (
                    422,
                    json!({"error": {"message": "Account already exists"}}).to_string(),
                ),
                _ => (404, json!({"error": "not found"}).to_string()),
            };

            let response = Response::from_string(payload).with_status_code(StatusCode(code));
            let _ = req.respond(response);
        }
    });

    (addr, join)
}

fn adapter(base_url: String) -> HttpLedgerAdapter {
    let cfg = FormsAdapterConfig {
        ledger_base_url: base_url,
        ledger_timeout_ms: 5_000,
        ..FormsAdapterConfig::default()
    };
    HttpLedgerAdapter::with_config(&cfg).expect("client")
}

#[tokio::test]
async fn ledger_statuses_map_to_port_errors() {
    let calls: Recorded = Arc::default();
    let (base_url, _join) = spawn_mock_ledger(Arc::clone(&calls));
    let ledger = adapter(format!("{base_url}/"));

    let ok = ledger
        .invoke("mtn-convert-eth", json!({"password": "secret"}))
        .await
        .expect("success");
    assert_eq!(ok["transactionHash"], "0xabc");

    let err = ledger
        .invoke("mtn-convert-eth", json!({"password": "nope"}))
        .await
        .expect_err("wrong password");
    assert_eq!(err, PortError::Credential("Wrong password".to_owned()));

    let err = ledger
        .invoke("send-token", json!({}))
        .await
        .expect_err("unauthorized");
    assert!(err.is_credential());

    let err = ledger
        .invoke("tokens-get-gas-limit", json!({}))
        .await
        .expect_err("server error");
    assert!(matches!(err, PortError::Transport(ref m) if m.contains("500")), "{err}");

    let err = ledger
        .invoke("create-wallet", json!({}))
        .await
        .expect_err("rejected");
    assert_eq!(err, PortError::Rejected("Account already exists".to_owned()));

    let recorded = calls.lock().expect("calls").clone();
    assert_eq!(recorded.len(), 5);
    assert_eq!(recorded[0].0, "/invoke/mtn-convert-eth");
    assert_eq!(recorded[0].1["password"], "secret");
}

#[tokio::test]
async fn convert_session_runs_against_http_ledger() {
    let calls: Recorded = Arc::default();
    let (base_url, _join) = spawn_mock_ledger(Arc::clone(&calls));
    let cfg = FormsAdapterConfig {
        eth_usd_rate: 2_000.0,
        ..FormsAdapterConfig::default()
    };
    let session = FormSession::new(
        ConvertForm::new(sender(), &cfg.gas_defaults()),
        cfg.convert_constraints(ether("10")).expect("constraints"),
        adapter(base_url),
        20,
    );

    session
        .edit(ConvertField::EthAmount, Some("1,5".to_owned()))
        .await;
    session.wait_for_estimates().await;
    assert_eq!(session.review().await.expect("review"), ReviewOutcome::Ready);

    let summary = session
        .inspect(|w| w.confirmation().map(|v| v.summary))
        .await
        .expect("confirmation");
    assert_eq!(
        summary,
        "You will convert 1.5 ETH ($3000.00) and get approximately 30 MET."
    );

    let failed = session.confirm("nope").await.expect("confirm");
    assert!(matches!(failed, SubmitOutcome::Failed(ref f) if f.is_credential()));
    assert_eq!(session.screen().await, Screen::Review);

    let done = session.confirm("secret").await.expect("retry");
    assert_eq!(done, SubmitOutcome::Succeeded(json!({"transactionHash": "0xabc"})));

    let recorded = calls.lock().expect("calls").clone();
    let submissions: Vec<_> = recorded
        .iter()
        .filter(|(path, _)| path == "/invoke/mtn-convert-eth")
        .collect();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[1].1["gasLimit"], "95000");
    assert_eq!(submissions[1].1["value"], ether("1.5").to_string());
}

#[tokio::test]
async fn onboarding_rejection_surfaces_ledger_message() {
    let calls: Recorded = Arc::default();
    let (base_url, _join) = spawn_mock_ledger(Arc::clone(&calls));
    let session =
        OnboardingSession::start(&Bip39PhraseSource, adapter(base_url)).expect("start");

    session.accept_terms(true).await.expect("terms");
    session
        .edit(OnboardingField::Password, Some(PASSWORD.to_owned()))
        .await;
    session
        .edit(OnboardingField::PasswordAgain, Some(PASSWORD.to_owned()))
        .await;
    assert!(session.submit_password().await.expect("password"));
    session.toggle_own_phrase().await;
    session
        .edit(OnboardingField::UserMnemonic, Some(VALID_PHRASE.to_owned()))
        .await;

    let outcome = session.accept().await.expect("accept");
    assert_eq!(
        outcome,
        OnboardingOutcome::Rejected("Account already exists".to_owned())
    );
    let recorded = calls.lock().expect("calls").clone();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].1["mnemonic"], VALID_PHRASE);
    assert_eq!(recorded[0].1["dataCollection"], true);
}
