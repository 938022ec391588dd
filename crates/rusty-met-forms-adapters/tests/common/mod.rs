#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use alloy::primitives::{Address, U256};

use rusty_met_forms_adapters::{FormsAdapterConfig, FormSession, InMemoryLedger};
use rusty_met_forms_core::units::{to_base, ETHER_DECIMALS};
use rusty_met_forms_core::{ConvertForm, SendTokenForm};

pub const RECIPIENT: &str = "0x15dd2028C976beaA6668E286b496A518F457b5Cf";
pub const VALID_PHRASE: &str =
    "legal winner thank year wave sausage worth useful legal winner thank yellow";
pub const PASSWORD: &str = "correct horse battery staple";

pub fn sender() -> Address {
    "0x1000000000000000000000000000000000000001"
        .parse()
        .expect("valid sender address")
}

pub fn ether(amount: &str) -> U256 {
    to_base(amount, ETHER_DECIMALS).expect("valid amount")
}

pub fn config() -> FormsAdapterConfig {
    FormsAdapterConfig {
        eth_usd_rate: 2_000.0,
        ..FormsAdapterConfig::default()
    }
}

pub fn convert_session(ledger: InMemoryLedger) -> FormSession<ConvertForm, InMemoryLedger> {
    let cfg = config();
    FormSession::new(
        ConvertForm::new(sender(), &cfg.gas_defaults()),
        cfg.convert_constraints(ether("100")).expect("constraints"),
        ledger,
        cfg.debounce_window_ms,
    )
}

pub fn send_session(ledger: InMemoryLedger) -> FormSession<SendTokenForm, InMemoryLedger> {
    let cfg = config();
    FormSession::new(
        SendTokenForm::new(sender(), cfg.met_token_address, &cfg.gas_defaults()),
        cfg.send_constraints(ether("100")),
        ledger,
        cfg.debounce_window_ms,
    )
}

/// Counts success callbacks.
#[derive(Debug, Clone, Default)]
pub struct CallbackCounter(Arc<AtomicUsize>);

impl CallbackCounter {
    pub fn hook(&self) -> impl FnMut(&serde_json::Value) + Send + 'static {
        let inner = Arc::clone(&self.0);
        move |_| {
            inner.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
