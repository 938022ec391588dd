use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

use rusty_met_forms_core::mnemonic::OP_CREATE_WALLET;
use rusty_met_forms_core::{
    AcceptOutcome, LedgerPort, OnboardingField, OnboardingFlow, OnboardingRequest, PhraseSource,
    PortError,
};

#[derive(Debug, Clone, PartialEq)]
pub enum OnboardingOutcome {
    Created(Value),
    /// The ledger refused the account; the flow is back on the phrase step.
    Rejected(String),
    /// The typed phrase does not have 12 words.
    Disabled,
    /// The phrase failed validation; see the flow's field errors.
    Invalid,
}

struct Shared<L> {
    flow: Mutex<OnboardingFlow>,
    ledger: L,
}

/// Async driver for the onboarding flow, submitting through `create-wallet`.
pub struct OnboardingSession<L> {
    shared: Arc<Shared<L>>,
}

impl<L> Clone for OnboardingSession<L> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<L: LedgerPort + 'static> OnboardingSession<L> {
    pub fn start(phrases: &impl PhraseSource, ledger: L) -> Result<Self, PortError> {
        Ok(Self {
            shared: Arc::new(Shared {
                flow: Mutex::new(OnboardingFlow::start(phrases)?),
                ledger,
            }),
        })
    }

    pub fn ledger(&self) -> &L {
        &self.shared.ledger
    }

    pub async fn inspect<R>(&self, f: impl FnOnce(&OnboardingFlow) -> R) -> R {
        f(&*self.shared.flow.lock().await)
    }

    pub async fn accept_terms(&self, data_collection: bool) -> Result<(), PortError> {
        let mut flow = self.shared.flow.lock().await;
        flow.set_data_collection(data_collection);
        flow.accept_terms()
    }

    pub async fn edit(&self, field: OnboardingField, value: Option<String>) {
        self.shared.flow.lock().await.edit(field, value);
    }

    pub async fn submit_password(&self) -> Result<bool, PortError> {
        self.shared.flow.lock().await.submit_password()
    }

    pub async fn toggle_own_phrase(&self) {
        self.shared.flow.lock().await.toggle_own_phrase();
    }

    pub async fn toggle_copied(&self) {
        self.shared.flow.lock().await.toggle_copied();
    }

    pub async fn accept(&self) -> Result<OnboardingOutcome, PortError> {
        let request = match self.shared.flow.lock().await.accept()? {
            AcceptOutcome::Submit(request) => request,
            AcceptOutcome::Disabled => return Ok(OnboardingOutcome::Disabled),
            AcceptOutcome::Invalid => return Ok(OnboardingOutcome::Invalid),
        };
        tokio::spawn(Arc::clone(&self.shared).create(request))
            .await
            .map_err(|e| PortError::Transport(format!("onboarding task failed: {e}")))?
    }
}

impl<L: LedgerPort + 'static> Shared<L> {
    async fn create(self: Arc<Self>, request: OnboardingRequest) -> Result<OnboardingOutcome, PortError> {
        info!(data_collection = request.data_collection_consent, "creating wallet");
        let result = self
            .ledger
            .invoke(OP_CREATE_WALLET, request.to_payload())
            .await;
        let mut flow = self.flow.lock().await;
        match result {
            Ok(value) => {
                flow.finish(Ok(value.clone()))?;
                Ok(OnboardingOutcome::Created(value))
            }
            Err(err) => {
                flow.finish(Err(err))?;
                let message = flow.flow_error().unwrap_or("Unknown error").to_owned();
                Ok(OnboardingOutcome::Rejected(message))
            }
        }
    }
}
