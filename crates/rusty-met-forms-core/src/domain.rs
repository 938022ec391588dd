use std::collections::BTreeMap;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ports::PortError;

/// Field-level validation messages keyed by the form's field enum.
pub type ErrorMap<F> = BTreeMap<F, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimestampMs(pub u64);

impl TimestampMs {
    pub fn saturating_add_ms(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    pub fn millis_until(self, later: TimestampMs) -> u64 {
        later.0.saturating_sub(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormKind {
    ConvertEthToMet,
    SendToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EstimateKind {
    GasLimit,
    ConversionReturn,
}

/// Everything the ledger needs to answer one estimation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimateInput {
    pub operation: &'static str,
    pub payload: Value,
    pub result_field: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimationRequest<I> {
    pub kind: EstimateKind,
    pub sequence: u64,
    pub input: I,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimationResult {
    pub sequence: u64,
    pub value: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Credential,
    General,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl SubmissionFailure {
    pub fn is_credential(&self) -> bool {
        self.kind == FailureKind::Credential
    }
}

impl From<PortError> for SubmissionFailure {
    fn from(err: PortError) -> Self {
        let kind = if err.is_credential() {
            FailureKind::Credential
        } else {
            FailureKind::General
        };
        let message = err.message().trim().to_owned();
        Self {
            kind,
            message: if message.is_empty() {
                "Unknown error".to_owned()
            } else {
                message
            },
        }
    }
}

/// Which screen a failed submission returns the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    ReturnToReview,
    ReturnToCompose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Screen {
    Compose,
    Review,
    Pending,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationView {
    pub title: String,
    pub summary: String,
    pub edit_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionTicket {
    pub attempt: u64,
    pub operation: &'static str,
    pub payload: Value,
}
