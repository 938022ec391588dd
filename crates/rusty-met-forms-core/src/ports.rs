use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("credential error: {0}")]
    Credential(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl PortError {
    pub fn is_credential(&self) -> bool {
        matches!(self, PortError::Credential(_))
    }

    /// The bare message without the variant prefix, for display next to a form.
    pub fn message(&self) -> &str {
        match self {
            PortError::Transport(m)
            | PortError::Validation(m)
            | PortError::Credential(m)
            | PortError::Rejected(m)
            | PortError::Conflict(m) => m,
        }
    }
}

/// The single boundary to ledger operations: estimation, submission and
/// account creation are all named operations with opaque JSON payloads.
#[async_trait]
pub trait LedgerPort: Send + Sync {
    async fn invoke(&self, operation: &str, payload: Value) -> Result<Value, PortError>;
}

#[async_trait]
impl<T: LedgerPort + ?Sized> LedgerPort for Arc<T> {
    async fn invoke(&self, operation: &str, payload: Value) -> Result<Value, PortError> {
        (**self).invoke(operation, payload).await
    }
}

pub trait ClockPort {
    fn now_ms(&self) -> Result<u64, PortError>;
}

pub trait PhraseSource {
    fn generate(&self) -> Result<Zeroizing<String>, PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_drops_the_variant_prefix() {
        let cases = [
            PortError::Transport("offline".to_owned()),
            PortError::Validation("offline".to_owned()),
            PortError::Credential("offline".to_owned()),
            PortError::Rejected("offline".to_owned()),
            PortError::Conflict("offline".to_owned()),
        ];
        for err in cases {
            assert_eq!(err.message(), "offline");
            assert!(err.to_string().ends_with(": offline"));
        }
        assert!(PortError::Credential(String::new()).is_credential());
    }
}
