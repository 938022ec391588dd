//! Typed form variants hosted by the wizard.
//!
//! Each form declares a closed field enum, the constraints its rules need, the
//! estimates it watches and the immutable snapshot that review and submission
//! share.

mod convert;
mod send;

use std::fmt::Debug;

use alloy::primitives::U256;
use serde::Serialize;
use serde_json::Value;

pub use convert::{ConvertConstraints, ConvertField, ConvertForm, ConvertSnapshot};
pub use send::{SendConstraints, SendField, SendSnapshot, SendTokenForm};

pub use crate::validation::GasLimitBounds;
use crate::domain::{ConfirmationView, EstimateInput, EstimateKind, FailurePolicy, FormKind};
use crate::ports::PortError;
use crate::units::{to_base, GWEI_DECIMALS};

pub trait Form: Send + 'static {
    type Field: Copy + Ord + Debug + Send + Sync + 'static;
    type Constraints: Debug + Send + 'static;
    type Snapshot: Clone + Debug + Serialize + Send + 'static;

    const KIND: FormKind;
    const FAILURE_POLICY: FailurePolicy;
    const FIELDS: &'static [Self::Field];
    const ESTIMATES: &'static [EstimateKind];

    fn value(&self, field: Self::Field) -> Option<&str>;

    fn set_value(
        &mut self,
        field: Self::Field,
        value: Option<String>,
        constraints: &Self::Constraints,
    );

    fn validate_field(&self, field: Self::Field, constraints: &Self::Constraints)
        -> Option<String>;

    /// Estimates that must be refreshed when `field` changes.
    fn watched_by(field: Self::Field) -> &'static [EstimateKind];

    /// `None` when the current values cannot be estimated.
    fn estimate_input(&self, kind: EstimateKind) -> Option<EstimateInput>;

    /// Returns the field the estimate was written into, if any.
    fn apply_estimate(&mut self, kind: EstimateKind, value: U256) -> Option<Self::Field>;

    /// The amount field and its largest spendable display value.
    fn max_amount(constraints: &Self::Constraints) -> (Self::Field, String);

    fn snapshot(&self, constraints: &Self::Constraints) -> Result<Self::Snapshot, PortError>;

    fn confirmation(snapshot: &Self::Snapshot) -> ConfirmationView;

    fn submission(snapshot: &Self::Snapshot, password: &str) -> (&'static str, Value);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasDefaults {
    pub gas_price_gwei: String,
    pub gas_limit: u64,
}

impl Default for GasDefaults {
    fn default() -> Self {
        Self {
            gas_price_gwei: "10".to_owned(),
            gas_limit: 200_000,
        }
    }
}

pub(crate) fn parse_gas(
    price_gwei: Option<&str>,
    limit: Option<&str>,
) -> Result<(U256, u64), PortError> {
    let price = to_base(price_gwei.unwrap_or_default(), GWEI_DECIMALS)
        .map_err(|e| PortError::Validation(format!("gas price: {e}")))?;
    let limit = limit
        .unwrap_or_default()
        .trim()
        .parse::<u64>()
        .map_err(|e| PortError::Validation(format!("gas limit: {e}")))?;
    Ok((price, limit))
}

pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
