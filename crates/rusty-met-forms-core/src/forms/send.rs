use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{parse_gas, present, Form, GasDefaults};
use crate::domain::{ConfirmationView, EstimateInput, EstimateKind, FailurePolicy, FormKind};
use crate::ports::PortError;
use crate::units::{to_base, to_display, MET_DECIMALS};
use crate::validation::{
    validate_amount, validate_gas_limit, validate_gas_price, validate_to_address, GasLimitBounds,
};

pub const OP_TOKEN_GAS_LIMIT: &str = "tokens-get-gas-limit";
pub const OP_SEND_TOKEN: &str = "send-token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SendField {
    ToAddress,
    MtnAmount,
    GasPrice,
    GasLimit,
}

#[derive(Debug, Clone)]
pub struct SendConstraints {
    pub available_mtn: U256,
    pub max_gas_price: U256,
    pub gas_limit: GasLimitBounds,
}

/// MET token transfer.
#[derive(Debug, Clone)]
pub struct SendTokenForm {
    from: Address,
    token: Address,
    to_address: Option<String>,
    mtn_amount: Option<String>,
    gas_price: Option<String>,
    gas_limit: Option<String>,
    use_custom_gas: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendSnapshot {
    pub from: Address,
    pub to: Address,
    pub token: Address,
    pub value: U256,
    pub display_amount: String,
    pub gas_price: U256,
    pub gas_limit: u64,
}

impl SendTokenForm {
    pub fn new(from: Address, token: Address, defaults: &GasDefaults) -> Self {
        Self {
            from,
            token,
            to_address: None,
            mtn_amount: None,
            gas_price: Some(defaults.gas_price_gwei.clone()),
            gas_limit: Some(defaults.gas_limit.to_string()),
            use_custom_gas: false,
        }
    }

    pub fn sender(&self) -> Address {
        self.from
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn use_custom_gas(&self) -> bool {
        self.use_custom_gas
    }

    /// With custom gas on, gas-limit estimates leave the typed limit alone.
    pub fn set_use_custom_gas(&mut self, enabled: bool) {
        self.use_custom_gas = enabled;
    }

    fn recipient(&self) -> Option<Address> {
        let raw = present(&self.to_address)?;
        if validate_to_address(Some(raw)).is_some() {
            return None;
        }
        raw.parse().ok()
    }
}

impl Form for SendTokenForm {
    type Field = SendField;
    type Constraints = SendConstraints;
    type Snapshot = SendSnapshot;

    const KIND: FormKind = FormKind::SendToken;
    const FAILURE_POLICY: FailurePolicy = FailurePolicy::ReturnToCompose;
    const FIELDS: &'static [SendField] = &[
        SendField::ToAddress,
        SendField::MtnAmount,
        SendField::GasPrice,
        SendField::GasLimit,
    ];
    const ESTIMATES: &'static [EstimateKind] = &[EstimateKind::GasLimit];

    fn value(&self, field: SendField) -> Option<&str> {
        match field {
            SendField::ToAddress => self.to_address.as_deref(),
            SendField::MtnAmount => self.mtn_amount.as_deref(),
            SendField::GasPrice => self.gas_price.as_deref(),
            SendField::GasLimit => self.gas_limit.as_deref(),
        }
    }

    fn set_value(&mut self, field: SendField, value: Option<String>, _constraints: &SendConstraints) {
        let slot = match field {
            SendField::ToAddress => &mut self.to_address,
            SendField::MtnAmount => &mut self.mtn_amount,
            SendField::GasPrice => &mut self.gas_price,
            SendField::GasLimit => &mut self.gas_limit,
        };
        *slot = value;
    }

    fn validate_field(&self, field: SendField, constraints: &SendConstraints) -> Option<String> {
        match field {
            SendField::ToAddress => validate_to_address(self.to_address.as_deref()),
            SendField::MtnAmount => validate_amount(
                self.mtn_amount.as_deref(),
                constraints.available_mtn,
                MET_DECIMALS,
            ),
            SendField::GasPrice => {
                validate_gas_price(self.gas_price.as_deref(), constraints.max_gas_price)
            }
            SendField::GasLimit => {
                validate_gas_limit(self.gas_limit.as_deref(), constraints.gas_limit)
            }
        }
    }

    fn watched_by(field: SendField) -> &'static [EstimateKind] {
        match field {
            SendField::ToAddress | SendField::MtnAmount => &[EstimateKind::GasLimit],
            SendField::GasPrice | SendField::GasLimit => &[],
        }
    }

    fn estimate_input(&self, kind: EstimateKind) -> Option<EstimateInput> {
        if kind != EstimateKind::GasLimit {
            return None;
        }
        let to = self.recipient()?;
        let value = to_base(present(&self.mtn_amount)?, MET_DECIMALS).ok()?;
        if value.is_zero() {
            return None;
        }
        Some(EstimateInput {
            operation: OP_TOKEN_GAS_LIMIT,
            payload: json!({
                "value": value.to_string(),
                "token": self.token.to_string(),
                "from": self.from.to_string(),
                "to": to.to_string(),
            }),
            result_field: "gasLimit",
        })
    }

    fn apply_estimate(&mut self, kind: EstimateKind, value: U256) -> Option<SendField> {
        match kind {
            EstimateKind::GasLimit if !self.use_custom_gas => {
                self.gas_limit = Some(value.to_string());
                Some(SendField::GasLimit)
            }
            EstimateKind::GasLimit | EstimateKind::ConversionReturn => None,
        }
    }

    fn max_amount(constraints: &SendConstraints) -> (SendField, String) {
        (
            SendField::MtnAmount,
            to_display(constraints.available_mtn, MET_DECIMALS),
        )
    }

    fn snapshot(&self, _constraints: &SendConstraints) -> Result<SendSnapshot, PortError> {
        let to = self
            .recipient()
            .ok_or_else(|| PortError::Validation("missing recipient".to_owned()))?;
        let amount = present(&self.mtn_amount)
            .ok_or_else(|| PortError::Validation("missing MET amount".to_owned()))?;
        let value = to_base(amount, MET_DECIMALS)
            .map_err(|e| PortError::Validation(format!("MET amount: {e}")))?;
        let (gas_price, gas_limit) = parse_gas(self.gas_price.as_deref(), self.gas_limit.as_deref())?;
        Ok(SendSnapshot {
            from: self.from,
            to,
            token: self.token,
            value,
            display_amount: to_display(value, MET_DECIMALS),
            gas_price,
            gas_limit,
        })
    }

    fn confirmation(snapshot: &SendSnapshot) -> ConfirmationView {
        ConfirmationView {
            title: "Sending MET...".to_owned(),
            summary: format!(
                "You will send {} MET to {}.",
                snapshot.display_amount, snapshot.to
            ),
            edit_label: "Edit this transaction".to_owned(),
        }
    }

    fn submission(snapshot: &SendSnapshot, password: &str) -> (&'static str, Value) {
        (
            OP_SEND_TOKEN,
            json!({
                "password": password,
                "value": snapshot.value.to_string(),
                "token": snapshot.token.to_string(),
                "from": snapshot.from.to_string(),
                "to": snapshot.to.to_string(),
                "gasPrice": snapshot.gas_price.to_string(),
                "gasLimit": snapshot.gas_limit.to_string(),
            }),
        )
    }
}
