use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{parse_gas, present, Form, GasDefaults};
use crate::domain::{ConfirmationView, EstimateInput, EstimateKind, FailurePolicy, FormKind};
use crate::ports::PortError;
use crate::units::{fiat_estimate, max_spendable, to_base, to_display, ETHER_DECIMALS, MET_DECIMALS};
use crate::validation::{validate_amount, validate_gas_limit, validate_gas_price, GasLimitBounds};

pub const OP_CONVERT_GAS_LIMIT: &str = "metronome-convert-eth-gas-limit";
pub const OP_CONVERT_ESTIMATE: &str = "metronome-convert-eth-estimate";
pub const OP_CONVERT: &str = "mtn-convert-eth";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConvertField {
    EthAmount,
    GasPrice,
    GasLimit,
}

#[derive(Debug, Clone)]
pub struct ConvertConstraints {
    pub available_eth: U256,
    /// Held back from the balance to cover the conversion fee.
    pub fee_reserve: U256,
    /// Fiat price of one ETH, for the informational estimate.
    pub eth_rate: f64,
    pub max_gas_price: U256,
    pub gas_limit: GasLimitBounds,
}

impl ConvertConstraints {
    pub fn max_amount(&self) -> U256 {
        max_spendable(self.available_eth, self.fee_reserve)
    }
}

/// ETH to MET conversion.
#[derive(Debug, Clone)]
pub struct ConvertForm {
    from: Address,
    eth_amount: Option<String>,
    usd_amount: Option<String>,
    gas_price: Option<String>,
    gas_limit: Option<String>,
    use_custom_gas: bool,
    estimate: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvertSnapshot {
    pub from: Address,
    pub value: U256,
    pub display_amount: String,
    pub usd_amount: Option<String>,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub estimate: Option<U256>,
}

impl ConvertForm {
    pub fn new(from: Address, defaults: &GasDefaults) -> Self {
        Self {
            from,
            eth_amount: None,
            usd_amount: None,
            gas_price: Some(defaults.gas_price_gwei.clone()),
            gas_limit: Some(defaults.gas_limit.to_string()),
            use_custom_gas: false,
            estimate: None,
        }
    }

    pub fn sender(&self) -> Address {
        self.from
    }

    pub fn usd_amount(&self) -> Option<&str> {
        self.usd_amount.as_deref()
    }

    pub fn estimate(&self) -> Option<U256> {
        self.estimate
    }

    pub fn use_custom_gas(&self) -> bool {
        self.use_custom_gas
    }

    /// With custom gas on, gas-limit estimates no longer overwrite the field.
    pub fn set_use_custom_gas(&mut self, enabled: bool) {
        self.use_custom_gas = enabled;
    }

    fn positive_wei(&self) -> Option<U256> {
        let wei = to_base(present(&self.eth_amount)?, ETHER_DECIMALS).ok()?;
        (!wei.is_zero()).then_some(wei)
    }
}

impl Form for ConvertForm {
    type Field = ConvertField;
    type Constraints = ConvertConstraints;
    type Snapshot = ConvertSnapshot;

    const KIND: FormKind = FormKind::ConvertEthToMet;
    const FAILURE_POLICY: FailurePolicy = FailurePolicy::ReturnToReview;
    const FIELDS: &'static [ConvertField] = &[
        ConvertField::EthAmount,
        ConvertField::GasPrice,
        ConvertField::GasLimit,
    ];
    const ESTIMATES: &'static [EstimateKind] =
        &[EstimateKind::GasLimit, EstimateKind::ConversionReturn];

    fn value(&self, field: ConvertField) -> Option<&str> {
        match field {
            ConvertField::EthAmount => self.eth_amount.as_deref(),
            ConvertField::GasPrice => self.gas_price.as_deref(),
            ConvertField::GasLimit => self.gas_limit.as_deref(),
        }
    }

    fn set_value(&mut self, field: ConvertField, value: Option<String>, constraints: &ConvertConstraints) {
        match field {
            ConvertField::EthAmount => {
                self.usd_amount = value
                    .as_deref()
                    .and_then(|v| fiat_estimate(v, constraints.eth_rate));
                self.eth_amount = value;
            }
            ConvertField::GasPrice => self.gas_price = value,
            ConvertField::GasLimit => self.gas_limit = value,
        }
    }

    fn validate_field(&self, field: ConvertField, constraints: &ConvertConstraints) -> Option<String> {
        match field {
            ConvertField::EthAmount => validate_amount(
                self.eth_amount.as_deref(),
                constraints.max_amount(),
                ETHER_DECIMALS,
            ),
            ConvertField::GasPrice => {
                validate_gas_price(self.gas_price.as_deref(), constraints.max_gas_price)
            }
            ConvertField::GasLimit => {
                validate_gas_limit(self.gas_limit.as_deref(), constraints.gas_limit)
            }
        }
    }

    fn watched_by(field: ConvertField) -> &'static [EstimateKind] {
        match field {
            ConvertField::EthAmount => &[EstimateKind::GasLimit, EstimateKind::ConversionReturn],
            ConvertField::GasPrice | ConvertField::GasLimit => &[],
        }
    }

    fn estimate_input(&self, kind: EstimateKind) -> Option<EstimateInput> {
        let wei = self.positive_wei()?;
        Some(match kind {
            EstimateKind::GasLimit => EstimateInput {
                operation: OP_CONVERT_GAS_LIMIT,
                payload: json!({
                    "value": wei.to_string(),
                    "from": self.from.to_string(),
                }),
                result_field: "gasLimit",
            },
            EstimateKind::ConversionReturn => EstimateInput {
                operation: OP_CONVERT_ESTIMATE,
                payload: json!({ "value": wei.to_string() }),
                result_field: "result",
            },
        })
    }

    fn apply_estimate(&mut self, kind: EstimateKind, value: U256) -> Option<ConvertField> {
        match kind {
            EstimateKind::GasLimit if !self.use_custom_gas => {
                self.gas_limit = Some(value.to_string());
                Some(ConvertField::GasLimit)
            }
            EstimateKind::GasLimit => None,
            EstimateKind::ConversionReturn => {
                self.estimate = Some(value);
                None
            }
        }
    }

    fn max_amount(constraints: &ConvertConstraints) -> (ConvertField, String) {
        (
            ConvertField::EthAmount,
            to_display(constraints.max_amount(), ETHER_DECIMALS),
        )
    }

    fn snapshot(&self, constraints: &ConvertConstraints) -> Result<ConvertSnapshot, PortError> {
        let amount = present(&self.eth_amount)
            .ok_or_else(|| PortError::Validation("missing ETH amount".to_owned()))?;
        let value = to_base(amount, ETHER_DECIMALS)
            .map_err(|e| PortError::Validation(format!("ETH amount: {e}")))?;
        let (gas_price, gas_limit) = parse_gas(self.gas_price.as_deref(), self.gas_limit.as_deref())?;
        let display_amount = to_display(value, ETHER_DECIMALS);
        Ok(ConvertSnapshot {
            from: self.from,
            usd_amount: fiat_estimate(&display_amount, constraints.eth_rate),
            display_amount,
            value,
            gas_price,
            gas_limit,
            estimate: self.estimate,
        })
    }

    fn confirmation(snapshot: &ConvertSnapshot) -> ConfirmationView {
        let usd = snapshot
            .usd_amount
            .as_deref()
            .map(|usd| format!(" (${usd})"))
            .unwrap_or_default();
        let summary = match snapshot.estimate {
            Some(met) => format!(
                "You will convert {} ETH{usd} and get approximately {} MET.",
                snapshot.display_amount,
                to_display(met, MET_DECIMALS)
            ),
            None => format!(
                "You will convert {} ETH{usd}. The MET return could not be estimated.",
                snapshot.display_amount
            ),
        };
        ConfirmationView {
            title: "Converting ETH...".to_owned(),
            summary,
            edit_label: "Edit this conversion".to_owned(),
        }
    }

    fn submission(snapshot: &ConvertSnapshot, password: &str) -> (&'static str, Value) {
        (
            OP_CONVERT,
            json!({
                "gasPrice": snapshot.gas_price.to_string(),
                "gasLimit": snapshot.gas_limit.to_string(),
                "password": password,
                "value": snapshot.value.to_string(),
                "from": snapshot.from.to_string(),
            }),
        )
    }
}
