//! Field validation rules.
//!
//! Every rule is a pure function of the field value and explicit constraints
//! and returns the message to show next to the field, or `None` when valid.

use alloy::primitives::{Address, U256};
use bip39::{Language, Mnemonic};

use crate::units::{to_base, UnitError, GWEI_DECIMALS};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const TARGET_PASSWORD_ENTROPY_BITS: f64 = 72.0;
pub const RECOVERY_PHRASE_WORDS: usize = 12;

pub const MSG_PHRASE_WORD_COUNT: &str = "A recovery phrase must have exactly 12 words";
pub const MSG_PHRASE_MISMATCH: &str = "The text provided does not match your recovery passphrase.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasLimitBounds {
    pub min: u64,
    pub max: u64,
}

impl Default for GasLimitBounds {
    fn default() -> Self {
        Self {
            min: 21_000,
            max: 8_000_000,
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// `max` and the parsed amount are compared in base units.
pub fn validate_amount(value: Option<&str>, max: U256, decimals: u8) -> Option<String> {
    let Some(value) = present(value) else {
        return Some("Amount is required".to_owned());
    };
    let message = match to_base(value, decimals) {
        Ok(amount) if amount.is_zero() => "Amount must be greater than 0",
        Ok(amount) if amount > max => "Insufficient funds",
        Ok(_) => return None,
        Err(UnitError::Negative) => "Amount must be greater than 0",
        Err(UnitError::TooPrecise(_)) => "Amount has too many decimal places",
        Err(UnitError::Empty | UnitError::InvalidNumber(_) | UnitError::Overflow) => {
            "Invalid amount"
        }
    };
    Some(message.to_owned())
}

/// Gas price is entered in gwei; `max_wei` is the configured ceiling.
pub fn validate_gas_price(value: Option<&str>, max_wei: U256) -> Option<String> {
    let Some(value) = present(value) else {
        return Some("Gas price is required".to_owned());
    };
    let message = match to_base(value, GWEI_DECIMALS) {
        Ok(price) if price.is_zero() => "Gas price must be greater than 0",
        Ok(price) if price > max_wei => "Gas price is too high",
        Ok(_) => return None,
        Err(UnitError::Negative) => "Gas price must be greater than 0",
        Err(_) => "Invalid gas price",
    };
    Some(message.to_owned())
}

pub fn validate_gas_limit(value: Option<&str>, bounds: GasLimitBounds) -> Option<String> {
    let Some(value) = present(value) else {
        return Some("Gas limit is required".to_owned());
    };
    match value.parse::<u64>() {
        Err(_) => Some("Invalid gas limit".to_owned()),
        Ok(limit) if limit < bounds.min => {
            Some(format!("Gas limit must be at least {}", bounds.min))
        }
        Ok(limit) if limit > bounds.max => {
            Some(format!("Gas limit must not exceed {}", bounds.max))
        }
        Ok(_) => None,
    }
}

pub fn validate_to_address(value: Option<&str>) -> Option<String> {
    let Some(value) = present(value) else {
        return Some("Address is required".to_owned());
    };
    if !value.starts_with("0x") || value.parse::<Address>().is_err() {
        return Some("Invalid address".to_owned());
    }
    None
}

pub fn validate_password(value: Option<&str>) -> Option<String> {
    match value {
        Some(v) if !v.is_empty() => None,
        _ => Some("Password is required".to_owned()),
    }
}

pub fn validate_password_creation(value: Option<&str>) -> Option<String> {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return Some("Password is required".to_owned());
    };
    if value.chars().count() < MIN_PASSWORD_LENGTH {
        return Some("Password is too short".to_owned());
    }
    if password_entropy_bits(value) < TARGET_PASSWORD_ENTROPY_BITS {
        return Some("Password is not strong enough".to_owned());
    }
    None
}

pub fn validate_password_repeat(password: Option<&str>, again: Option<&str>) -> Option<String> {
    match again.filter(|v| !v.is_empty()) {
        None => Some("Repeat the password".to_owned()),
        Some(again) if Some(again) != password => Some("Passwords don't match".to_owned()),
        Some(_) => None,
    }
}

/// Character-pool estimate: `length * log2(pool)`.
pub fn password_entropy_bits(password: &str) -> f64 {
    let (mut lower, mut upper, mut digit, mut symbol, mut other) = (false, false, false, false, false);
    for c in password.chars() {
        match c {
            'a'..='z' => lower = true,
            'A'..='Z' => upper = true,
            '0'..='9' => digit = true,
            c if c.is_ascii() => symbol = true,
            _ => other = true,
        }
    }
    let pool = [(lower, 26), (upper, 26), (digit, 10), (symbol, 33), (other, 100)]
        .iter()
        .filter(|(used, _)| *used)
        .map(|(_, size)| *size as f64)
        .sum::<f64>();
    if pool == 0.0 {
        return 0.0;
    }
    password.chars().count() as f64 * pool.log2()
}

/// Trims, collapses inner whitespace and lower-cases a typed phrase.
pub fn sanitize_mnemonic(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn phrase_word_count(phrase: &str) -> usize {
    phrase.split_whitespace().count()
}

/// Expects an already sanitized phrase.
pub fn validate_mnemonic(phrase: &str) -> Option<String> {
    if phrase_word_count(phrase) != RECOVERY_PHRASE_WORDS {
        return Some(MSG_PHRASE_WORD_COUNT.to_owned());
    }
    if Mnemonic::from_phrase(phrase, Language::English).is_err() {
        return Some("Invalid recovery phrase".to_owned());
    }
    None
}
