//! Conversions between base-unit integers, display decimals and fiat estimates.
//!
//! Parsing is exact: an amount with more fractional digits than the base unit
//! can represent is rejected instead of being truncated.

use alloy::primitives::U256;
use thiserror::Error;

pub const ETHER_DECIMALS: u8 = 18;
pub const MET_DECIMALS: u8 = 18;
pub const GWEI_DECIMALS: u8 = 9;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("amount is empty")]
    Empty,
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("amount is negative")]
    Negative,
    #[error("amount has more than {0} decimal places")]
    TooPrecise(u8),
    #[error("amount does not fit in 256 bits")]
    Overflow,
}

/// Trims the input and accepts a comma as the decimal separator.
pub fn normalize_decimal(input: &str) -> String {
    input.trim().replace(',', ".")
}

pub fn ten_pow(decimals: u8) -> U256 {
    U256::from(10u64).pow(U256::from(decimals))
}

pub fn to_base(display: &str, decimals: u8) -> Result<U256, UnitError> {
    let normalized = normalize_decimal(display);
    if normalized.is_empty() {
        return Err(UnitError::Empty);
    }
    if normalized.starts_with('-') {
        return Err(UnitError::Negative);
    }
    let unsigned = normalized.strip_prefix('+').unwrap_or(&normalized);
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !is_digits(int_part) || !is_digits(frac_part)
    {
        return Err(UnitError::InvalidNumber(display.to_owned()));
    }

    let frac_significant = frac_part.trim_end_matches('0');
    if frac_significant.len() > decimals as usize {
        return Err(UnitError::TooPrecise(decimals));
    }

    let int_value = parse_digits(int_part)?;
    let frac_value = parse_digits(&format!(
        "{frac_significant:0<width$}",
        width = decimals as usize
    ))?;
    int_value
        .checked_mul(ten_pow(decimals))
        .and_then(|v| v.checked_add(frac_value))
        .ok_or(UnitError::Overflow)
}

fn parse_digits(digits: &str) -> Result<U256, UnitError> {
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 10).map_err(|_| UnitError::Overflow)
}

pub fn to_display(base: U256, decimals: u8) -> String {
    let scale = ten_pow(decimals);
    let int_part = base / scale;
    let frac_part = base % scale;
    if frac_part.is_zero() {
        return int_part.to_string();
    }
    let frac = format!("{:0>width$}", frac_part.to_string(), width = decimals as usize);
    format!("{int_part}.{}", frac.trim_end_matches('0'))
}

/// `display * rate`, rounded to cents. Informational only; never parsed back
/// into a transaction amount.
pub fn fiat_estimate(display: &str, rate: f64) -> Option<String> {
    let amount: f64 = normalize_decimal(display).parse().ok()?;
    let value = amount * rate;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(format!("{value:.2}"))
}

pub fn max_spendable(balance: U256, reserve: U256) -> U256 {
    balance.saturating_sub(reserve)
}
