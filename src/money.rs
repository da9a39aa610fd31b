//! Money Conversion Module
//!
//! Parsing of client-supplied amount strings into exact ledger amounts.
//! Balances and amounts are `rust_decimal::Decimal` rescaled to the ledger's
//! minor unit; binary floating point never touches money.
//!
//! ## Accepted format
//! Plain base-10 digits with an optional single `.` and at most `decimals`
//! fractional digits. No sign, exponent, grouping separators or whitespace
//! inside the number; `.5` and `5.` are rejected as ambiguous.

use rust_decimal::Decimal;
use thiserror::Error;

/// Money conversion errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Parse a client amount string into a positive ledger amount with scale
/// `decimals`.
///
/// ```rust
/// use transfer_settlement::money::parse_amount;
///
/// let amount = parse_amount("30.5", 2).unwrap();
/// assert_eq!(amount.to_string(), "30.50");
/// ```
pub fn parse_amount(amount_str: &str, decimals: u32) -> Result<Decimal, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    if amount_str.starts_with('-') || amount_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    let parts: Vec<&str> = amount_str.split('.').collect();
    let (whole, frac) = match parts.len() {
        1 => (parts[0], ""),
        2 => {
            if parts[0].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing leading zero (e.g., use 0.5 instead of .5)".into(),
                ));
            }
            if parts[1].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
                ));
            }
            if decimals == 0 {
                return Err(MoneyError::InvalidFormat(
                    "decimals is 0, but dot provided".into(),
                ));
            }
            (parts[0], parts[1])
        }
        _ => return Err(MoneyError::InvalidFormat("multiple decimal points".into())),
    };

    if !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in whole part: {}",
            whole
        )));
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in fractional part: {}",
            frac
        )));
    }

    // Reject instead of silently truncating
    if frac.len() > decimals as usize {
        return Err(MoneyError::PrecisionOverflow {
            provided: frac.len() as u32,
            max: decimals,
        });
    }

    let mut amount = Decimal::from_str_exact(amount_str).map_err(|_| MoneyError::Overflow)?;
    if amount.is_zero() {
        return Err(MoneyError::InvalidAmount);
    }

    amount.rescale(decimals);
    if amount.scale() != decimals {
        // rescale saturates when the mantissa cannot hold the extra digits
        return Err(MoneyError::Overflow);
    }

    Ok(amount)
}
