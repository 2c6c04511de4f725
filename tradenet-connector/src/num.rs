//! Chain amount handling. Balances and transfer amounts travel as base-10
//! strings of up to 256 bits, so everything is parsed into a [`U256`].

use alloy_primitives::U256;
use thiserror::Error;

/// A chain amount or balance.
pub type Amount = U256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed amount {value:?}: {reason}")]
pub struct ParseAmountError {
    pub value: String,
    pub reason: String,
}

/// Parses a base-10 amount as received from the data node.
pub fn parse_amount(value: &str) -> Result<Amount, ParseAmountError> {
    U256::from_str_radix(value.trim(), 10).map_err(|err| ParseAmountError {
        value: value.to_string(),
        reason: err.to_string(),
    })
}

/// `10^exp`, saturating at `U256::MAX`.
pub fn pow10(exp: u64) -> Amount {
    Amount::from(10u64)
        .checked_pow(Amount::from(exp))
        .unwrap_or(Amount::MAX)
}
