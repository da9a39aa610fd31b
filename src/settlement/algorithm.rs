//! Settlement arithmetic
//!
//! Pure balance computation for a single transfer. No I/O; the coordinator
//! feeds it snapshots read through the gateways and writes the result back.

use rust_decimal::Decimal;

use super::error::SettlementError;

/// Post-settlement balances of both participants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettledBalances {
    pub sender: Decimal,
    pub recipient: Decimal,
}

/// Move `amount` from sender to recipient.
///
/// Rejects a non-positive amount, a debit that would take the sender below
/// zero, and any arithmetic overflow. Amounts are already in ledger units,
/// so no rounding happens here.
pub fn settle(
    sender_balance: Decimal,
    recipient_balance: Decimal,
    amount: Decimal,
) -> Result<SettledBalances, SettlementError> {
    if amount <= Decimal::ZERO {
        return Err(SettlementError::InvalidAmount);
    }

    let sender = sender_balance
        .checked_sub(amount)
        .ok_or(SettlementError::Overflow)?;
    if sender < Decimal::ZERO {
        return Err(SettlementError::InsufficientFunds {
            available: sender_balance,
            requested: amount,
        });
    }

    let recipient = recipient_balance
        .checked_add(amount)
        .ok_or(SettlementError::Overflow)?;

    Ok(SettledBalances { sender, recipient })
}
