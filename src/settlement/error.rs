//! Settlement Error Types

use rust_decimal::Decimal;
use thiserror::Error;

use super::state::TransferStatus;
use super::types::{AccountNumber, CancelReason, TransferId};

/// Settlement error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettlementError {
    // === Lookup Errors ===
    #[error("Transfer not found: {0}")]
    TransferNotFound(TransferId),

    #[error("Account not found or deleted: {0}")]
    AccountNotFound(AccountNumber),

    // === Business Rejections ===
    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Sender and recipient account cannot be the same")]
    SameAccount,

    #[error("Amount would cause overflow")]
    Overflow,

    // === Input Errors ===
    #[error("Malformed transfer event: {0}")]
    MalformedEvent(String),

    // === State Errors ===
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        from: TransferStatus,
        to: TransferStatus,
    },

    #[error("Balance of account {0} kept changing during settlement")]
    Contention(AccountNumber),

    // === System Errors ===
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl SettlementError {
    /// Stable error code for logs
    pub fn code(&self) -> &'static str {
        match self {
            SettlementError::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            SettlementError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            SettlementError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            SettlementError::InvalidAmount => "INVALID_AMOUNT",
            SettlementError::SameAccount => "SAME_ACCOUNT",
            SettlementError::Overflow => "OVERFLOW",
            SettlementError::MalformedEvent(_) => "MALFORMED_EVENT",
            SettlementError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            SettlementError::Contention(_) => "CONTENTION",
            SettlementError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            SettlementError::CorruptRecord(_) => "CORRUPT_RECORD",
        }
    }

    /// Business rejections end the transfer as `Cancelled`; they are not defects
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            SettlementError::InsufficientFunds { .. } => Some(CancelReason::InsufficientFunds),
            SettlementError::InvalidAmount => Some(CancelReason::InvalidAmount),
            SettlementError::SameAccount => Some(CancelReason::SameAccount),
            _ => None,
        }
    }

    /// Whether redelivering the same event may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, SettlementError::StoreUnavailable(_))
    }
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self {
        SettlementError::StoreUnavailable(e.to_string())
    }
}
