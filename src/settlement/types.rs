//! Settlement Core Types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::state::TransferStatus;

/// Transfer identifier, assigned by the upstream producer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferId(Uuid);

impl TransferId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID value
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TransferId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransferId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Externally visible account number (dense, positive)
///
/// Distinct from the account's internal UUID. Transfers reference
/// accounts only through this number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountNumber(i64);

impl AccountNumber {
    /// Returns `None` for zero or negative numbers
    pub fn new(value: i64) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    #[inline]
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account snapshot as seen by the settlement path
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub number: AccountNumber,
    pub owner_id: String,
    pub balance: Decimal,
    /// Soft-delete flag owned by the account service
    pub is_deleted: bool,
    pub opened_at: DateTime<Utc>,
}

/// Transfer record
///
/// Everything except `status` is immutable once the producer wrote it.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub id: TransferId,
    pub sender: AccountNumber,
    pub recipient: AccountNumber,
    pub amount: Decimal,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    /// Build a freshly created transfer (status `Created`)
    pub fn new(
        id: TransferId,
        sender: AccountNumber,
        recipient: AccountNumber,
        amount: Decimal,
    ) -> Self {
        Self {
            id,
            sender,
            recipient,
            amount,
            status: TransferStatus::Created,
            created_at: Utc::now(),
        }
    }
}

/// Result of a compare-and-set balance write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceWrite {
    /// Stored balance matched the expected value and was replaced
    Applied,
    /// Stored balance changed (or the account was deleted) since it was read
    Conflict,
}

impl BalanceWrite {
    #[inline]
    pub fn is_applied(&self) -> bool {
        matches!(self, BalanceWrite::Applied)
    }
}

/// Why a transfer ended in `Cancelled`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    InsufficientFunds,
    InvalidAmount,
    SameAccount,
    AccountNotFound(AccountNumber),
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelReason::InsufficientFunds => "INSUFFICIENT_FUNDS",
            CancelReason::InvalidAmount => "INVALID_AMOUNT",
            CancelReason::SameAccount => "SAME_ACCOUNT",
            CancelReason::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one settlement attempt that did not hit a system error
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    /// Both balances applied, status `Completed`
    Completed {
        sender_balance: Decimal,
        recipient_balance: Decimal,
    },
    /// Business rejection, status `Cancelled`, no balance changed
    Cancelled(CancelReason),
    /// Transfer was already terminal; nothing was written
    AlreadyTerminal(TransferStatus),
    /// Another attempt owns the transfer (it is `Processing`); nothing was written
    InProgress,
}
