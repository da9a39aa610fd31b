//! Storage Gateways
//!
//! Narrow read/write interfaces the coordinator uses to reach persistent
//! storage. Implementations: [`super::db`] (PostgreSQL) and
//! [`super::memory`] (in-process).

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::error::SettlementError;
use super::state::TransferStatus;
use super::types::{Account, AccountNumber, BalanceWrite, Transfer, TransferId};

/// Account balance gateway
///
/// `set_balance` MUST be linearizable per account number: two concurrent
/// calls with the same `expected` value can never both return `Applied`.
/// This is what keeps balances non-negative under concurrent settlement.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Get adapter name for logging
    fn name(&self) -> &'static str;

    /// Look up a not-deleted account by its number
    async fn get_active_account(
        &self,
        number: AccountNumber,
    ) -> Result<Option<Account>, SettlementError>;

    /// Replace the balance iff it still equals `expected` and the account is
    /// not deleted.
    async fn set_balance(
        &self,
        number: AccountNumber,
        expected: Decimal,
        new_balance: Decimal,
    ) -> Result<BalanceWrite, SettlementError>;
}

/// Transfer record gateway
#[async_trait]
pub trait TransferStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_by_id(&self, id: TransferId) -> Result<Option<Transfer>, SettlementError>;

    /// Atomic CAS: update status only if the stored status equals `expected`.
    ///
    /// Returns `false` when the stored status differs (another worker moved
    /// it). Implementations reject edges that
    /// [`TransferStatus::can_transition_to`] forbids.
    async fn set_status(
        &self,
        id: TransferId,
        expected: TransferStatus,
        new_status: TransferStatus,
    ) -> Result<bool, SettlementError>;

    /// Transfers left in `Processing` for longer than `older_than`
    async fn find_stuck(
        &self,
        older_than: Duration,
        limit: usize,
    ) -> Result<Vec<Transfer>, SettlementError>;
}

/// Reject illegal status edges before they reach storage
pub(crate) fn check_transition(
    expected: TransferStatus,
    new_status: TransferStatus,
) -> Result<(), SettlementError> {
    if expected.can_transition_to(new_status) {
        Ok(())
    } else {
        Err(SettlementError::InvalidStateTransition {
            from: expected,
            to: new_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_transition() {
        assert!(check_transition(TransferStatus::Created, TransferStatus::Processing).is_ok());
        assert_eq!(
            check_transition(TransferStatus::Completed, TransferStatus::Cancelled),
            Err(SettlementError::InvalidStateTransition {
                from: TransferStatus::Completed,
                to: TransferStatus::Cancelled,
            })
        );
    }
}
