//! In-process gateways
//!
//! `DashMap` arenas keyed by account number / transfer id. Every mutation
//! happens while holding the entry's shard lock, so a compare-and-set on one
//! key is atomic with respect to every other caller.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::error::SettlementError;
use super::gateway::{AccountStore, TransferStore, check_transition};
use super::state::TransferStatus;
use super::types::{Account, AccountNumber, BalanceWrite, Transfer, TransferId};

/// Account arena indexed by account number
#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: DashMap<AccountNumber, Account>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account
    pub fn insert(&self, account: Account) {
        self.accounts.insert(account.number, account);
    }

    /// Open an active account with the given balance
    pub fn open(&self, number: AccountNumber, balance: Decimal) -> Account {
        let account = Account {
            id: Uuid::new_v4(),
            number,
            owner_id: Uuid::new_v4().to_string(),
            balance,
            is_deleted: false,
            opened_at: Utc::now(),
        };
        self.insert(account.clone());
        account
    }

    /// Soft-delete an account. Returns false if it does not exist.
    pub fn mark_deleted(&self, number: AccountNumber) -> bool {
        match self.accounts.get_mut(&number) {
            Some(mut account) => {
                account.is_deleted = true;
                true
            }
            None => false,
        }
    }

    /// Current balance regardless of the deleted flag
    pub fn balance(&self, number: AccountNumber) -> Option<Decimal> {
        self.accounts.get(&number).map(|a| a.balance)
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_active_account(
        &self,
        number: AccountNumber,
    ) -> Result<Option<Account>, SettlementError> {
        Ok(self
            .accounts
            .get(&number)
            .filter(|a| !a.is_deleted)
            .map(|a| a.clone()))
    }

    async fn set_balance(
        &self,
        number: AccountNumber,
        expected: Decimal,
        new_balance: Decimal,
    ) -> Result<BalanceWrite, SettlementError> {
        match self.accounts.get_mut(&number) {
            Some(mut account) if !account.is_deleted && account.balance == expected => {
                account.balance = new_balance;
                Ok(BalanceWrite::Applied)
            }
            _ => Ok(BalanceWrite::Conflict),
        }
    }
}

/// Transfer records indexed by id
#[derive(Default)]
pub struct InMemoryTransferStore {
    transfers: DashMap<TransferId, Transfer>,
}

impl InMemoryTransferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transfer as the upstream producer would
    pub fn insert(&self, transfer: Transfer) {
        self.transfers.insert(transfer.id, transfer);
    }

    pub fn status(&self, id: TransferId) -> Option<TransferStatus> {
        self.transfers.get(&id).map(|t| t.status)
    }
}

#[async_trait]
impl TransferStore for InMemoryTransferStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_by_id(&self, id: TransferId) -> Result<Option<Transfer>, SettlementError> {
        Ok(self.transfers.get(&id).map(|t| t.clone()))
    }

    async fn set_status(
        &self,
        id: TransferId,
        expected: TransferStatus,
        new_status: TransferStatus,
    ) -> Result<bool, SettlementError> {
        check_transition(expected, new_status)?;

        match self.transfers.get_mut(&id) {
            Some(mut transfer) if transfer.status == expected => {
                transfer.status = new_status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_stuck(
        &self,
        older_than: Duration,
        limit: usize,
    ) -> Result<Vec<Transfer>, SettlementError> {
        let threshold = chrono::Duration::from_std(older_than)
            .map_err(|e| SettlementError::CorruptRecord(format!("threshold: {}", e)))?;
        let cutoff = Utc::now() - threshold;

        let mut stuck: Vec<Transfer> = self
            .transfers
            .iter()
            .filter(|t| t.status == TransferStatus::Processing && t.created_at < cutoff)
            .map(|t| t.clone())
            .collect();
        stuck.sort_by_key(|t| t.created_at);
        stuck.truncate(limit);
        Ok(stuck)
    }
}
