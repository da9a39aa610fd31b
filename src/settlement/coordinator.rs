//! Settlement Coordinator
//!
//! Drives a single transfer from `Created` to a terminal status.
//!
//! ```text
//! CREATED → PROCESSING → COMPLETED
//!               ↓
//!           CANCELLED
//! ```
//!
//! Order of writes for an accepted transfer:
//! 1. `Created → Processing` (CAS, the claim; nothing else happens if lost)
//! 2. sender debit (balance CAS, re-validated on conflict)
//! 3. `Processing → Completed`
//! 4. recipient credit (balance CAS, retried on conflict)
//!
//! A crash after step 1 leaves the transfer visible in `Processing` for the
//! stuck-transfer monitor. A crash between 3 and 4 leaves `Completed` with the
//! credit outstanding; reconciliation is external.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use rust_decimal::Decimal;

use super::algorithm::{self, SettledBalances};
use super::error::SettlementError;
use super::gateway::{AccountStore, TransferStore};
use super::state::TransferStatus;
use super::types::{
    Account, AccountNumber, BalanceWrite, CancelReason, SettlementOutcome, Transfer, TransferId,
};
use crate::config::SettlementConfig;
use crate::intake::event::TransferCreatedEvent;

/// Settlement Coordinator - owns the two gateways, no global state
pub struct SettlementCoordinator {
    transfers: Arc<dyn TransferStore>,
    accounts: Arc<dyn AccountStore>,
    config: SettlementConfig,
}

impl SettlementCoordinator {
    pub fn new(
        transfers: Arc<dyn TransferStore>,
        accounts: Arc<dyn AccountStore>,
        config: SettlementConfig,
    ) -> Self {
        Self {
            transfers,
            accounts,
            config,
        }
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// Settle the transfer announced by `event`.
    ///
    /// The stored record is authoritative; a disagreeing event is only logged.
    pub async fn settle_event(
        &self,
        event: &TransferCreatedEvent,
    ) -> Result<SettlementOutcome, SettlementError> {
        self.settle(event.id, Some(event)).await
    }

    /// Settle a transfer by id.
    ///
    /// Safe to call any number of times: a terminal transfer is left alone
    /// and only the caller that wins the `Created → Processing` claim ever
    /// touches balances.
    pub async fn settle_transfer(
        &self,
        id: TransferId,
    ) -> Result<SettlementOutcome, SettlementError> {
        self.settle(id, None).await
    }

    async fn settle(
        &self,
        id: TransferId,
        event: Option<&TransferCreatedEvent>,
    ) -> Result<SettlementOutcome, SettlementError> {
        let transfer = self
            .transfers
            .get_by_id(id)
            .await?
            .ok_or(SettlementError::TransferNotFound(id))?;

        if let Some(event) = event
            && !event.matches(&transfer)
        {
            warn!(
                transfer_id = %id,
                event_sender = %event.sender,
                event_recipient = %event.recipient,
                event_amount = %event.amount,
                sender = %transfer.sender,
                recipient = %transfer.recipient,
                amount = %transfer.amount,
                "Event disagrees with stored transfer - using stored record"
            );
        }

        match transfer.status {
            s if s.is_terminal() => {
                debug!(transfer_id = %id, status = %s, "Transfer already terminal");
                return Ok(SettlementOutcome::AlreadyTerminal(s));
            }
            TransferStatus::Processing => {
                debug!(transfer_id = %id, "Transfer already being processed");
                return Ok(SettlementOutcome::InProgress);
            }
            _ => {}
        }

        // Persist Processing BEFORE touching any balance
        if !self
            .transfers
            .set_status(id, TransferStatus::Created, TransferStatus::Processing)
            .await?
        {
            return self.lost_claim(id).await;
        }
        debug!(transfer_id = %id, "Transfer claimed");

        if transfer.sender == transfer.recipient {
            return self.cancel(&transfer, CancelReason::SameAccount).await;
        }

        let sender = match self.resolve(&transfer, transfer.sender).await? {
            Ok(account) => account,
            Err(outcome) => return Ok(outcome),
        };
        let recipient = match self.resolve(&transfer, transfer.recipient).await? {
            Ok(account) => account,
            Err(outcome) => return Ok(outcome),
        };

        let settled = match self.debit_sender(&transfer, sender, &recipient).await? {
            Ok(settled) => settled,
            Err(outcome) => return Ok(outcome),
        };

        let status_written = self
            .transfers
            .set_status(id, TransferStatus::Processing, TransferStatus::Completed)
            .await?;
        if !status_written {
            // Sender is already debited; the credit must still land
            error!(
                transfer_id = %id,
                "Status moved away from PROCESSING after sender debit"
            );
        }

        let recipient_balance = self.credit_recipient(&transfer, recipient).await?;

        if !status_written {
            return Err(SettlementError::InvalidStateTransition {
                from: TransferStatus::Processing,
                to: TransferStatus::Completed,
            });
        }

        info!(
            transfer_id = %id,
            sender = %transfer.sender,
            recipient = %transfer.recipient,
            amount = %transfer.amount,
            "Transfer completed"
        );

        Ok(SettlementOutcome::Completed {
            sender_balance: settled.sender,
            recipient_balance,
        })
    }

    /// Resolve an active participant.
    ///
    /// `Ok(Err(outcome))` means the transfer was cancelled because the account
    /// is missing (only with `cancel_on_missing_account`).
    async fn resolve(
        &self,
        transfer: &Transfer,
        number: AccountNumber,
    ) -> Result<Result<Account, SettlementOutcome>, SettlementError> {
        if let Some(account) = self.accounts.get_active_account(number).await? {
            return Ok(Ok(account));
        }

        if self.config.cancel_on_missing_account {
            return self
                .cancel(transfer, CancelReason::AccountNotFound(number))
                .await
                .map(Err);
        }

        warn!(
            transfer_id = %transfer.id,
            account = %number,
            "Account missing or deleted - transfer left in PROCESSING"
        );
        Err(SettlementError::AccountNotFound(number))
    }

    /// Validate and apply the sender debit.
    ///
    /// On a balance conflict the sender is re-read and the whole check is
    /// repeated, so a concurrent debit that drained the account turns this
    /// transfer into a cancellation instead of a negative balance.
    async fn debit_sender(
        &self,
        transfer: &Transfer,
        mut sender: Account,
        recipient: &Account,
    ) -> Result<Result<SettledBalances, SettlementOutcome>, SettlementError> {
        let mut conflicts = 0;

        loop {
            let result = algorithm::settle(sender.balance, recipient.balance, transfer.amount);
            let settled = match result {
                Ok(settled) => settled,
                Err(e) => {
                    let Some(reason) = e.cancel_reason() else {
                        return Err(e);
                    };
                    debug!(transfer_id = %transfer.id, error = %e, "Settlement rejected");
                    return self.cancel(transfer, reason).await.map(Err);
                }
            };

            match self
                .accounts
                .set_balance(sender.number, sender.balance, settled.sender)
                .await?
            {
                BalanceWrite::Applied => return Ok(Ok(settled)),
                BalanceWrite::Conflict => {
                    conflicts += 1;
                    if conflicts > self.config.max_balance_retries {
                        error!(
                            transfer_id = %transfer.id,
                            account = %sender.number,
                            conflicts = conflicts,
                            "Sender balance contention - transfer left in PROCESSING"
                        );
                        return Err(SettlementError::Contention(sender.number));
                    }
                    debug!(
                        transfer_id = %transfer.id,
                        account = %sender.number,
                        "Sender balance changed concurrently, re-validating"
                    );
                    sender = match self.resolve(transfer, transfer.sender).await? {
                        Ok(account) => account,
                        Err(outcome) => return Ok(Err(outcome)),
                    };
                }
            }
        }
    }

    /// Apply the recipient credit, re-reading on conflict. Returns the new balance.
    async fn credit_recipient(
        &self,
        transfer: &Transfer,
        mut recipient: Account,
    ) -> Result<Decimal, SettlementError> {
        let mut conflicts = 0;

        loop {
            let new_balance = recipient
                .balance
                .checked_add(transfer.amount)
                .ok_or(SettlementError::Overflow)?;

            match self
                .accounts
                .set_balance(recipient.number, recipient.balance, new_balance)
                .await?
            {
                BalanceWrite::Applied => return Ok(new_balance),
                BalanceWrite::Conflict => {
                    conflicts += 1;
                    if conflicts > self.config.max_balance_retries {
                        error!(
                            transfer_id = %transfer.id,
                            account = %recipient.number,
                            "Recipient credit not applied after debit - needs reconciliation"
                        );
                        return Err(SettlementError::Contention(recipient.number));
                    }
                    recipient = match self.accounts.get_active_account(transfer.recipient).await? {
                        Some(account) => account,
                        None => {
                            error!(
                                transfer_id = %transfer.id,
                                account = %transfer.recipient,
                                "Recipient deleted after sender debit - needs reconciliation"
                            );
                            return Err(SettlementError::AccountNotFound(transfer.recipient));
                        }
                    };
                }
            }
        }
    }

    async fn cancel(
        &self,
        transfer: &Transfer,
        reason: CancelReason,
    ) -> Result<SettlementOutcome, SettlementError> {
        if self
            .transfers
            .set_status(transfer.id, TransferStatus::Processing, TransferStatus::Cancelled)
            .await?
        {
            info!(transfer_id = %transfer.id, reason = %reason, "Transfer cancelled");
            Ok(SettlementOutcome::Cancelled(reason))
        } else {
            self.lost_claim(transfer.id).await
        }
    }

    /// The stored status was not what this attempt expected
    async fn lost_claim(&self, id: TransferId) -> Result<SettlementOutcome, SettlementError> {
        match self.transfers.get_by_id(id).await? {
            Some(current) if current.status.is_terminal() => {
                Ok(SettlementOutcome::AlreadyTerminal(current.status))
            }
            Some(_) => Ok(SettlementOutcome::InProgress),
            None => {
                error!(transfer_id = %id, "Transfer not found after CAS failure");
                Err(SettlementError::TransferNotFound(id))
            }
        }
    }

    /// Current status of a transfer
    pub async fn get_status(
        &self,
        id: TransferId,
    ) -> Result<Option<TransferStatus>, SettlementError> {
        Ok(self.transfers.get_by_id(id).await?.map(|t| t.status))
    }
}
