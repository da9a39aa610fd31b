//! Transfer Settlement
//!
//! Moves money between two accounts for a transfer that already exists in
//! `CREATED` state, and records the outcome on the transfer.
//!
//! # State Machine
//!
//! ```text
//! CREATED → PROCESSING → COMPLETED
//!               ↓
//!           CANCELLED
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Claim-Before-Touch**: `CREATED → PROCESSING` is a compare-and-set;
//!    only the winner of the claim reads or writes balances
//! 2. **Monotonic Status**: terminal statuses never change again
//! 3. **No Overdraft**: the sender debit is a compare-and-set on the balance
//!    it was validated against; on conflict the check is repeated
//! 4. **Exact Money**: amounts and balances are `Decimal`, never floats

pub mod algorithm;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod state;
pub mod types;
pub mod worker;


pub use algorithm::{SettledBalances, settle};
pub use coordinator::SettlementCoordinator;
pub use db::{PgAccountStore, PgTransferStore};
pub use error::SettlementError;
pub use gateway::{AccountStore, TransferStore};
pub use memory::{InMemoryAccountStore, InMemoryTransferStore};
pub use state::TransferStatus;
pub use types::{
    Account, AccountNumber, BalanceWrite, CancelReason, SettlementOutcome, Transfer, TransferId,
};
pub use worker::{MonitorConfig, StuckTransferMonitor};
