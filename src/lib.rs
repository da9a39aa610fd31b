//! Transfer Settlement - event-driven money movement between accounts
//!
//! Consumes transfer-creation events from a durable stream and settles each
//! transfer against PostgreSQL: debit the sender, credit the recipient, and
//! record `COMPLETED` or `CANCELLED` on the transfer. Many workers may run
//! concurrently; every write is a compare-and-set.
//!
//! # Modules
//!
//! - [`settlement`] - State machine, settlement rule, gateways, coordinator
//! - [`intake`] - Event decoding, stream transport, intake loop
//! - [`money`] - Exact amount parsing
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup
//! - [`db`] - PostgreSQL pool

pub mod config;
pub mod db;
pub mod intake;
pub mod logging;
pub mod money;
pub mod settlement;

// Convenient re-exports at crate root
pub use config::{AppConfig, SettlementConfig};
pub use intake::{IntakeLoop, TransferCreatedEvent};
pub use settlement::{
    AccountNumber, SettlementCoordinator, SettlementError, SettlementOutcome, TransferId,
    TransferStatus,
};
