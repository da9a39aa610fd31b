//! Intake loop
//!
//! Pulls transfer-creation messages one at a time, settles each and tells the
//! transport what to do with it:
//!
//! | Result                                   | Disposition |
//! |------------------------------------------|-------------|
//! | payload does not decode                  | `Term`      |
//! | any `SettlementOutcome`                  | `Ack`       |
//! | `StoreUnavailable`                       | `Nak`       |
//! | any other `SettlementError`              | `Ack`       |
//!
//! `Nak` only pays off when the outage hit before the `CREATED → PROCESSING`
//! claim. After the claim the redelivery finds the transfer `PROCESSING`,
//! settles to `InProgress` and is acked; the stuck-transfer monitor reports
//! it from then on.
//!
//! Per-message failures never stop the loop. A failed stream read does.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error, info, warn};

use super::event::TransferCreatedEvent;
use super::stream::{Disposition, EventStream, StreamError, StreamMessage};
use crate::settlement::coordinator::SettlementCoordinator;
use crate::settlement::types::SettlementOutcome;

/// Intake counters, shared with whoever wants to report them
#[derive(Debug, Default)]
pub struct IntakeStats {
    pub received: AtomicU64,
    pub completed: AtomicU64,
    pub cancelled: AtomicU64,
    /// Already terminal or being processed elsewhere
    pub duplicates: AtomicU64,
    pub malformed: AtomicU64,
    pub failed: AtomicU64,
    pub redelivery_requested: AtomicU64,
}

impl IntakeStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IntakeStatsSnapshot {
        IntakeStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            redelivery_requested: self.redelivery_requested.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeStatsSnapshot {
    pub received: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub duplicates: u64,
    pub malformed: u64,
    pub failed: u64,
    pub redelivery_requested: u64,
}

impl fmt::Display for IntakeStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Intake Stats: received={}, completed={}, cancelled={}, duplicates={}, malformed={}, failed={} (redelivery={})",
            self.received,
            self.completed,
            self.cancelled,
            self.duplicates,
            self.malformed,
            self.failed,
            self.redelivery_requested
        )
    }
}

pub struct IntakeLoop {
    coordinator: Arc<SettlementCoordinator>,
    stats: Arc<IntakeStats>,
}

impl IntakeLoop {
    pub fn new(coordinator: Arc<SettlementCoordinator>) -> Self {
        Self {
            coordinator,
            stats: Arc::new(IntakeStats::new()),
        }
    }

    pub fn stats(&self) -> &Arc<IntakeStats> {
        &self.stats
    }

    /// Consume `stream` until it ends or a read fails.
    ///
    /// Returns the final counters when the stream ends.
    pub async fn run<S: EventStream>(
        &self,
        stream: &mut S,
    ) -> Result<IntakeStatsSnapshot, StreamError> {
        info!("Intake loop started");

        loop {
            let message = match stream.next_message().await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    warn!("Event stream ended");
                    break;
                }
                Err(e) => {
                    error!(
                        error = %e,
                        stats = %self.stats.snapshot(),
                        "Stream read failed - stopping intake"
                    );
                    return Err(e);
                }
            };

            let disposition = self.handle(message.payload()).await;
            if let Err(e) = message.acknowledge(disposition).await {
                // Unacknowledged messages are redelivered after ack_wait
                warn!(error = %e, ?disposition, "Failed to acknowledge message");
            }
        }

        let snapshot = self.stats.snapshot();
        info!("{}", snapshot);
        Ok(snapshot)
    }

    /// Decode and settle one payload
    pub async fn handle(&self, payload: &[u8]) -> Disposition {
        IntakeStats::incr(&self.stats.received);

        let event =
            match TransferCreatedEvent::decode(payload, self.coordinator.config().ledger_decimals) {
                Ok(event) => event,
                Err(e) => {
                    IntakeStats::incr(&self.stats.malformed);
                    warn!(
                        error = %e,
                        payload = %String::from_utf8_lossy(payload),
                        "Skipping malformed event"
                    );
                    return Disposition::Term;
                }
            };

        match self.coordinator.settle_event(&event).await {
            Ok(outcome) => {
                match &outcome {
                    SettlementOutcome::Completed { .. } => IntakeStats::incr(&self.stats.completed),
                    SettlementOutcome::Cancelled(_) => IntakeStats::incr(&self.stats.cancelled),
                    SettlementOutcome::AlreadyTerminal(_) | SettlementOutcome::InProgress => {
                        debug!(transfer_id = %event.id, ?outcome, "Duplicate delivery");
                        IntakeStats::incr(&self.stats.duplicates);
                    }
                }
                Disposition::Ack
            }
            Err(e) => {
                IntakeStats::incr(&self.stats.failed);
                error!(
                    transfer_id = %event.id,
                    code = e.code(),
                    error = %e,
                    "Settlement failed"
                );
                if e.is_retryable() {
                    IntakeStats::incr(&self.stats.redelivery_requested);
                    Disposition::Nak
                } else {
                    Disposition::Ack
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettlementConfig;
    use crate::intake::stream::MemoryStream;
    use crate::settlement::error::SettlementError;
    use crate::settlement::gateway::TransferStore;
    use crate::settlement::memory::{InMemoryAccountStore, InMemoryTransferStore};
    use crate::settlement::state::TransferStatus;
    use crate::settlement::types::{AccountNumber, Transfer, TransferId};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::time::Duration;

    fn acct(n: i64) -> AccountNumber {
        AccountNumber::new(n).unwrap()
    }

    struct Fixture {
        intake: IntakeLoop,
        transfers: Arc<InMemoryTransferStore>,
        accounts: Arc<InMemoryAccountStore>,
    }

    fn fixture() -> Fixture {
        let transfers = Arc::new(InMemoryTransferStore::new());
        let accounts = Arc::new(InMemoryAccountStore::new());
        let coordinator = Arc::new(SettlementCoordinator::new(
            transfers.clone(),
            accounts.clone(),
            SettlementConfig::default(),
        ));
        Fixture {
            intake: IntakeLoop::new(coordinator),
            transfers,
            accounts,
        }
    }

    fn event_payload(t: &Transfer) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "Id": t.id.to_string(),
            "SenderAccount": t.sender.to_string(),
            "RecipientAccount": t.recipient.to_string(),
            "Amount": t.amount.to_string(),
            "timestamp": "2024-03-01T12:30:00Z"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_malformed_event_does_not_stop_intake() {
        let f = fixture();
        f.accounts.open(acct(1), dec!(100));
        f.accounts.open(acct(2), dec!(50));
        let t = Transfer::new(TransferId::new(), acct(1), acct(2), dec!(30));
        f.transfers.insert(t.clone());

        let mut stream = MemoryStream::new();
        stream.push("{\"Id\": 7}").push(event_payload(&t));

        let stats = f.intake.run(&mut stream).await.unwrap();

        assert_eq!(stats.received, 2);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(
            stream.dispositions(),
            vec![(1, Disposition::Term), (2, Disposition::Ack)]
        );
        assert_eq!(f.transfers.status(t.id), Some(TransferStatus::Completed));
        assert_eq!(f.accounts.balance(acct(1)), Some(dec!(70)));
        assert_eq!(f.accounts.balance(acct(2)), Some(dec!(80)));
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_acked_without_effect() {
        let f = fixture();
        f.accounts.open(acct(1), dec!(100));
        f.accounts.open(acct(2), dec!(0));
        let t = Transfer::new(TransferId::new(), acct(1), acct(2), dec!(10));
        f.transfers.insert(t.clone());

        let mut stream = MemoryStream::new();
        stream.push(event_payload(&t)).push(event_payload(&t));

        let stats = f.intake.run(&mut stream).await.unwrap();

        assert_eq!(stats.completed, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(f.accounts.balance(acct(1)), Some(dec!(90)));
        assert_eq!(f.accounts.balance(acct(2)), Some(dec!(10)));
        assert!(stream.dispositions().iter().all(|(_, d)| *d == Disposition::Ack));
    }

    #[tokio::test]
    async fn test_unknown_transfer_is_acked_as_failure() {
        let f = fixture();
        let t = Transfer::new(TransferId::new(), acct(1), acct(2), dec!(10));

        let mut stream = MemoryStream::new();
        stream.push(event_payload(&t));

        let stats = f.intake.run(&mut stream).await.unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.redelivery_requested, 0);
        assert_eq!(stream.dispositions(), vec![(1, Disposition::Ack)]);
    }

    /// Transfer database that is down for every call
    struct DownTransferStore;

    #[async_trait]
    impl TransferStore for DownTransferStore {
        fn name(&self) -> &'static str {
            "down"
        }

        async fn get_by_id(&self, _id: TransferId) -> Result<Option<Transfer>, SettlementError> {
            Err(SettlementError::StoreUnavailable("connection refused".into()))
        }

        async fn set_status(
            &self,
            _id: TransferId,
            _expected: TransferStatus,
            _new_status: TransferStatus,
        ) -> Result<bool, SettlementError> {
            Err(SettlementError::StoreUnavailable("connection refused".into()))
        }

        async fn find_stuck(
            &self,
            _older_than: Duration,
            _limit: usize,
        ) -> Result<Vec<Transfer>, SettlementError> {
            Err(SettlementError::StoreUnavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_store_outage_requests_redelivery() {
        let coordinator = Arc::new(SettlementCoordinator::new(
            Arc::new(DownTransferStore),
            Arc::new(InMemoryAccountStore::new()),
            SettlementConfig::default(),
        ));
        let intake = IntakeLoop::new(coordinator);
        let t = Transfer::new(TransferId::new(), acct(1), acct(2), dec!(10));

        let mut stream = MemoryStream::new();
        stream.push(event_payload(&t));

        let stats = intake.run(&mut stream).await.unwrap();

        assert_eq!(stream.dispositions(), vec![(1, Disposition::Nak)]);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.redelivery_requested, 1);
    }

    #[tokio::test]
    async fn test_read_failure_stops_intake() {
        let f = fixture();
        f.accounts.open(acct(1), dec!(100));
        f.accounts.open(acct(2), dec!(0));
        let t = Transfer::new(TransferId::new(), acct(1), acct(2), dec!(10));
        f.transfers.insert(t.clone());

        let mut stream = MemoryStream::new();
        stream
            .push_error(StreamError::Read("connection reset".into()))
            .push(event_payload(&t));

        let err = f.intake.run(&mut stream).await.unwrap_err();

        assert_eq!(err, StreamError::Read("connection reset".into()));
        assert_eq!(stream.remaining(), 1);
        assert_eq!(f.transfers.status(t.id), Some(TransferStatus::Created));
        assert_eq!(f.intake.stats().snapshot(), IntakeStatsSnapshot::default());
    }

    #[test]
    fn test_stats_display() {
        let stats = IntakeStats::new();
        IntakeStats::incr(&stats.received);
        IntakeStats::incr(&stats.completed);
        let text = stats.snapshot().to_string();
        assert!(text.contains("received=1"));
        assert!(text.contains("completed=1"));
    }
}
