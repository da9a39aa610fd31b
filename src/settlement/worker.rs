//! Stuck-transfer monitor
//!
//! Background task that reports transfers sitting in `PROCESSING` longer than
//! the stale threshold. These are attempts that crashed, hit an outage, or
//! referenced a missing account. Nothing is resumed automatically: the
//! balances may or may not have been touched, so resolution is an operator
//! decision.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::error::SettlementError;
use super::gateway::TransferStore;
use super::types::Transfer;
use crate::config::StuckMonitorConfig;

/// Monitor timing, converted from [`StuckMonitorConfig`]
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub scan_interval: Duration,
    pub stale_threshold: Duration,
    pub batch_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from(&StuckMonitorConfig::default())
    }
}

impl From<&StuckMonitorConfig> for MonitorConfig {
    fn from(config: &StuckMonitorConfig) -> Self {
        Self {
            scan_interval: Duration::from_secs(config.scan_interval_secs),
            stale_threshold: Duration::from_secs(config.stale_threshold_secs),
            batch_size: config.batch_size,
        }
    }
}

pub struct StuckTransferMonitor {
    transfers: Arc<dyn TransferStore>,
    config: MonitorConfig,
}

impl StuckTransferMonitor {
    pub fn new(transfers: Arc<dyn TransferStore>, config: MonitorConfig) -> Self {
        Self { transfers, config }
    }

    /// Scan forever
    pub async fn run(&self) -> ! {
        info!(
            scan_interval_secs = self.config.scan_interval.as_secs(),
            stale_threshold_secs = self.config.stale_threshold.as_secs(),
            store = self.transfers.name(),
            "Starting stuck-transfer monitor"
        );

        loop {
            if let Err(e) = self.scan_once().await {
                error!(error = %e, "Stuck-transfer scan failed");
            }

            tokio::time::sleep(self.config.scan_interval).await;
        }
    }

    /// Run a single scan and log every stuck transfer found
    pub async fn scan_once(&self) -> Result<Vec<Transfer>, SettlementError> {
        let stuck = self
            .transfers
            .find_stuck(self.config.stale_threshold, self.config.batch_size)
            .await?;

        if stuck.is_empty() {
            debug!("No stuck transfers");
            return Ok(stuck);
        }

        for transfer in &stuck {
            warn!(
                transfer_id = %transfer.id,
                sender = %transfer.sender,
                recipient = %transfer.recipient,
                amount = %transfer.amount,
                created_at = %transfer.created_at,
                "Transfer stuck in PROCESSING"
            );
        }

        warn!(
            count = stuck.len(),
            batch_size = self.config.batch_size,
            "Stuck transfers need manual resolution"
        );
        Ok(stuck)
    }
}
