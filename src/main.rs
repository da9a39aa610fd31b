//! Transfer settlement worker
//!
//! ```text
//! ┌───────────┐    ┌─────────────┐    ┌─────────────┐    ┌────────────┐
//! │ JetStream │───▶│ IntakeLoop  │───▶│ Coordinator │───▶│ PostgreSQL │
//! │ (durable) │◀───│ ack/nak/term│    │  (CAS FSM)  │    │  Accounts  │
//! └───────────┘    └─────────────┘    └─────────────┘    └────────────┘
//!                                            ▲
//!                                  StuckTransferMonitor
//! ```
//!
//! Usage: `transfer_settlement [--env <name>] [--once]`
//!
//! Any number of workers may run against the same stream and database.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use transfer_settlement::config::AppConfig;
use transfer_settlement::db::Database;
use transfer_settlement::intake::{IntakeLoop, JetStreamSource};
use transfer_settlement::logging::init_logging;
use transfer_settlement::settlement::{
    AccountStore, MonitorConfig, PgAccountStore, PgTransferStore, SettlementCoordinator,
    StuckTransferMonitor, TransferStore,
};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Run one stuck-transfer scan and exit
fn scan_once_mode() -> bool {
    std::env::args().any(|a| a == "--once")
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env).with_context(|| format!("loading {} config", env))?;
    let _log_guard = init_logging(&app_config);

    info!(
        env = %env,
        version = env!("CARGO_PKG_VERSION"),
        git = env!("GIT_HASH"),
        "Starting transfer settlement worker"
    );

    let database_url = app_config
        .postgres_url
        .as_deref()
        .context("postgres_url is not configured (set it in YAML or DATABASE_URL)")?;
    let db = Database::connect(database_url)
        .await
        .context("connecting to PostgreSQL")?;
    db.health_check().await.context("PostgreSQL health check")?;

    let transfers = Arc::new(PgTransferStore::new(db.pool().clone()));
    let accounts = Arc::new(PgAccountStore::new(db.pool().clone()));
    info!(
        accounts = accounts.name(),
        transfers = transfers.name(),
        "Settlement stores ready"
    );

    let monitor_config = MonitorConfig::from(&app_config.stuck_monitor);
    if scan_once_mode() {
        let stuck = StuckTransferMonitor::new(transfers, monitor_config)
            .scan_once()
            .await?;
        info!(count = stuck.len(), "Stuck-transfer scan finished");
        return Ok(());
    }

    let coordinator = Arc::new(SettlementCoordinator::new(
        transfers.clone(),
        accounts,
        app_config.settlement.clone(),
    ));

    if app_config.stuck_monitor.enabled {
        let monitor = StuckTransferMonitor::new(transfers, monitor_config);
        tokio::spawn(async move {
            monitor.run().await;
        });
    } else {
        warn!("Stuck-transfer monitor disabled");
    }

    let mut stream = JetStreamSource::connect(&app_config.stream)
        .await
        .context("connecting to JetStream")?;
    let intake = IntakeLoop::new(coordinator);

    tokio::select! {
        result = intake.run(&mut stream) => {
            match result {
                Ok(stats) => info!(%stats, "Intake finished"),
                Err(e) => {
                    error!(error = %e, "Intake stopped");
                    return Err(e).context("event stream failed");
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!(stats = %intake.stats().snapshot(), "Shutdown requested");
        }
    }

    Ok(())
}
