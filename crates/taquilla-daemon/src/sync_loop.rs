//! Periodic offline queue replay.

use std::sync::Arc;
use std::time::Duration;

use taquilla_ledger::{LedgerError, SyncReport};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::events::Event;
use crate::DaemonState;

/// Drain the queue every `sync_interval_secs` until shutdown.
pub async fn run(state: Arc<DaemonState>, mut shutdown: broadcast::Receiver<()>) {
    let secs = state.config.ledger.sync_interval_secs;
    if secs == 0 {
        info!("background sync disabled");
        return;
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = sync_once(&state).await {
                    warn!(error = %e, "background sync failed");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
    debug!("background sync stopped");
}

/// One drain, announcing anything that changed.
pub async fn sync_once(state: &DaemonState) -> Result<SyncReport, LedgerError> {
    let report = state.ledger.sync_offline().await?;
    if report.replayed > 0 || report.dropped > 0 {
        state.event_bus.emit(Event::now(
            "OfflineQueueDrained",
            serde_json::json!({
                "replayed": report.replayed,
                "failed": report.failed,
                "dropped": report.dropped,
                "remaining": report.remaining,
            }),
        ));
    }
    Ok(report)
}
