//! Diagnostics command handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use taquilla_db::queries::snapshots;

use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Probe the remote store and report queue and sync state.
pub async fn get_connection_status(state: &Arc<DaemonState>) -> Result {
    let gateway = state.backend.gateway();
    let connected = gateway.is_reachable().await;
    let health = gateway.health().await;

    let pending_ops = state.ledger.pending_ops().await?;
    let last_sync_at: Option<DateTime<Utc>> = {
        let conn = state.backend.cache().lock().await;
        snapshots::read(&conn, snapshots::LAST_SYNC_AT)
            .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?
    };

    Ok(serde_json::json!({
        "connected": connected,
        "mode": if connected { "connected" } else { "cache_only" },
        "backend": gateway.remote().kind(),
        "last_probe_at": health.last_probe_at,
        "last_error": health.last_error,
        "pending_ops": pending_ops,
        "last_sync_at": last_sync_at,
        "events_emitted": state.event_bus.sequence(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
