//! Sales reporting command handlers.
//!
//! Reports are computed on demand from the sales feed, in the terminal's
//! configured time zone.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde_json::Value;
use taquilla_reports::{build_dashboard, seller_stats, Windows};

use super::{required_str, to_json};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

fn local_now(state: &DaemonState) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&state.config.reports.time_zone())
}

pub async fn get_dashboard(state: &Arc<DaemonState>) -> Result {
    let sales = state.sales.load().await?;
    let dashboard = build_dashboard(&sales.bets, &sales.draws, &local_now(state));
    Ok(serde_json::json!({
        "dashboard": to_json(&dashboard)?,
        "source": sales.source,
    }))
}

/// Params: `{"user_id": "..."}`.
pub async fn get_seller_stats(state: &Arc<DaemonState>, params: &Value) -> Result {
    let user_id = required_str(params, "user_id")?;
    let sales = state.sales.load().await?;
    let stats = seller_stats(&sales.bets, user_id, &Windows::at(&local_now(state)));
    Ok(serde_json::json!({
        "stats": to_json(&stats)?,
        "source": sales.source,
    }))
}
