//! API key command handlers.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use taquilla_ledger::api_keys::{ApiKeyPatch, NewApiKey, UsageWindows};
use taquilla_reports::Windows;
use taquilla_types::ApiKey;

use super::{params_as, required_str, to_json};
use crate::events::Event;
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// A key as shown to operators: masked, without its hash.
fn listed(key: &ApiKey) -> Result {
    let mut value = to_json(key)?;
    if let Some(obj) = value.as_object_mut() {
        obj.remove("key_hash");
        obj.insert("masked".into(), Value::String(key.masked()));
    }
    Ok(value)
}

/// Issue a key. The plaintext is returned once and never stored.
pub async fn create_api_key(state: &Arc<DaemonState>, params: &Value) -> Result {
    let request: NewApiKey = params_as(params)?;
    let created = state.keys.create(request).await?;

    state.event_bus.emit(Event::now(
        "ApiKeyCreated",
        serde_json::json!({"id": created.record.id, "prefix": created.record.key_prefix}),
    ));
    Ok(serde_json::json!({
        "success": true,
        "key": created.key,
        "record": listed(&created.record)?,
    }))
}

/// Params: `{"id": "...", "patch": {...}}`, or the patch fields inline.
pub async fn update_api_key(state: &Arc<DaemonState>, params: &Value) -> Result {
    let id = required_str(params, "id")?;
    let patch: ApiKeyPatch = params_as(params.get("patch").unwrap_or(params))?;
    let updated = state.keys.update(id, patch).await?;
    Ok(serde_json::json!({"success": true, "record": listed(&updated)?}))
}

pub async fn revoke_api_key(state: &Arc<DaemonState>, params: &Value) -> Result {
    let id = required_str(params, "id")?;
    let revoked = state.keys.revoke(id).await?;
    state
        .event_bus
        .emit(Event::now("ApiKeyRevoked", serde_json::json!({"id": id})));
    Ok(serde_json::json!({"success": true, "record": listed(&revoked)?}))
}

pub async fn delete_api_key(state: &Arc<DaemonState>, params: &Value) -> Result {
    let id = required_str(params, "id")?;
    state.keys.delete(id).await?;
    state
        .event_bus
        .emit(Event::now("ApiKeyDeleted", serde_json::json!({"id": id})));
    Ok(serde_json::json!({"success": true}))
}

/// Params: `{"key": "sk_..."}`.
pub async fn verify_api_key(state: &Arc<DaemonState>, params: &Value) -> Result {
    let key = required_str(params, "key")?;
    let verification = state.keys.verify(key).await?;
    to_json(&verification)
}

pub async fn get_api_keys(state: &Arc<DaemonState>) -> Result {
    let keys = state.keys.list().await?;
    let rendered = keys
        .iter()
        .map(listed)
        .collect::<std::result::Result<Vec<_>, RpcError>>()?;
    Ok(serde_json::json!({ "keys": rendered }))
}

pub async fn get_api_key_stats(state: &Arc<DaemonState>) -> Result {
    let windows = Windows::at(&Utc::now().with_timezone(&state.config.reports.time_zone()));
    let usage = UsageWindows {
        today: windows.today,
        week: windows.week,
        month: windows.month,
    };
    let stats = state.keys.stats(&usage).await?;
    to_json(&stats)
}
