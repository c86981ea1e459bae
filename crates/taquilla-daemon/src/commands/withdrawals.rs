//! Withdrawal ledger command handlers.

use std::sync::Arc;

use serde_json::Value;
use taquilla_ledger::{compute_stats, SyncStatus, WithdrawalFilter};
use taquilla_types::{Pot, RecordId};

use super::{params_as, to_json};
use crate::events::Event;
use crate::rpc::RpcError;
use crate::sync_loop;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Debit a pot.
///
/// Params: `{"pot": Pot, "amount": cents}`. `pot` is the caller's view; the
/// stored balance wins when one is known.
pub async fn create_withdrawal(state: &Arc<DaemonState>, params: &Value) -> Result {
    let pot: Pot = params_as(params.get("pot").unwrap_or(&Value::Null))?;
    let amount = params
        .get("amount")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| RpcError::invalid_params("amount required"))?;

    let receipt = state.ledger.create_withdrawal(&pot, amount).await?;

    let event_type = match receipt.status {
        SyncStatus::Synced => "WithdrawalCreated",
        SyncStatus::LocalOnly => "WithdrawalRecordedLocally",
    };
    state.event_bus.emit(Event::now(
        event_type,
        serde_json::json!({
            "id": receipt.withdrawal.id.to_string(),
            "pot": receipt.withdrawal.from_pot,
            "amount": receipt.withdrawal.amount,
            "new_balance": receipt.new_balance,
        }),
    ));

    let mut result = to_json(&receipt)?;
    if let Some(obj) = result.as_object_mut() {
        obj.insert("success".into(), Value::Bool(true));
    }
    Ok(result)
}

/// Params: `{"id": "remote:42"}` or `{"id": {"origin": "remote", "value": "42"}}`.
pub async fn delete_withdrawal(state: &Arc<DaemonState>, params: &Value) -> Result {
    let id = match params.get("id") {
        Some(Value::String(s)) => s
            .parse::<RecordId>()
            .map_err(|e| RpcError::invalid_params(&e.to_string()))?,
        Some(other) => params_as(other)?,
        None => return Err(RpcError::invalid_params("id required")),
    };

    let status = state.ledger.delete_withdrawal(&id).await?;
    state.event_bus.emit(Event::now(
        "WithdrawalDeleted",
        serde_json::json!({"id": id.to_string(), "status": status}),
    ));

    let message = match status {
        SyncStatus::Synced => "deleted",
        SyncStatus::LocalOnly => "deleted locally, not yet synced",
    };
    Ok(serde_json::json!({
        "success": true,
        "status": status,
        "message": message,
    }))
}

/// Params: an optional filter `{pot, start, end, min_amount, max_amount}`.
pub async fn load_withdrawals(state: &Arc<DaemonState>, params: &Value) -> Result {
    let filter: Option<WithdrawalFilter> = params_as(params)?;
    let loaded = state
        .ledger
        .load_withdrawals(&filter.unwrap_or_default())
        .await?;
    to_json(&loaded)
}

/// Stats over the in-memory list, optionally filtered.
pub async fn get_withdrawal_stats(state: &Arc<DaemonState>, params: &Value) -> Result {
    let filter: Option<WithdrawalFilter> = params_as(params)?;
    let stats = match filter {
        Some(f) if !f.is_unfiltered() => compute_stats(&f.apply(&state.ledger.snapshot().await)),
        _ => state.ledger.stats().await,
    };
    to_json(&stats)
}

pub async fn sync_offline(state: &Arc<DaemonState>) -> Result {
    let report = sync_loop::sync_once(state).await?;
    let swaps: Vec<Value> = report
        .id_swaps
        .iter()
        .map(|(local, remote)| {
            serde_json::json!({"local": local.to_string(), "remote": remote.to_string()})
        })
        .collect();
    Ok(serde_json::json!({
        "connected": report.connected,
        "replayed": report.replayed,
        "failed": report.failed,
        "dropped": report.dropped,
        "remaining": report.remaining,
        "id_swaps": swaps,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::state_with;
    use serde_json::json;
    use taquilla_store::MemoryStore;

    fn caja() -> Pot {
        Pot::new("Caja", 1_000, "#22c55e")
    }

    #[tokio::test]
    async fn test_create_reports_status_and_emits() {
        let store = MemoryStore::new();
        let state = state_with(&store, &[caja()]).await;
        let mut events = state.event_bus.subscribe();

        let result = create_withdrawal(&state, &json!({"pot": caja(), "amount": 400}))
            .await
            .expect("create");
        assert_eq!(result["success"], true);
        assert_eq!(result["status"], "synced");
        assert_eq!(result["message"], "recorded");
        assert_eq!(result["new_balance"], 600);
        assert_eq!(result["withdrawal"]["id"]["origin"], "remote");

        let event = events.try_recv().expect("event");
        assert_eq!(event.event_type, "WithdrawalCreated");
        assert_eq!(event.payload["pot"], "Caja");
    }

    #[tokio::test]
    async fn test_offline_create_is_local_only() {
        let store = MemoryStore::new();
        let state = state_with(&store, &[caja()]).await;
        // Warm the cache so the pot is known offline.
        crate::commands::pots::get_pots(&state, &Value::Null)
            .await
            .expect("pots");
        store.set_online(false);

        let result = create_withdrawal(&state, &json!({"pot": caja(), "amount": 100}))
            .await
            .expect("create");
        assert_eq!(result["status"], "local_only");
        assert_eq!(result["message"], "recorded locally, not yet synced");
        assert_eq!(result["withdrawal"]["id"]["origin"], "local");
    }

    #[tokio::test]
    async fn test_create_validates_params() {
        let state = state_with(&MemoryStore::new(), &[caja()]).await;
        let missing = create_withdrawal(&state, &json!({"pot": caja()})).await;
        assert_eq!(missing.expect_err("no amount").code, -32602);

        let zero = create_withdrawal(&state, &json!({"pot": caja(), "amount": 0})).await;
        assert_eq!(zero.expect_err("zero").code, -32602);
    }

    #[tokio::test]
    async fn test_delete_accepts_both_id_forms() {
        let store = MemoryStore::new();
        let state = state_with(&store, &[caja()]).await;
        let first = create_withdrawal(&state, &json!({"pot": caja(), "amount": 100}))
            .await
            .expect("first");
        let second = create_withdrawal(&state, &json!({"pot": caja(), "amount": 100}))
            .await
            .expect("second");

        let by_string = format!("remote:{}", first["withdrawal"]["id"]["value"].as_str().expect("id"));
        delete_withdrawal(&state, &json!({"id": by_string}))
            .await
            .expect("delete by string");
        let deleted = delete_withdrawal(&state, &json!({"id": second["withdrawal"]["id"]}))
            .await
            .expect("delete by object");
        assert_eq!(deleted["message"], "deleted");
        assert!(state.ledger.snapshot().await.is_empty());

        let bad = delete_withdrawal(&state, &json!({"id": "nonsense"})).await;
        assert_eq!(bad.expect_err("malformed").code, -32602);
    }

    #[tokio::test]
    async fn test_unknown_local_id_not_found() {
        let state = state_with(&MemoryStore::new(), &[]).await;
        let result = delete_withdrawal(&state, &json!({"id": "local:missing"})).await;
        assert_eq!(result.expect_err("not found").code, -32004);
    }

    #[tokio::test]
    async fn test_load_and_filtered_stats() {
        let store = MemoryStore::new();
        let premios = Pot::new("Premios", 1_000, "#f97316");
        let state = state_with(&store, &[caja(), premios.clone()]).await;
        create_withdrawal(&state, &json!({"pot": caja(), "amount": 100}))
            .await
            .expect("caja");
        create_withdrawal(&state, &json!({"pot": premios, "amount": 300}))
            .await
            .expect("premios");

        let loaded = load_withdrawals(&state, &Value::Null).await.expect("load");
        assert_eq!(loaded["source"], "remote");
        assert_eq!(loaded["withdrawals"].as_array().map(Vec::len), Some(2));

        let by_pot = load_withdrawals(&state, &json!({"pot": "Premios"}))
            .await
            .expect("by pot");
        assert_eq!(by_pot["withdrawals"].as_array().map(Vec::len), Some(1));

        let all = get_withdrawal_stats(&state, &Value::Null).await.expect("stats");
        assert_eq!(all["total_amount"], 400);
        assert_eq!(all["count"], 2);

        let caja_only = get_withdrawal_stats(&state, &json!({"pot": "Caja"}))
            .await
            .expect("filtered stats");
        assert_eq!(caja_only["total_amount"], 100);
        assert_eq!(caja_only["average_amount"], 100.0);
    }

    #[tokio::test]
    async fn test_sync_offline_reports_swaps() {
        let store = MemoryStore::new();
        let state = state_with(&store, &[caja()]).await;
        store.set_online(false);
        let created = create_withdrawal(&state, &json!({"pot": caja(), "amount": 100}))
            .await
            .expect("offline");
        let local = format!("local:{}", created["withdrawal"]["id"]["value"].as_str().expect("id"));

        store.set_online(true);
        let report = sync_offline(&state).await.expect("sync");
        assert_eq!(report["connected"], true);
        assert_eq!(report["remaining"], 0);
        assert_eq!(report["id_swaps"][0]["local"], local);
    }
}
