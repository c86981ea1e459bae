//! Pot command handlers.

use std::sync::Arc;

use serde_json::Value;
use taquilla_types::Pot;

use super::{params_as, to_json};
use crate::events::Event;
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Params: optional `{"funded_only": bool}`.
pub async fn get_pots(state: &Arc<DaemonState>, params: &Value) -> Result {
    let funded_only = params
        .get("funded_only")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let pots = if funded_only {
        state.pots.with_balance().await?
    } else {
        state.pots.load().await?
    };
    Ok(serde_json::json!({ "pots": to_json(&pots)? }))
}

/// Create a pot, or set an existing pot's balance and colour.
/// Creation needs the remote store.
pub async fn upsert_pot(state: &Arc<DaemonState>, params: &Value) -> Result {
    let pot: Pot = params_as(params.get("pot").unwrap_or(params))?;
    let (saved, status) = state.pots.upsert(pot).await?;

    state.event_bus.emit(Event::now(
        "PotUpdated",
        serde_json::json!({"pot": saved.name, "balance": saved.balance}),
    ));
    Ok(serde_json::json!({
        "success": true,
        "pot": to_json(&saved)?,
        "status": status,
        "message": status.message(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::state_with;
    use serde_json::json;
    use taquilla_store::MemoryStore;

    #[tokio::test]
    async fn test_get_pots_funded_only() {
        let store = MemoryStore::new();
        let state = state_with(
            &store,
            &[Pot::new("Caja", 500, "#22c55e"), Pot::new("Premios", 0, "#f97316")],
        )
        .await;

        let all = get_pots(&state, &Value::Null).await.expect("all");
        assert_eq!(all["pots"].as_array().map(Vec::len), Some(2));

        let funded = get_pots(&state, &json!({"funded_only": true}))
            .await
            .expect("funded");
        assert_eq!(funded["pots"][0]["name"], "Caja");
        assert_eq!(funded["pots"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_upsert_accepts_bare_or_wrapped_pot() {
        let store = MemoryStore::new();
        let state = state_with(&store, &[]).await;

        let created = upsert_pot(&state, &json!({"name": "Caja", "balance": 100, "color": "#22c55e"}))
            .await
            .expect("create");
        assert_eq!(created["status"], "synced");

        let updated = upsert_pot(
            &state,
            &json!({"pot": {"name": "Caja", "balance": 250, "color": "#22c55e"}}),
        )
        .await
        .expect("update");
        assert_eq!(updated["pot"]["balance"], 250);
    }

    #[tokio::test]
    async fn test_offline_create_needs_store() {
        let store = MemoryStore::new();
        let state = state_with(&store, &[]).await;
        store.set_online(false);
        let result = upsert_pot(&state, &json!({"name": "Nueva", "balance": 0, "color": "#000000"})).await;
        assert_eq!(result.expect_err("offline create").code, -32050);
    }
}
