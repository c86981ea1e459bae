//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! newline-delimited JSON-RPC calls to the command handlers. A connection
//! that calls `subscribe_events` is switched to a stream of event
//! notifications for the rest of its life.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use taquilla_ledger::LedgerError;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::commands;
use crate::events::EventFilter;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    pub id: serde_json::Value,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    pub code: i32,
    /// Stable error name.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self {
            code: -32700,
            message: "PARSE_ERROR".to_string(),
            data: None,
        }
    }

    /// Invalid request (-32600).
    pub fn invalid_request() -> Self {
        Self {
            code: -32600,
            message: "INVALID_REQUEST".to_string(),
            data: None,
        }
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "METHOD_NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"method": method})),
        }
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self {
            code: -32602,
            message: "INVALID_PARAMS".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self {
            code: -32603,
            message: "INTERNAL_ERROR".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    // Ledger errors

    /// Record or key not found (-32004).
    pub fn not_found(detail: &str) -> Self {
        Self {
            code: -32004,
            message: "NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Insufficient balance (-32040).
    pub fn insufficient_balance(required: u64, available: u64) -> Self {
        Self {
            code: -32040,
            message: "INSUFFICIENT_BALANCE".to_string(),
            data: Some(serde_json::json!({"required": required, "available": available})),
        }
    }

    /// Operation needs the remote store and it is unreachable (-32050).
    pub fn store_unreachable(detail: &str) -> Self {
        Self {
            code: -32050,
            message: "STORE_UNREACHABLE".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Remote store refused the operation (-32051).
    pub fn store_rejected(detail: &str) -> Self {
        Self {
            code: -32051,
            message: "STORE_REJECTED".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }
}

impl From<LedgerError> for RpcError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InsufficientBalance {
                required,
                available,
            } => Self::insufficient_balance(required, available),
            LedgerError::InvalidAmount | LedgerError::InvalidInput(_) => {
                Self::invalid_params(&e.to_string())
            }
            LedgerError::NotFound(what) => Self::not_found(&what),
            LedgerError::Connectivity(reason) => Self::store_unreachable(&reason),
            LedgerError::RemotePolicy(reason) => Self::store_rejected(&reason),
            LedgerError::Cache(db) => Self::internal_error(&format!("cache error: {db}")),
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("IPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

async fn write_line<T: Serialize>(writer: &mut OwnedWriteHalf, message: &T) -> anyhow::Result<()> {
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Handle a single client connection.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) if request.method == "subscribe_events" => {
                match serde_json::from_value::<Option<EventFilter>>(request.params) {
                    Ok(filter) => {
                        return stream_events(&state, filter.unwrap_or_default(), request.id, writer)
                            .await;
                    }
                    Err(e) => RpcResponse::error(request.id, RpcError::invalid_params(&e.to_string())),
                }
            }
            Ok(request) => dispatch_request(state.clone(), request).await,
            Err(_) => RpcResponse::error(serde_json::Value::Null, RpcError::parse_error()),
        };

        write_line(&mut writer, &response).await?;
    }

    Ok(())
}

/// Acknowledge the subscription, then forward matching events until the
/// client goes away.
async fn stream_events(
    state: &DaemonState,
    filter: EventFilter,
    id: serde_json::Value,
    mut writer: OwnedWriteHalf,
) -> anyhow::Result<()> {
    let mut events = state.event_bus.subscribe();
    let ack = RpcResponse::success(
        id,
        serde_json::json!({"subscribed": true, "sequence": state.event_bus.sequence()}),
    );
    write_line(&mut writer, &ack).await?;

    loop {
        match events.recv().await {
            Ok(event) if filter.matches(&event) => {
                let notification = serde_json::json!({
                    "jsonrpc": "2.0",
                    "method": "event",
                    "params": event,
                });
                write_line(&mut writer, &notification).await?;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "event subscriber lagging");
            }
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
async fn dispatch_request(state: Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    if request.jsonrpc != "2.0" {
        return RpcResponse::error(id, RpcError::invalid_request());
    }
    let method = request.method.as_str();
    let params = &request.params;

    debug!("Dispatching RPC method: {}", method);

    let result = match method {
        // Withdrawal ledger
        "create_withdrawal" => commands::withdrawals::create_withdrawal(&state, params).await,
        "delete_withdrawal" => commands::withdrawals::delete_withdrawal(&state, params).await,
        "load_withdrawals" => commands::withdrawals::load_withdrawals(&state, params).await,
        "get_withdrawal_stats" => {
            commands::withdrawals::get_withdrawal_stats(&state, params).await
        }
        "sync_offline" => commands::withdrawals::sync_offline(&state).await,

        // Pots
        "get_pots" => commands::pots::get_pots(&state, params).await,
        "upsert_pot" => commands::pots::upsert_pot(&state, params).await,

        // Reports
        "get_dashboard" => commands::reports::get_dashboard(&state).await,
        "get_seller_stats" => commands::reports::get_seller_stats(&state, params).await,

        // API keys
        "create_api_key" => commands::api_keys::create_api_key(&state, params).await,
        "update_api_key" => commands::api_keys::update_api_key(&state, params).await,
        "revoke_api_key" => commands::api_keys::revoke_api_key(&state, params).await,
        "delete_api_key" => commands::api_keys::delete_api_key(&state, params).await,
        "verify_api_key" => commands::api_keys::verify_api_key(&state, params).await,
        "get_api_keys" => commands::api_keys::get_api_keys(&state).await,
        "get_api_key_stats" => commands::api_keys::get_api_key_stats(&state).await,

        // Diagnostics
        "get_connection_status" => commands::diagnostics::get_connection_status(&state).await,

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(e) => RpcResponse::error(id, e),
    }
}
