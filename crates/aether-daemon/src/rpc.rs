//! JSON-RPC 2.0 over a Unix domain socket.
//!
//! Each connection carries newline-delimited JSON-RPC 2.0 calls to the command handlers. A
//! connection that called `subscribe_events` also receives matching ledger
//! events as `event` notifications.

use std::path::PathBuf;
use std::sync::Arc;

use aether_fhe::FheError;
use aether_lootbox::LootError;
use aether_registry::RegistryError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::commands;
use crate::events::SequencedEvent;
use crate::DaemonState;

const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Exactly one of `result` and `error` is set.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// An `event` pushed to a subscribed connection. Carries no id.
#[derive(Debug, Serialize)]
pub struct RpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: &'a SequencedEvent,
}

/// `message` is a stable SCREAMING_SNAKE name; `data` carries details.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    fn new(code: i32, message: &str, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.to_string(),
            data,
        }
    }

    fn with_detail(code: i32, message: &str, detail: impl std::fmt::Display) -> Self {
        Self::new(
            code,
            message,
            Some(serde_json::json!({ "detail": detail.to_string() })),
        )
    }

    // -32700..-32603 are the protocol-level codes.

    pub fn parse_error() -> Self {
        Self::new(-32700, "PARSE_ERROR", None)
    }

    pub fn invalid_request() -> Self {
        Self::new(-32600, "INVALID_REQUEST", None)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            -32601,
            "METHOD_NOT_FOUND",
            Some(serde_json::json!({ "method": method })),
        )
    }

    pub fn invalid_params(detail: &str) -> Self {
        Self::with_detail(-32602, "INVALID_PARAMS", detail)
    }

    pub fn internal_error(detail: &str) -> Self {
        Self::with_detail(-32603, "INTERNAL_ERROR", detail)
    }
}

impl From<LootError> for RpcError {
    fn from(err: LootError) -> Self {
        let (code, name) = match &err {
            LootError::Unauthorized(_) => (-32010, "UNAUTHORIZED"),
            LootError::DuplicateTier(_) => (-32020, "DUPLICATE_TIER"),
            LootError::InvalidWeight => (-32021, "INVALID_WEIGHT"),
            LootError::InvalidMask(_) => (-32022, "INVALID_MASK"),
            LootError::UnknownTier(_) => (-32023, "UNKNOWN_TIER"),
            LootError::DuplicateBlueprint { .. } => (-32024, "DUPLICATE_BLUEPRINT"),
            LootError::UnknownBlueprint { .. } => (-32025, "UNKNOWN_BLUEPRINT"),
            LootError::InvalidSupply => (-32026, "INVALID_SUPPLY"),
            LootError::CapacityOverflow(_) => (-32027, "CAPACITY_OVERFLOW"),
            LootError::InsufficientPayment { required, offered } => {
                return Self::new(
                    -32040,
                    "INSUFFICIENT_PAYMENT",
                    Some(serde_json::json!({
                        "required": required.to_string(),
                        "offered": offered.to_string(),
                    })),
                );
            }
            LootError::InvalidAmount => (-32041, "INVALID_AMOUNT"),
            LootError::NoTicket(_) => (-32042, "NO_TICKET"),
            LootError::ZeroBuyer => (-32043, "ZERO_BUYER"),
            LootError::Entropy(_) => (-32044, "ENTROPY_UNAVAILABLE"),
            LootError::NoTiers => (-32050, "NO_TIERS"),
            LootError::EmptyTier(_) => (-32051, "EMPTY_TIER"),
            LootError::CapacityExceeded { .. } => (-32052, "CAPACITY_EXCEEDED"),
            LootError::Registry(inner) => return Self::from(inner),
        };
        Self::with_detail(code, name, err)
    }
}

impl From<&RegistryError> for RpcError {
    fn from(err: &RegistryError) -> Self {
        match err {
            RegistryError::Fhe(inner) => Self::from(inner),
            RegistryError::EventEncoding(detail) => Self::internal_error(detail),
        }
    }
}

impl From<RegistryError> for RpcError {
    fn from(err: RegistryError) -> Self {
        Self::from(&err)
    }
}

impl From<&FheError> for RpcError {
    fn from(err: &FheError) -> Self {
        let (code, name) = match err {
            FheError::AccessDenied { .. } | FheError::ContractNotGranted(_) => {
                (-32061, "ACCESS_DENIED")
            }
            FheError::GrantSignature
            | FheError::GrantNotYetValid { .. }
            | FheError::GrantExpired { .. }
            | FheError::GrantTooLong { .. } => (-32062, "GRANT_INVALID"),
            _ => (-32060, "PROVIDER_ERROR"),
        };
        Self::with_detail(code, name, err)
    }
}

impl From<FheError> for RpcError {
    fn from(err: FheError) -> Self {
        Self::from(&err)
    }
}

/// Per-connection state.
#[derive(Default)]
pub struct Session {
    pub subscription: Option<commands::events::Subscription>,
}

pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Bind the socket and serve connections until the task is dropped.
    /// A socket file left by an earlier run is replaced.
    pub async fn run(&self) -> anyhow::Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        let listener = UnixListener::bind(&self.socket_path)?;
        info!(socket = %self.socket_path.display(), "rpc: listening");
        self.serve(listener).await
    }

    /// Serve connections on an already bound listener.
    pub async fn serve(&self, listener: UnixListener) -> anyhow::Result<()> {
        loop {
            let stream = match listener.accept().await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    error!(error = %e, "rpc: accept failed");
                    continue;
                }
            };
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(state, stream).await {
                    warn!(error = %e, "rpc: connection closed with error");
                }
            });
        }
    }
}

/// Serve one client until it hangs up, interleaving responses with
/// subscribed event notifications.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut session = Session::default();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let response = match serde_json::from_str::<RpcRequest>(&line) {
                    Ok(request) => dispatch_request(&state, request, &mut session).await,
                    Err(_) => RpcResponse::error(Value::Null, RpcError::parse_error()),
                };
                write_line(&mut writer, &response).await?;
            }
            Some(event) = next_event(&mut session) => {
                let notification = RpcNotification {
                    jsonrpc: JSONRPC_VERSION,
                    method: "event",
                    params: &event,
                };
                write_line(&mut writer, &notification).await?;
            }
        }
    }

    Ok(())
}

async fn write_line<T: Serialize>(writer: &mut OwnedWriteHalf, message: &T) -> anyhow::Result<()> {
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// The next event matching the session's subscription.
///
/// Never resolves while the session has no subscription.
async fn next_event(session: &mut Session) -> Option<SequencedEvent> {
    let Some(subscription) = session.subscription.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        match subscription.receiver.recv().await {
            Ok(event) if subscription.filter.matches(&event.event) => return Some(event),
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "rpc: subscriber lagged, events dropped");
            }
            Err(RecvError::Closed) => {
                session.subscription = None;
                return None;
            }
        }
    }
}

/// Route one request to its command and wrap the outcome.
pub async fn dispatch_request(
    state: &DaemonState,
    request: RpcRequest,
    session: &mut Session,
) -> RpcResponse {
    let id = request.id.clone();
    if request.jsonrpc != JSONRPC_VERSION {
        return RpcResponse::error(id, RpcError::invalid_request());
    }
    let method = request.method.as_str();
    let params = &request.params;

    debug!(method, "rpc: dispatch");

    let result = match method {
        // Collection metadata
        "name" => commands::registry::name(state).await,
        "symbol" => commands::registry::symbol(state).await,
        "get_contracts" => commands::registry::get_contracts(state).await,

        // Confidential registry
        "mint" => commands::registry::mint(state, params).await,
        "transfer_from" => commands::registry::transfer_from(state, params).await,
        "balance_of" => commands::registry::balance_of(state, params).await,
        "owner_of" => commands::registry::owner_of(state, params).await,
        "set_approval_for_all" => commands::registry::set_approval_for_all(state, params).await,
        "is_approved_for_all" => commands::registry::is_approved_for_all(state, params).await,

        // Loot box administration and queries
        "add_tier" => commands::lootbox::add_tier(state, params).await,
        "add_blueprint" => commands::lootbox::add_blueprint(state, params).await,
        "get_tiers" => commands::lootbox::get_tiers(state).await,
        "get_tier_blueprint_count" => {
            commands::lootbox::get_tier_blueprint_count(state, params).await
        }
        "get_blueprint_max_supply" => {
            commands::lootbox::get_blueprint_max_supply(state, params).await
        }
        "get_blueprint_issued" => commands::lootbox::get_blueprint_issued(state, params).await,

        // Tickets and resolution
        "buy_ticket" => commands::lootbox::buy_ticket(state, params).await,
        "pop_ticket" => commands::lootbox::pop_ticket(state, params).await,
        "refund_ticket" => commands::lootbox::refund_ticket(state, params).await,
        "pending_tickets" => commands::lootbox::pending_tickets(state, params).await,
        "loot" => commands::lootbox::loot(state, params).await,

        // Decryption
        "user_decrypt" => commands::access::user_decrypt(state, params).await,

        // Event subscription
        "subscribe_events" => commands::events::subscribe_events(state, params, session),
        "unsubscribe_events" => commands::events::unsubscribe_events(session),

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => {
            debug!(method, code = err.code, "rpc: call failed");
            RpcResponse::error(id, err)
        }
    }
}
