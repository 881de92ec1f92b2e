//! Store server core: shared state, WebSocket handler and request dispatch.
//!
//! Each connection starts anonymous. A `SignIn` request binds the connection
//! to a user; every data operation is then executed against the shared
//! [`Dataset`] on that user's behalf. Replies echo the request id so clients
//! may pipeline requests.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use kanban_proto::dataset::{Dataset, Provisioning};
use kanban_proto::model::User;
use kanban_proto::wire::{self, StoreFault, StoreMessage, StoreOp, StoreValue};
use tokio::sync::{RwLock, mpsc};

/// Default maximum accepted frame size in bytes (256 KB).
const DEFAULT_MAX_PAYLOAD_SIZE: usize = 256 * 1024;

/// Shared store server state.
pub struct StoreState {
    /// All boards, columns, tasks and subtasks.
    dataset: RwLock<Dataset>,
    /// Maximum accepted frame size in bytes.
    max_payload_size: usize,
}

impl Default for StoreState {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreState {
    /// Creates an empty store with default limits and provisioning.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_MAX_PAYLOAD_SIZE, Provisioning::default())
    }

    /// Creates an empty store with a custom frame limit and provisioning template.
    #[must_use]
    pub fn with_config(max_payload_size: usize, provisioning: Provisioning) -> Self {
        Self {
            dataset: RwLock::new(Dataset::with_provisioning(provisioning)),
            max_payload_size,
        }
    }

    /// Executes one request for a connection whose session is `session`.
    ///
    /// `SignIn` and `SignOut` update the session; all other operations
    /// require one.
    async fn dispatch(
        &self,
        session: &mut Option<User>,
        op: StoreOp,
    ) -> Result<StoreValue, StoreFault> {
        match op {
            StoreOp::SignIn {
                email,
                display_name,
            } => {
                let user = self.dataset.write().await.sign_in(&email, display_name)?;
                tracing::info!(user_id = %user.id, "user signed in");
                *session = Some(user.clone());
                Ok(StoreValue::User(user))
            }
            StoreOp::SignOut => {
                if let Some(user) = session.take() {
                    tracing::info!(user_id = %user.id, "user signed out");
                }
                Ok(StoreValue::Done)
            }
            op => {
                let Some(user) = session.as_ref() else {
                    return Err(StoreFault::Forbidden("not signed in".to_string()));
                };
                if op.is_read() {
                    self.dataset.read().await.query(user, &op)
                } else {
                    self.dataset.write().await.execute(user, op)
                }
            }
        }
    }
}

/// Handles an upgraded WebSocket connection for a single client.
///
/// The connection lifecycle:
/// 1. Spawn a writer task fed by a channel.
/// 2. Read binary frames, decode requests and reply in order.
/// 3. On disconnect, drop the session.
pub async fn handle_socket(socket: WebSocket, state: Arc<StoreState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!("WebSocket write failed");
                break;
            }
        }
    });

    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        let mut session: Option<User> = None;
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Binary(data) => {
                    let reply = handle_frame(&data, &mut session, &reader_state).await;
                    if !send_msg(&tx, &reply) {
                        break;
                    }
                }
                Message::Close(_) => {
                    tracing::debug!("received close frame");
                    break;
                }
                _ => {
                    // Ignore text, ping, pong frames.
                }
            }
        }
        session
    });

    tokio::select! {
        result = &mut read_task => {
            write_task.abort();
            if let Ok(Some(user)) = result {
                tracing::info!(user_id = %user.id, "client disconnected");
            }
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }
}

/// Decodes one frame and produces the message to send back.
async fn handle_frame(
    data: &[u8],
    session: &mut Option<User>,
    state: &StoreState,
) -> StoreMessage {
    if data.len() > state.max_payload_size {
        let reason = format!(
            "frame too large: {} bytes (max {})",
            data.len(),
            state.max_payload_size
        );
        let id = wire::peek_request_id(data);
        tracing::warn!(
            size = data.len(),
            max = state.max_payload_size,
            request_id = ?id,
            "frame exceeds size limit"
        );
        // Answer the request itself when its id is readable so the client
        // can fail exactly that call.
        return match id {
            Some(id) => StoreMessage::Reply {
                id,
                result: Err(StoreFault::Invalid(reason)),
            },
            None => StoreMessage::Error { reason },
        };
    }

    let (id, op) = match wire::decode(data) {
        Ok(StoreMessage::Request { id, op }) => (id, op),
        Ok(other) => {
            tracing::warn!(msg = ?other, "expected a request");
            return StoreMessage::Error {
                reason: "expected a request".to_string(),
            };
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to decode frame");
            return StoreMessage::Error {
                reason: format!("malformed frame: {e}"),
            };
        }
    };

    let op_name = op.name();
    let result = state.dispatch(session, op).await;
    match &result {
        Ok(_) => tracing::debug!(request_id = id, op = op_name, "request served"),
        Err(fault) => tracing::warn!(request_id = id, op = op_name, %fault, "request refused"),
    }
    StoreMessage::Reply { id, result }
}

/// Encodes a message and queues it for the writer task.
///
/// Returns `false` once the writer has gone away.
fn send_msg(tx: &mpsc::UnboundedSender<Message>, msg: &StoreMessage) -> bool {
    match wire::encode(msg) {
        Ok(bytes) => tx.send(Message::Binary(bytes.into())).is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode reply");
            true
        }
    }
}

/// Starts the store server on the given address and returns the bound address
/// and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(StoreState::new())).await
}

/// Starts the store server with a pre-configured [`StoreState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<StoreState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "store server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<StoreState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}
