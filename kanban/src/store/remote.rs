//! WebSocket client of the hosted `kanban-store`.
//!
//! Implements [`RemoteStore`] over one WebSocket connection. Requests are
//! tagged with an id and may be in flight concurrently; a background reader
//! task hands each reply to the waiter registered under its id.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use kanban_proto::model::User;
use kanban_proto::wire::{self, StoreFault, StoreMessage, StoreOp, StoreValue};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{AuthBackend, RemoteStore, StoreError};

/// Type alias for the write half of a WebSocket connection.
type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Type alias for the read half of a WebSocket connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Replies awaited by request id.
type Pending = parking_lot::Mutex<HashMap<u64, oneshot::Sender<Result<StoreValue, StoreFault>>>>;

/// WebSocket store client.
///
/// Created via [`WsStore::connect`]. Dropping the store aborts its reader
/// task and fails any request still waiting for a reply.
pub struct WsStore {
    /// The store URL (ws:// or wss://).
    url: String,
    /// Write half of the WebSocket connection (shared for concurrent sends).
    ws_sender: tokio::sync::Mutex<WsSender>,
    /// Waiters for in-flight requests.
    pending: Arc<Pending>,
    /// Next request id.
    next_id: AtomicU64,
    /// Whether the connection is still open.
    connected: Arc<AtomicBool>,
    /// Handle to the background reader task.
    reader_handle: tokio::task::JoinHandle<()>,
}

impl WsStore {
    /// Connects to a store at `url`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Timeout`] if the connection is not established within `timeout`.
    /// - [`StoreError::Unavailable`] if the store cannot be reached.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let (ws_stream, _response) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| {
                tracing::warn!(url, "store WebSocket connect timed out");
                StoreError::Timeout
            })?
            .map_err(|e| {
                tracing::warn!(url, error = %e, "store WebSocket connect failed");
                map_ws_connect_error(e)
            })?;

        let (ws_sender, ws_reader) = ws_stream.split();
        let pending: Arc<Pending> = Arc::default();
        let connected = Arc::new(AtomicBool::new(true));
        let reader_handle = tokio::spawn(reader_loop(
            ws_reader,
            Arc::clone(&pending),
            Arc::clone(&connected),
        ));

        tracing::info!(url, "connected to store");
        Ok(Self {
            url: url.to_string(),
            ws_sender: tokio::sync::Mutex::new(ws_sender),
            pending,
            next_id: AtomicU64::new(1),
            connected,
            reader_handle,
        })
    }

    /// Returns the store URL this client is connected to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns whether the connection is still open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn request(&self, op: StoreOp) -> Result<StoreValue, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let op_name = op.name();
        let bytes = wire::encode(&StoreMessage::Request { id, op })?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        // The reader clears `connected` before failing the pending table, so a
        // waiter registered after that point must not wait.
        if !self.is_connected() {
            self.pending.lock().remove(&id);
            return Err(StoreError::Unavailable("connection closed".to_string()));
        }

        let sent = self
            .ws_sender
            .lock()
            .await
            .send(Message::Binary(bytes.into()))
            .await;
        if let Err(e) = sent {
            tracing::warn!(request_id = id, op = op_name, error = %e, "store send failed");
            self.pending.lock().remove(&id);
            self.connected.store(false, Ordering::SeqCst);
            return Err(StoreError::Unavailable(format!("send failed: {e}")));
        }

        tracing::debug!(request_id = id, op = op_name, "store request sent");
        match rx.await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Unavailable("connection closed".to_string())),
        }
    }
}

impl Drop for WsStore {
    fn drop(&mut self) {
        self.reader_handle.abort();
    }
}

impl RemoteStore for WsStore {
    async fn execute(&self, op: StoreOp) -> Result<StoreValue, StoreError> {
        self.request(op).await
    }
}

impl AuthBackend for WsStore {
    async fn sign_in(&self, email: &str, display_name: Option<String>) -> Result<User, StoreError> {
        super::sign_in_with(self, email, display_name).await
    }

    async fn sign_out(&self) -> Result<(), StoreError> {
        match self.request(StoreOp::SignOut).await? {
            StoreValue::Done => Ok(()),
            _ => Err(StoreError::UnexpectedReply("sign_out")),
        }
    }
}

/// Background task that routes replies to their waiters.
///
/// Malformed frames are logged and skipped. A store `Error` message, or the
/// socket closing, fails every pending request.
async fn reader_loop(mut ws_reader: WsReader, pending: Arc<Pending>, connected: Arc<AtomicBool>) {
    while let Some(msg_result) = ws_reader.next().await {
        match msg_result {
            Ok(Message::Binary(data)) => match wire::decode(&data) {
                Ok(StoreMessage::Reply { id, result }) => {
                    let waiter = pending.lock().remove(&id);
                    match waiter {
                        Some(tx) => {
                            // The caller may have given up; nothing to do then.
                            let _ = tx.send(result);
                        }
                        None => tracing::debug!(request_id = id, "reply without waiter"),
                    }
                }
                Ok(StoreMessage::Error { reason }) => {
                    // No id to match, so no waiter can be told apart. Fail them
                    // all rather than leave one waiting forever.
                    let waiters = std::mem::take(&mut *pending.lock());
                    tracing::warn!(reason = %reason, failed = waiters.len(), "store reported a connection error");
                    for tx in waiters.into_values() {
                        let _ = tx.send(Err(StoreFault::Unavailable(reason.clone())));
                    }
                }
                Ok(other) => {
                    tracing::debug!(?other, "unexpected store message");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "malformed store frame, skipping");
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("store WebSocket closed by server");
                break;
            }
            Ok(_) => {
                // Ignore ping/pong/text frames.
            }
            Err(e) => {
                tracing::warn!(error = %e, "store WebSocket read error");
                break;
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
    let abandoned = std::mem::take(&mut *pending.lock());
    if !abandoned.is_empty() {
        tracing::warn!(count = abandoned.len(), "failing requests after disconnect");
    }
    tracing::info!("store reader task exiting");
}

/// Map a `tokio_tungstenite` connection error to a [`StoreError`].
fn map_ws_connect_error(err: tokio_tungstenite::tungstenite::Error) -> StoreError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err) => StoreError::Unavailable(format!("I/O error: {io_err}")),
        WsError::Tls(_) => StoreError::Unavailable(format!("TLS error: {err}")),
        WsError::Http(response) => {
            StoreError::Unavailable(format!("HTTP error: status {}", response.status()))
        }
        other => StoreError::Unavailable(format!("connection error: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanban_proto::model::{TaskId, TaskPatch};
    use kanban_proto::wire::ListQuery;
    use tokio::net::TcpListener;

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn test_store_url() -> String {
        let (addr, _handle) = kanban_store::server::start_server("127.0.0.1:0")
            .await
            .unwrap();
        format!("ws://{addr}/ws")
    }

    /// A server that accepts one connection, reads one frame and hangs up
    /// without replying.
    async fn start_hangup_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let _ = ws.next().await;
            let _ = ws.close(None).await;
        });
        format!("ws://{addr}/ws")
    }

    /// A server that answers the first frame with a connection-level error
    /// and then stays silent.
    async fn start_error_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let _ = ws.next().await;
            let error = wire::encode(&StoreMessage::Error {
                reason: "unreadable".to_string(),
            })
            .unwrap();
            ws.send(Message::Binary(error.into())).await.unwrap();
            while ws.next().await.is_some() {}
        });
        format!("ws://{addr}/ws")
    }

    #[tokio::test]
    async fn sign_in_and_list_boards() {
        let url = test_store_url().await;
        let store = WsStore::connect(&url, TIMEOUT).await.unwrap();
        let user = store.sign_in("ada@example.com", None).await.unwrap();
        let boards = store.list_boards(ListQuery::owner(user.id)).await.unwrap();
        assert_eq!(boards.len(), 1);
        assert_eq!(store.url(), url);
    }

    #[tokio::test]
    async fn concurrent_requests_are_matched_by_id() {
        let url = test_store_url().await;
        let store = WsStore::connect(&url, TIMEOUT).await.unwrap();
        let user = store.sign_in("ada@example.com", None).await.unwrap();
        let board = store
            .list_boards(ListQuery::owner(user.id))
            .await
            .unwrap()
            .remove(0);

        let (columns, tasks, subtasks) = tokio::try_join!(
            store.list_columns(ListQuery::board(board.id.clone())),
            store.list_tasks(ListQuery::board(board.id.clone())),
            store.list_subtasks(ListQuery::board(board.id.clone())),
        )
        .unwrap();
        assert_eq!(columns.len(), 3);
        assert!(tasks.is_empty());
        assert!(subtasks.is_empty());
    }

    #[tokio::test]
    async fn faults_surface_as_store_errors() {
        let url = test_store_url().await;
        let store = WsStore::connect(&url, TIMEOUT).await.unwrap();
        let result = store.list_boards(ListQuery::owner("nobody".into())).await;
        assert!(matches!(result, Err(StoreError::Forbidden(_))));
    }

    #[tokio::test]
    async fn disconnect_fails_pending_request() {
        let url = start_hangup_server().await;
        let store = WsStore::connect(&url, TIMEOUT).await.unwrap();
        let result = store.sign_in("ada@example.com", None).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(!store.is_connected());
    }

    #[tokio::test]
    async fn oversized_update_fails_instead_of_hanging() {
        let url = test_store_url().await;
        let store = WsStore::connect(&url, TIMEOUT).await.unwrap();
        let user = store.sign_in("ada@example.com", None).await.unwrap();

        let patch = TaskPatch::now().description(Some("x".repeat(300_000)));
        let result = tokio::time::timeout(TIMEOUT, store.update_task(TaskId::from("t1"), patch))
            .await
            .expect("request must not hang");
        assert!(matches!(result, Err(StoreError::Invalid(_))));

        // Only that request failed.
        assert!(store.is_connected());
        assert_eq!(store.list_boards(ListQuery::owner(user.id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn store_error_message_fails_pending_request() {
        let url = start_error_server().await;
        let store = WsStore::connect(&url, TIMEOUT).await.unwrap();
        let result = tokio::time::timeout(TIMEOUT, store.sign_in("ada@example.com", None))
            .await
            .expect("request must not hang");
        assert!(matches!(result, Err(StoreError::Unavailable(reason)) if reason == "unreadable"));
    }

    #[tokio::test]
    async fn connect_to_closed_port_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let result = WsStore::connect(&format!("ws://{addr}/ws"), TIMEOUT).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
