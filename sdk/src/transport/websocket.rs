use super::{JsonRpcRequest, JsonRpcResponse, Transport};
use crate::errors::{SdkError, SdkResult};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

type Waiter = oneshot::Sender<SdkResult<JsonRpcResponse>>;
type Waiters = Arc<Mutex<HashMap<String, Waiter>>>;

struct Connection {
    outbound: mpsc::UnboundedSender<Message>,
    alive: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.outbound.is_closed()
    }

    fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Persistent transport: one connection, many in-flight requests
/// demultiplexed by request id.
pub struct WebSocketTransport {
    url: String,
    timeout: Duration,
    connection: tokio::sync::Mutex<Option<Connection>>,
    waiters: Waiters,
}

impl WebSocketTransport {
    /// Create the transport. The connection opens on first use.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        WebSocketTransport {
            url: url.into(),
            timeout,
            connection: tokio::sync::Mutex::new(None),
            waiters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Number of requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Outbound queue of the live connection, connecting first if needed.
    async fn outbound(&self) -> SdkResult<mpsc::UnboundedSender<Message>> {
        let mut guard = self.connection.lock().await;
        if let Some(connection) = guard.as_ref() {
            if connection.is_alive() {
                return Ok(connection.outbound.clone());
            }
            connection.abort();
        }

        let connection = self.open().await?;
        let outbound = connection.outbound.clone();
        *guard = Some(connection);
        Ok(outbound)
    }

    async fn open(&self) -> SdkResult<Connection> {
        let (stream, _) = tokio::time::timeout(self.timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| {
                SdkError::Timeout(format!(
                    "WebSocket connect to {} exceeded {} ms",
                    self.url,
                    self.timeout.as_millis()
                ))
            })?
            .map_err(|e| {
                SdkError::NetworkError(format!("WebSocket connect to {} failed: {}", self.url, e))
            })?;
        log::info!("WebSocket connected to {}", self.url);

        let (mut sink, mut source) = stream.split();
        let alive = Arc::new(AtomicBool::new(true));
        let (outbound, mut queue) = mpsc::unbounded_channel::<Message>();

        let writer_alive = alive.clone();
        let writer = tokio::spawn(async move {
            while let Some(message) = queue.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    log::warn!("WebSocket write failed: {}", e);
                    writer_alive.store(false, Ordering::SeqCst);
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_alive = alive.clone();
        let waiters = self.waiters.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => dispatch(&waiters, text.as_bytes()),
                    Ok(Message::Binary(data)) => dispatch(&waiters, &data),
                    Ok(Message::Close(_)) => {
                        log::debug!("WebSocket closed by peer");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        // In-flight waiters are left to their own timers.
                        log::warn!("WebSocket connection error: {}", e);
                        break;
                    }
                }
            }
            reader_alive.store(false, Ordering::SeqCst);
        });

        Ok(Connection {
            outbound,
            alive,
            reader,
            writer,
        })
    }
}

/// Removes a request's waiter when `send` finishes or its future is dropped.
struct Registered<'a> {
    waiters: &'a Waiters,
    id: &'a str,
}

impl Drop for Registered<'_> {
    fn drop(&mut self) {
        self.waiters.lock().remove(self.id);
    }
}

fn dispatch(waiters: &Waiters, payload: &[u8]) {
    let response: JsonRpcResponse = match serde_json::from_slice(payload) {
        Ok(response) => response,
        Err(e) => {
            log::warn!("Ignoring malformed WebSocket message: {}", e);
            return;
        }
    };

    let Some(id) = response.id_key() else {
        log::debug!("Ignoring WebSocket message without id");
        return;
    };

    match waiters.lock().remove(&id) {
        Some(waiter) => {
            let _ = waiter.send(Ok(response));
        }
        None => log::debug!("No waiter for response id {}", id),
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, request: &JsonRpcRequest) -> SdkResult<JsonRpcResponse> {
        let outbound = self.outbound().await?;
        let payload = serde_json::to_string(request)?;

        let (tx, rx) = oneshot::channel();
        self.waiters.lock().insert(request.id.clone(), tx);
        let _registered = Registered {
            waiters: &self.waiters,
            id: &request.id,
        };

        log::debug!("WebSocket request {} id={}", request.method, request.id);
        if outbound.send(Message::Text(payload)).is_err() {
            return Err(SdkError::ConnectionClosed);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SdkError::ConnectionClosed),
            Err(_) => Err(SdkError::Timeout(format!(
                "{} (id {}) did not answer within {} ms",
                request.method,
                request.id,
                self.timeout.as_millis()
            ))),
        }
    }

    /// Close the connection and reject every outstanding request with
    /// `ConnectionClosed`.
    async fn close(&self) -> SdkResult<()> {
        if let Some(connection) = self.connection.lock().await.take() {
            let _ = connection.outbound.send(Message::Close(None));
            let Connection {
                outbound,
                reader,
                writer,
                ..
            } = connection;
            drop(outbound);
            if tokio::time::timeout(self.timeout, writer).await.is_err() {
                log::warn!("WebSocket writer did not finish closing {}", self.url);
            }
            reader.abort();
            log::info!("WebSocket connection to {} closed", self.url);
        }

        let pending: Vec<Waiter> = self.waiters.lock().drain().map(|(_, w)| w).collect();
        if !pending.is_empty() {
            log::debug!("Rejecting {} pending requests on close", pending.len());
        }
        for waiter in pending {
            let _ = waiter.send(Err(SdkError::ConnectionClosed));
        }
        Ok(())
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.get_mut().take() {
            connection.abort();
        }
    }
}
