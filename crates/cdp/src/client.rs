//! WebSocket session with one DevTools target.
//!
//! [`CdpClient`] sends one command at a time: the stream mutex is held
//! from sending a request until its matching response arrives, so ids
//! never interleave. Events and stale responses are skipped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::api::CdpApi;
use crate::error::CdpError;
use crate::messages::{EvaluateResult, Incoming, Request};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default upper bound for one command round trip.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// A live session with one target.
pub struct CdpClient {
    url: String,
    stream: Mutex<WsStream>,
    next_id: AtomicU64,
    call_timeout: Duration,
}

impl CdpClient {
    /// Open a session on a target's `webSocketDebuggerUrl`.
    pub async fn connect(url: &str, call_timeout: Duration) -> Result<Self, CdpError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| CdpError::Connection(format!("Failed to connect to {url}: {e}")))?;

        tracing::debug!(url, "Connected to DevTools target");

        Ok(Self {
            url: url.to_string(),
            stream: Mutex::new(stream),
            next_id: AtomicU64::new(1),
            call_timeout,
        })
    }

    /// Discover the first page target on `port` and open a session on it.
    pub async fn connect_to_page(port: u16, call_timeout: Duration) -> Result<Self, CdpError> {
        let target = CdpApi::new(port).page_target().await?;
        let url = target
            .web_socket_debugger_url
            .ok_or(CdpError::NoTarget { port })?;
        Self::connect(&url, call_timeout).await
    }

    /// Send a command and wait for its result, bounded by the call timeout.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, CdpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = serde_json::to_string(&Request { id, method, params })
            .map_err(|e| CdpError::Protocol(e.to_string()))?;

        let exchange = async {
            let mut stream = self.stream.lock().await;
            stream
                .send(Message::Text(frame))
                .await
                .map_err(|e| CdpError::Connection(e.to_string()))?;
            Self::read_response(&mut stream, id).await
        };

        tokio::time::timeout(self.call_timeout, exchange)
            .await
            .map_err(|_| CdpError::Timeout {
                method: method.to_string(),
                after: self.call_timeout,
            })?
    }

    /// Evaluate `expression` in the target, awaiting promises and
    /// returning the value as JSON (`null` for `undefined`).
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let raw = self
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        let evaluated: EvaluateResult =
            serde_json::from_value(raw).map_err(|e| CdpError::Protocol(e.to_string()))?;

        if let Some(details) = evaluated.exception_details {
            return Err(CdpError::Evaluation(details.message()));
        }
        Ok(evaluated.result.value.unwrap_or(Value::Null))
    }

    /// Close the session. Errors are ignored: the peer may already be gone.
    pub async fn close(&self) {
        let mut stream = self.stream.lock().await;
        if let Err(e) = stream.close(None).await {
            tracing::debug!(url = %self.url, error = %e, "Error closing DevTools session");
        }
    }

    async fn read_response(stream: &mut WsStream, id: u64) -> Result<Value, CdpError> {
        while let Some(message) = stream.next().await {
            let text = match message.map_err(|e| CdpError::Connection(e.to_string()))? {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let incoming: Incoming = match serde_json::from_str(&text) {
                Ok(incoming) => incoming,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unparseable DevTools frame");
                    continue;
                }
            };

            if incoming.id != Some(id) {
                continue;
            }
            if let Some(error) = incoming.error {
                return Err(CdpError::Protocol(format!("{} ({})", error.message, error.code)));
            }
            return Ok(incoming.result.unwrap_or(Value::Null));
        }

        Err(CdpError::Connection("DevTools session closed".into()))
    }
}

/// Ask the browser on `port` to exit via the browser-level `Browser.close`.
pub async fn close_browser(port: u16, call_timeout: Duration) -> Result<(), CdpError> {
    let version = CdpApi::new(port).version().await?;
    let url = version
        .web_socket_debugger_url
        .ok_or(CdpError::NoTarget { port })?;
    let client = CdpClient::connect(&url, call_timeout).await?;
    let result = client.call("Browser.close", json!({})).await;
    client.close().await;
    match result {
        // The browser may drop the socket before answering.
        Ok(_) | Err(CdpError::Connection(_)) => Ok(()),
        Err(e) => Err(e),
    }
}
