//! In-process DevTools stub: serves `/json/version` and `/json/list`
//! over HTTP and answers WebSocket commands through a handler, all on
//! one port like a real debug endpoint.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

/// Maps `(method, params)` to the response body (`{"result": ..}` or
/// `{"error": ..}`); `None` leaves the command unanswered.
type Handler = Arc<dyn Fn(&str, &Value) -> Option<Value> + Send + Sync>;

pub struct StubServer {
    pub port: u16,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl StubServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Option<Value> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let handler: Handler = Arc::new(handler);

        let task_calls = calls.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = handler.clone();
                let calls = task_calls.clone();
                tokio::spawn(serve(stream, port, handler, calls));
            }
        });

        Self { port, calls }
    }

    /// Methods and params received over WebSocket, in order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    /// Expressions passed to `Runtime.evaluate`, in order.
    pub fn expressions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(method, _)| method == "Runtime.evaluate")
            .filter_map(|(_, params)| params["expression"].as_str().map(str::to_string))
            .collect()
    }
}

/// Response body for an evaluation returning `value`.
pub fn evaluated(value: Value) -> Option<Value> {
    Some(json!({ "result": { "result": { "type": "object", "value": value } } }))
}

/// Response body for an evaluation that threw `description`.
pub fn thrown(description: &str) -> Option<Value> {
    Some(json!({
        "result": {
            "result": { "type": "object", "subtype": "error", "description": description },
            "exceptionDetails": {
                "exceptionId": 1,
                "text": "Uncaught",
                "lineNumber": 0,
                "columnNumber": 0,
                "exception": { "type": "object", "subtype": "error", "description": description }
            }
        }
    }))
}

async fn serve(
    mut stream: TcpStream,
    port: u16,
    handler: Handler,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
) {
    let mut peek = [0u8; 16];
    let Ok(n) = stream.peek(&mut peek).await else {
        return;
    };
    if peek[..n].starts_with(b"GET /json") {
        serve_http(stream, port).await;
    } else {
        serve_ws(stream, handler, calls).await;
    }
}

async fn serve_http(mut stream: TcpStream, port: u16) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
    let request = String::from_utf8_lossy(&request);

    let body = if request.starts_with("GET /json/version") {
        json!({
            "Browser": "Chrome/120.0.6099.291",
            "Protocol-Version": "1.3",
            "webSocketDebuggerUrl": format!("ws://127.0.0.1:{port}/devtools/browser/stub"),
        })
    } else {
        json!([{
            "id": "PAGE1",
            "type": "page",
            "title": "LinkedHelper",
            "url": "file:///app/index.html",
            "webSocketDebuggerUrl": format!("ws://127.0.0.1:{port}/devtools/page/PAGE1"),
        }])
    }
    .to_string();

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

async fn serve_ws(stream: TcpStream, handler: Handler, calls: Arc<Mutex<Vec<(String, Value)>>>) {
    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };

    while let Some(Ok(message)) = ws.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(request) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        let method = request["method"].as_str().unwrap_or_default().to_string();
        let params = request["params"].clone();
        calls.lock().unwrap().push((method.clone(), params.clone()));

        // An unrelated event first, as real targets interleave them.
        let event = json!({ "method": "Runtime.consoleAPICalled", "params": {} });
        if ws.send(Message::Text(event.to_string())).await.is_err() {
            return;
        }

        if let Some(mut body) = handler(&method, &params) {
            body["id"] = request["id"].clone();
            if ws.send(Message::Text(body.to_string())).await.is_err() {
                return;
            }
        }
    }
}
