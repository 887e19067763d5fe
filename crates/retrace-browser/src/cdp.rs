//! Minimal CDP websocket client

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Correlates CDP command responses by id and queues interleaved events.
pub struct CdpClient {
    socket: WsStream,
    next_id: i64,
    queued_events: VecDeque<Value>,
    queued_responses: HashMap<i64, Value>,
}

impl CdpClient {
    pub async fn connect(ws_endpoint: &str) -> Result<Self> {
        let (socket, _) = connect_async(ws_endpoint)
            .await
            .map_err(|error| anyhow!("failed to connect to CDP endpoint: {}", error))?;
        Ok(Self {
            socket,
            next_id: 0,
            queued_events: VecDeque::new(),
            queued_responses: HashMap::new(),
        })
    }

    pub async fn send_command(
        &mut self,
        session_id: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<Value> {
        self.next_id += 1;
        let request_id = self.next_id;

        let mut request = serde_json::Map::new();
        request.insert("id".to_string(), json!(request_id));
        request.insert("method".to_string(), Value::String(method.to_string()));
        request.insert("params".to_string(), params);
        if let Some(session_id) = session_id {
            request.insert(
                "sessionId".to_string(),
                Value::String(session_id.to_string()),
            );
        }

        self.socket
            .send(Message::Text(Value::Object(request).to_string().into()))
            .await
            .map_err(|error| anyhow!("failed to send CDP command '{}': {}", method, error))?;

        if let Some(payload) = self.queued_responses.remove(&request_id) {
            return Self::extract_command_result(method, payload);
        }

        loop {
            let payload = self.read_json_message().await?;

            let Some(response_id) = payload.get("id").and_then(Value::as_i64) else {
                self.queued_events.push_back(payload);
                continue;
            };

            if response_id != request_id {
                self.queued_responses.insert(response_id, payload);
                continue;
            }

            return Self::extract_command_result(method, payload);
        }
    }

    /// Pop one queued or freshly-arrived event; `None` on timeout.
    pub async fn poll_event(&mut self, timeout_window: Duration) -> Result<Option<Value>> {
        if let Some(event) = self.queued_events.pop_front() {
            return Ok(Some(event));
        }

        let payload = match timeout(timeout_window, self.read_json_message()).await {
            Ok(result) => result?,
            Err(_) => return Ok(None),
        };

        if let Some(response_id) = payload.get("id").and_then(Value::as_i64) {
            self.queued_responses.insert(response_id, payload);
            return Ok(None);
        }

        Ok(Some(payload))
    }

    fn extract_command_result(method: &str, payload: Value) -> Result<Value> {
        if let Some(error) = payload.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown CDP error")
                .to_string();
            bail!("CDP command '{}' failed: {}", method, message);
        }

        Ok(payload.get("result").cloned().unwrap_or_else(|| json!({})))
    }

    async fn read_json_message(&mut self) -> Result<Value> {
        loop {
            let message = self
                .socket
                .next()
                .await
                .ok_or_else(|| anyhow!("CDP websocket stream ended"))?
                .map_err(|error| anyhow!("CDP websocket read failed: {}", error))?;

            let text = match message {
                Message::Text(text) => text.to_string(),
                Message::Binary(bytes) => String::from_utf8(bytes.to_vec())
                    .map_err(|error| anyhow!("invalid UTF-8 CDP payload: {}", error))?,
                Message::Ping(payload) => {
                    self.socket.send(Message::Pong(payload)).await?;
                    continue;
                }
                Message::Pong(_) => continue,
                Message::Close(_) => bail!("CDP websocket closed by peer"),
                Message::Frame(_) => continue,
            };

            let value = serde_json::from_str::<Value>(&text)
                .map_err(|error| anyhow!("invalid CDP JSON payload: {}", error))?;
            return Ok(value);
        }
    }
}
