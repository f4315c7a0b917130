use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use huddle_core::{ClientMessage, ServerMessage};

use super::RECV_TIMEOUT_MS;

/// Thin WebSocket client speaking the coordinator protocol end to end.
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _) = connect_async(url).await.context("connect failed")?;
        Ok(Self { stream })
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<()> {
        let json = serde_json::to_string(message)?;
        self.stream
            .send(Message::Text(json.into()))
            .await
            .context("send failed")
    }

    /// Next protocol message, skipping transport frames.
    pub async fn recv(&mut self) -> Result<ServerMessage> {
        loop {
            let frame = timeout(Duration::from_millis(RECV_TIMEOUT_MS), self.stream.next())
                .await
                .context("timed out waiting for a frame")?;
            match frame {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text).context("unparseable server message");
                }
                Some(Ok(Message::Close(_))) | None => bail!("server closed the connection"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e).context("websocket error"),
            }
        }
    }

    /// Next message matching the predicate, skipping the rest.
    pub async fn expect<F>(&mut self, what: &str, matches: F) -> Result<ServerMessage>
    where
        F: Fn(&ServerMessage) -> bool,
    {
        loop {
            let message = self
                .recv()
                .await
                .with_context(|| format!("waiting for {what}"))?;
            if matches(&message) {
                return Ok(message);
            }
        }
    }
}
