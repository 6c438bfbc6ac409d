//! WebSocket connector and HTTP cancel endpoint

use super::transport::{CancelEndpoint, Connection, Connector, TransportError};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use uuid::Uuid;

/// Connects to `{base_url}/search/{search_id}/ws`
///
/// `base_url` uses the `ws://` or `wss://` scheme.
#[derive(Debug, Clone)]
pub struct WsConnector {
    base_url: String,
}

impl WsConnector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, search_id: Uuid) -> String {
        format!("{}/search/{}/ws", self.base_url, search_id)
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, search_id: Uuid) -> Result<Box<dyn Connection>, TransportError> {
        let url = self.url_for(search_id);
        info!(search_id = %search_id, url = %url, "Connecting progress channel");

        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => {
                    return Some(
                        String::from_utf8(bytes)
                            .map_err(|e| TransportError::Receive(e.to_string())),
                    )
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Peer closed progress channel");
                    return None;
                }
                // Ping/pong handled by tungstenite
                Ok(_) => continue,
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

/// Calls `POST {base_url}/search/{search_id}/cancel`
#[derive(Debug, Clone)]
pub struct HttpCancelEndpoint {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCancelEndpoint {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TransportError::Cancel(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CancelEndpoint for HttpCancelEndpoint {
    async fn cancel(&self, search_id: Uuid) -> Result<(), TransportError> {
        let url = format!("{}/search/{}/cancel", self.base_url, search_id);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| TransportError::Cancel(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Cancel(format!("{}: {}", status, body)));
        }

        info!(search_id = %search_id, "Cancel endpoint acknowledged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_strips_trailing_slash() {
        let connector = WsConnector::new("ws://127.0.0.1:5740/");
        let id = Uuid::nil();
        assert_eq!(
            connector.url_for(id),
            "ws://127.0.0.1:5740/search/00000000-0000-0000-0000-000000000000/ws"
        );
    }
}
