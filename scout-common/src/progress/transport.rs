//! Transport seams for the progress channel
//!
//! The channel worker only talks to these traits; the WebSocket and HTTP
//! implementations live in [`super::ws`].

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Transport-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Cancel request failed: {0}")]
    Cancel(String),
}

/// Opens connections for a search session
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, search_id: Uuid) -> Result<Box<dyn Connection>, TransportError>;
}

/// One open, text-framed, bidirectional connection
///
/// `recv` must be cancel-safe: the worker polls it inside `tokio::select!`.
#[async_trait]
pub trait Connection: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Next text frame; `None` once the peer has closed the connection
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    async fn close(&mut self);
}

/// External endpoint that stops a running search
#[async_trait]
pub trait CancelEndpoint: Send + Sync {
    async fn cancel(&self, search_id: Uuid) -> Result<(), TransportError>;
}
