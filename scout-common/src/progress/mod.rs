//! Client-side progress channel
//!
//! One [`ProgressChannel`] per research run. It connects to the service's
//! push endpoint, reconnects with backoff on unexpected drops, queues
//! outbound messages while disconnected and turns inbound frames into a
//! typed [`ChannelEvent`] stream.

mod channel;
mod policy;
mod session;
mod transport;
mod ws;

pub use channel::{ChannelError, ChannelEvent, ProgressChannel};
pub use policy::{ChannelConfig, ReconnectPolicy};
pub use session::{ConnectionStatus, ProgressSession};
pub use transport::{CancelEndpoint, Connection, Connector, TransportError};
pub use ws::{HttpCancelEndpoint, WsConnector};
