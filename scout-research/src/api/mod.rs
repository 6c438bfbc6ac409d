//! HTTP API handlers for scout-research
//!
//! REST endpoints for submitting and managing searches plus the WebSocket
//! push channel that streams run progress.

pub mod health;
pub mod search;
pub mod ws;

pub use health::health_routes;
pub use search::search_routes;
pub use ws::progress_socket;
