//! Push channel endpoint: GET /search/:id/ws
//!
//! Forwards event bus envelopes for one search id to a WebSocket client and
//! answers `get_progress` requests with the stored state. A heartbeat is sent
//! at a fixed interval. A client that lags behind the bus gets a fresh
//! snapshot instead of the missed deltas.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use scout_common::events::{ChannelMessage, CompletionPayload, Envelope};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    db::{candidates::load_candidates, sessions},
    error::{ApiError, ApiResult},
    models::SearchState,
    AppState,
};

/// GET /search/:id/ws
///
/// Unknown search ids are rejected with 404 before the upgrade.
pub async fn progress_socket(
    State(state): State<AppState>,
    Path(search_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    if sessions::load_session(&state.db, search_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Search not found: {}", search_id)));
    }

    info!(search_id = %search_id, "Progress channel connected");
    Ok(ws.on_upgrade(move |socket| run_socket(socket, state, search_id)))
}

async fn run_socket(socket: WebSocket, state: AppState, search_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.event_bus.subscribe();
    let mut heartbeat = tokio::time::interval(state.progress.heartbeat_interval());
    // The first tick completes immediately
    heartbeat.tick().await;

    loop {
        let outbound: Vec<ChannelMessage> = tokio::select! {
            _ = heartbeat.tick() => vec![ChannelMessage::Heartbeat],

            event = events.recv() => match event {
                Ok(envelope) if envelope.search_id == search_id => vec![envelope.message],
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(search_id = %search_id, skipped, "Progress channel lagged; resending snapshot");
                    current_state(&state, search_id).await
                }
                Err(RecvError::Closed) => break,
            },

            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => handle_inbound(&state, search_id, &text).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    debug!(search_id = %search_id, error = %e, "Progress channel receive failed");
                    break;
                }
            },
        };

        for message in outbound {
            let json = match Envelope::new(search_id, message).to_json() {
                Ok(json) => json,
                Err(e) => {
                    warn!(search_id = %search_id, error = %e, "Failed to serialize envelope");
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                debug!(search_id = %search_id, "Progress channel closed by peer");
                return;
            }
        }
    }

    info!(search_id = %search_id, "Progress channel disconnected");
}

/// Reply to one client message
async fn handle_inbound(state: &AppState, search_id: Uuid, text: &str) -> Vec<ChannelMessage> {
    let envelope = match Envelope::from_json(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(search_id = %search_id, error = %e, "Ignoring malformed channel message");
            return Vec::new();
        }
    };

    match envelope.message {
        ChannelMessage::GetProgress => current_state(state, search_id).await,
        ChannelMessage::Heartbeat => Vec::new(),
        other => {
            debug!(
                search_id = %search_id,
                kind = other.kind().as_str(),
                "Ignoring server-only message kind from client"
            );
            Vec::new()
        }
    }
}

/// Snapshot of the stored session, plus its terminal frame when finished
///
/// Cancelled runs get a completion flagged `cancelled` so clients close
/// without reconnecting.
async fn current_state(state: &AppState, search_id: Uuid) -> Vec<ChannelMessage> {
    let session = match sessions::load_session(&state.db, search_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(search_id = %search_id, error = %e, "Failed to load session for snapshot");
            return Vec::new();
        }
    };

    let mut messages = vec![ChannelMessage::ProgressUpdate(session.snapshot())];

    match session.state {
        SearchState::Completed => match load_candidates(&state.db, search_id).await {
            Ok(candidates) => messages.push(ChannelMessage::Completion(CompletionPayload {
                results: serde_json::json!({ "candidates": candidates }),
                stats: session.stats.unwrap_or_default(),
                warnings: Vec::new(),
                cancelled: false,
            })),
            Err(e) => {
                warn!(search_id = %search_id, error = %e, "Failed to load stored candidates");
            }
        },
        SearchState::Failed => {
            if let Some(error) = session.error {
                messages.push(ChannelMessage::Error(error));
            }
        }
        SearchState::Cancelled => messages.push(ChannelMessage::Completion(
            CompletionPayload::cancelled(session.stats.unwrap_or_default()),
        )),
        _ => {}
    }

    messages
}
