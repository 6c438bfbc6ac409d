//! Push channel wire protocol
//!
//! Every frame is a JSON envelope `{type, searchId, timestamp, payload}`.
//! `type` selects one variant of the closed [`ChannelMessage`] union; an
//! unknown `type` fails to decode instead of being silently ignored.

use super::progress_types::{CompletionPayload, ErrorPayload, ProgressSnapshot, StageUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Message kinds accepted on the push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    GetProgress,
    ProgressUpdate,
    StageUpdate,
    Error,
    Completion,
    Heartbeat,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetProgress => "get_progress",
            Self::ProgressUpdate => "progress_update",
            Self::StageUpdate => "stage_update",
            Self::Error => "error",
            Self::Completion => "completion",
            Self::Heartbeat => "heartbeat",
        }
    }
}

/// Typed message body
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    /// Client asks for a fresh progress snapshot
    GetProgress,
    /// Full progress snapshot
    ProgressUpdate(ProgressSnapshot),
    /// Partial update of one stage
    StageUpdate(StageUpdate),
    /// Categorized error; does not close the channel by itself
    Error(ErrorPayload),
    /// Run finished; carries final results
    Completion(CompletionPayload),
    /// Liveness ping (both directions)
    Heartbeat,
}

impl ChannelMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::GetProgress => MessageKind::GetProgress,
            Self::ProgressUpdate(_) => MessageKind::ProgressUpdate,
            Self::StageUpdate(_) => MessageKind::StageUpdate,
            Self::Error(_) => MessageKind::Error,
            Self::Completion(_) => MessageKind::Completion,
            Self::Heartbeat => MessageKind::Heartbeat,
        }
    }
}

/// Envelope wrapping every push channel frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope", into = "RawEnvelope")]
pub struct Envelope {
    pub search_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub message: ChannelMessage,
}

impl Envelope {
    /// Wrap a message for `search_id`, stamped with the current time
    pub fn new(search_id: Uuid, message: ChannelMessage) -> Self {
        Self {
            search_id,
            timestamp: Utc::now(),
            message,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.message.kind()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Untyped wire form of [`Envelope`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: MessageKind,
    search_id: Uuid,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    payload: Value,
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = serde_json::Error;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        let message = match raw.kind {
            MessageKind::GetProgress => ChannelMessage::GetProgress,
            MessageKind::Heartbeat => ChannelMessage::Heartbeat,
            MessageKind::ProgressUpdate => {
                ChannelMessage::ProgressUpdate(serde_json::from_value(raw.payload)?)
            }
            MessageKind::StageUpdate => {
                ChannelMessage::StageUpdate(serde_json::from_value(raw.payload)?)
            }
            MessageKind::Error => ChannelMessage::Error(serde_json::from_value(raw.payload)?),
            MessageKind::Completion => {
                ChannelMessage::Completion(serde_json::from_value(raw.payload)?)
            }
        };

        Ok(Envelope {
            search_id: raw.search_id,
            timestamp: raw.timestamp,
            message,
        })
    }
}

impl From<Envelope> for RawEnvelope {
    fn from(envelope: Envelope) -> Self {
        let kind = envelope.kind();
        // Payload types are plain data structs; serializing them cannot fail.
        let payload = match envelope.message {
            ChannelMessage::GetProgress | ChannelMessage::Heartbeat => Value::Null,
            ChannelMessage::ProgressUpdate(snapshot) => {
                serde_json::to_value(snapshot).unwrap_or(Value::Null)
            }
            ChannelMessage::StageUpdate(update) => {
                serde_json::to_value(update).unwrap_or(Value::Null)
            }
            ChannelMessage::Error(error) => serde_json::to_value(error).unwrap_or(Value::Null),
            ChannelMessage::Completion(completion) => {
                serde_json::to_value(completion).unwrap_or(Value::Null)
            }
        };

        RawEnvelope {
            kind,
            search_id: envelope.search_id,
            timestamp: envelope.timestamp,
            payload,
        }
    }
}
