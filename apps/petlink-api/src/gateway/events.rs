//! Realtime event names and wire-format frames.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Event names exchanged over the realtime socket.
pub struct EventName;

impl EventName {
    pub const CONVERSATION_JOIN: &'static str = "conversation:join";
    pub const CONVERSATION_LEAVE: &'static str = "conversation:leave";
    pub const CONVERSATION_NEW: &'static str = "conversation:new";
    pub const MESSAGE_TYPING: &'static str = "message:typing";
    pub const MESSAGE_NEW: &'static str = "message:new";
}

/// Ack message for frames that name an unknown event or carry a bad payload.
pub const INVALID_EVENT_MESSAGE: &str = "Evento inválido";

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// A raw frame received from the client.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub ack: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPayload {
    pub conversation_id: String,
}

/// Inbound events, validated at the dispatch boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    ConversationJoin { conversation_id: String },
    ConversationLeave { conversation_id: String },
    MessageTyping { conversation_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventParseError {
    UnknownEvent(String),
    InvalidPayload { event: &'static str, reason: String },
}

impl fmt::Display for EventParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventParseError::UnknownEvent(name) => write!(f, "unknown event {name:?}"),
            EventParseError::InvalidPayload { event, reason } => {
                write!(f, "invalid payload for {event}: {reason}")
            }
        }
    }
}

fn conversation_id(event: &'static str, data: Value) -> Result<String, EventParseError> {
    let payload: ConversationPayload =
        serde_json::from_value(data).map_err(|e| EventParseError::InvalidPayload {
            event,
            reason: e.to_string(),
        })?;
    if payload.conversation_id.is_empty() {
        return Err(EventParseError::InvalidPayload {
            event,
            reason: "conversationId is empty".into(),
        });
    }
    Ok(payload.conversation_id)
}

impl ClientEvent {
    pub fn parse(event: &str, data: Value) -> Result<Self, EventParseError> {
        match event {
            EventName::CONVERSATION_JOIN => Ok(ClientEvent::ConversationJoin {
                conversation_id: conversation_id(EventName::CONVERSATION_JOIN, data)?,
            }),
            EventName::CONVERSATION_LEAVE => Ok(ClientEvent::ConversationLeave {
                conversation_id: conversation_id(EventName::CONVERSATION_LEAVE, data)?,
            }),
            EventName::MESSAGE_TYPING => Ok(ClientEvent::MessageTyping {
                conversation_id: conversation_id(EventName::MESSAGE_TYPING, data)?,
            }),
            other => Err(EventParseError::UnknownEvent(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::ConversationJoin { .. } => EventName::CONVERSATION_JOIN,
            ClientEvent::ConversationLeave { .. } => EventName::CONVERSATION_LEAVE,
            ClientEvent::MessageTyping { .. } => EventName::MESSAGE_TYPING,
        }
    }

    pub fn conversation_id(&self) -> &str {
        match self {
            ClientEvent::ConversationJoin { conversation_id }
            | ClientEvent::ConversationLeave { conversation_id }
            | ClientEvent::MessageTyping { conversation_id } => conversation_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// A frame sent from the server to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Event { event: &'static str, data: Value },
    Ack { ack: u64, data: Vec<Value> },
}

impl ServerFrame {
    pub fn event(event: &'static str, data: Value) -> Self {
        ServerFrame::Event { event, data }
    }

    pub fn ack(id: u64, args: AckArgs) -> Self {
        ServerFrame::Ack {
            ack: id,
            data: args.0,
        }
    }
}

/// Arguments passed back through an acknowledgment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AckArgs(pub Vec<Value>);

impl AckArgs {
    /// `(true)`
    pub fn ok() -> Self {
        AckArgs(vec![Value::Bool(true)])
    }

    /// `(false, message)`
    pub fn failed(message: &str) -> Self {
        AckArgs(vec![Value::Bool(false), Value::String(message.to_string())])
    }

    /// `()`
    pub fn empty() -> Self {
        AckArgs(Vec::new())
    }
}

/// Payload of an outbound `message:typing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub user_id: String,
}
