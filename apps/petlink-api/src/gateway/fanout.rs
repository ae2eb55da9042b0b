//! Room-scoped fanout of server events to connected sessions.
//!
//! Every live connection registers a bounded outbound queue. The room table
//! and the queue map sit behind one `parking_lot::Mutex`, so register, join,
//! leave and unregister are atomic with respect to each other and to the
//! member snapshot taken by an emit.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::gateway::events::{EventName, ServerFrame, TypingPayload};
use crate::gateway::rooms::{Room, RoomTable};
use crate::models::conversation::Conversation;
use crate::models::message::Message;

/// Capacity of each connection's outbound queue. A frame addressed to a full
/// queue is dropped.
pub const OUTBOUND_CAPACITY: usize = 256;

pub type OutboundFrame = Arc<ServerFrame>;

#[derive(Default)]
struct Hub {
    rooms: RoomTable,
    outbound: HashMap<String, mpsc::Sender<OutboundFrame>>,
}

/// Handle to the process-wide dispatcher. Cloneable; store in `AppState`.
#[derive(Clone, Default)]
pub struct Dispatcher {
    hub: Arc<Mutex<Hub>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an authenticated connection and join it to `user:<user_id>`.
    pub fn register(&self, conn_id: &str, user_id: &str) -> mpsc::Receiver<OutboundFrame> {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let mut hub = self.hub.lock();
        hub.outbound.insert(conn_id.to_string(), tx);
        hub.rooms.join(conn_id, Room::personal(user_id));
        rx
    }

    /// Remove a connection and release all of its rooms in one step.
    pub fn unregister(&self, conn_id: &str) -> Vec<Room> {
        let mut hub = self.hub.lock();
        hub.outbound.remove(conn_id);
        hub.rooms.remove_connection(conn_id)
    }

    /// Add a registered connection to `room`. Unknown connections are ignored
    /// and `false` is returned.
    pub fn join(&self, conn_id: &str, room: Room) -> bool {
        let mut hub = self.hub.lock();
        if !hub.outbound.contains_key(conn_id) {
            return false;
        }
        hub.rooms.join(conn_id, room);
        true
    }

    pub fn leave(&self, conn_id: &str, room: &Room) -> bool {
        self.hub.lock().rooms.leave(conn_id, room)
    }

    pub fn rooms_of(&self, conn_id: &str) -> HashSet<Room> {
        self.hub.lock().rooms.rooms_of(conn_id)
    }

    pub fn conversation_count(&self, conn_id: &str) -> usize {
        self.hub.lock().rooms.conversation_count(conn_id)
    }

    /// Drop every outbound queue so each connection loop ends with
    /// "server shutting down". Returns how many connections were live.
    pub fn close_all(&self) -> usize {
        let mut hub = self.hub.lock();
        let live = hub.outbound.len();
        hub.outbound.clear();
        hub.rooms = RoomTable::default();
        live
    }

    pub fn connection_count(&self) -> usize {
        self.hub.lock().outbound.len()
    }

    /// Queue `event` for every member of `room` except `except`.
    /// Returns the number of connections the frame was queued for.
    pub fn emit_to_room(
        &self,
        room: &Room,
        event: &'static str,
        data: Value,
        except: Option<&str>,
    ) -> usize {
        let frame = Arc::new(ServerFrame::event(event, data));

        let targets: Vec<(String, mpsc::Sender<OutboundFrame>)> = {
            let hub = self.hub.lock();
            hub.rooms
                .members(room)
                .filter(|conn_id| Some(conn_id.as_str()) != except)
                .filter_map(|conn_id| {
                    hub.outbound
                        .get(conn_id)
                        .map(|tx| (conn_id.clone(), tx.clone()))
                })
                .collect()
        };

        if targets.is_empty() {
            tracing::debug!(room = %room, event, "emit to room without recipients");
            return 0;
        }

        let mut delivered = 0;
        for (conn_id, tx) in targets {
            match tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(%conn_id, room = %room, event, "outbound queue full, dropping frame");
                }
                // Connection is tearing down; unregister follows.
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    /// Broadcast a stored message to its conversation room.
    pub fn emit_message_new(&self, message: &Message) -> usize {
        let room = Room::conversation(&message.conversation_id);
        self.emit_to_room(&room, EventName::MESSAGE_NEW, to_value(message), None)
    }

    /// Announce a newly created conversation to each participant's personal room.
    pub fn emit_conversation_new(&self, conversation: &Conversation) -> usize {
        let data = to_value(conversation);
        conversation
            .participant_ids()
            .map(|user_id| {
                self.emit_to_room(
                    &Room::personal(user_id),
                    EventName::CONVERSATION_NEW,
                    data.clone(),
                    None,
                )
            })
            .sum()
    }

    /// Relay a typing signal to the conversation room, excluding the sender.
    pub fn emit_typing(&self, conversation_id: &str, user_id: &str, sender_conn: &str) -> usize {
        let payload = TypingPayload {
            user_id: user_id.to_string(),
        };
        self.emit_to_room(
            &Room::conversation(conversation_id),
            EventName::MESSAGE_TYPING,
            to_value(&payload),
            Some(sender_conn),
        )
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        tracing::error!(?e, "event payload serialization failed");
        Value::Null
    })
}
