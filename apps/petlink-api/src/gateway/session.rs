//! Per-connection gateway session state.

use crate::models::user::Identity;

/// Lifecycle of a realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Authenticated,
    /// Member of this many conversation rooms.
    Joined(usize),
    Disconnected,
}

/// State for a single WebSocket connection.
///
/// Only constructed after the upgrade request authenticated, so every live
/// session carries an [`Identity`].
pub struct GatewaySession {
    /// Unique connection identifier (`conn_` prefixed ULID).
    pub conn_id: String,
    /// Identity resolved at upgrade time; fixed for the connection's life.
    pub identity: Identity,
    state: ConnectionState,
}

impl GatewaySession {
    pub fn new(conn_id: String, identity: Identity) -> Self {
        Self {
            conn_id,
            identity,
            state: ConnectionState::Authenticated,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.identity.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Record how many conversation rooms the connection now belongs to.
    pub fn set_conversation_count(&mut self, count: usize) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        self.state = if count == 0 {
            ConnectionState::Authenticated
        } else {
            ConnectionState::Joined(count)
        };
    }

    pub fn mark_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
    }
}
