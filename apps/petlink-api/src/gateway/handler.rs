//! Inbound event dispatch for an authenticated connection.

use crate::gateway::events::{AckArgs, ClientEvent};
use crate::gateway::membership::MembershipManager;
use crate::gateway::session::GatewaySession;
use crate::AppState;

/// Run the handler for one validated event and return the ack arguments.
pub async fn handle_event(
    state: &AppState,
    session: &mut GatewaySession,
    event: ClientEvent,
) -> AckArgs {
    let membership = MembershipManager::new(state.store.as_ref(), &state.dispatcher);

    match event {
        ClientEvent::ConversationJoin { conversation_id } => {
            match membership.join_conversation(session, &conversation_id).await {
                Ok(()) => {
                    tracing::info!(
                        conn_id = %session.conn_id,
                        user_id = %session.user_id(),
                        %conversation_id,
                        "joined conversation room"
                    );
                    AckArgs::ok()
                }
                Err(err) => {
                    tracing::warn!(
                        conn_id = %session.conn_id,
                        user_id = %session.user_id(),
                        %conversation_id,
                        reason = %err,
                        "conversation join rejected"
                    );
                    AckArgs::failed(err.ack_message())
                }
            }
        }
        ClientEvent::ConversationLeave { conversation_id } => {
            membership.leave_conversation(session, &conversation_id);
            tracing::info!(
                conn_id = %session.conn_id,
                user_id = %session.user_id(),
                %conversation_id,
                "left conversation room"
            );
            AckArgs::ok()
        }
        // Delivery scope is the only gate: a non-member reaches nobody.
        ClientEvent::MessageTyping { conversation_id } => {
            let recipients = state.dispatcher.emit_typing(
                &conversation_id,
                session.user_id(),
                &session.conn_id,
            );
            tracing::trace!(
                conn_id = %session.conn_id,
                %conversation_id,
                recipients,
                "typing relayed"
            );
            AckArgs::empty()
        }
    }
}
