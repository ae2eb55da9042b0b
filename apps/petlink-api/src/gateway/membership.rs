//! Authorization-checked conversation room membership.

use crate::db::store::ChatStore;
use crate::error::JoinError;
use crate::gateway::fanout::Dispatcher;
use crate::gateway::rooms::Room;
use crate::gateway::session::GatewaySession;

/// Joins and leaves conversation rooms on behalf of a connection.
///
/// The participation record is consulted on every join; nothing is cached
/// between attempts.
pub struct MembershipManager<'a> {
    store: &'a dyn ChatStore,
    dispatcher: &'a Dispatcher,
}

impl<'a> MembershipManager<'a> {
    pub fn new(store: &'a dyn ChatStore, dispatcher: &'a Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// Add the connection to `conversation:<id>` if its identity participates.
    /// On denial the connection's rooms are left unchanged.
    pub async fn join_conversation(
        &self,
        session: &mut GatewaySession,
        conversation_id: &str,
    ) -> Result<(), JoinError> {
        let allowed = self
            .store
            .is_participant(conversation_id, session.user_id())
            .await?;
        if !allowed {
            return Err(JoinError::AccessDenied);
        }

        self.dispatcher
            .join(&session.conn_id, Room::conversation(conversation_id));
        session.set_conversation_count(self.dispatcher.conversation_count(&session.conn_id));
        Ok(())
    }

    /// Remove the connection from `conversation:<id>`. Leaving a room that was
    /// never joined is a no-op.
    pub fn leave_conversation(&self, session: &mut GatewaySession, conversation_id: &str) {
        self.dispatcher
            .leave(&session.conn_id, &Room::conversation(conversation_id));
        session.set_conversation_count(self.dispatcher.conversation_count(&session.conn_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::user::Identity;

    async fn setup() -> (MemoryStore, String, Identity, Identity) {
        let store = MemoryStore::default();
        let tutor = store.create_user("tutor@x.com", Some("Tutor"), "h").await.unwrap();
        let adopter = store.create_user("adopter@x.com", Some("Adopter"), "h").await.unwrap();
        let (conversation, _) = store
            .find_or_create_conversation(&tutor.id, &adopter.id)
            .await
            .unwrap();
        (
            store,
            conversation.id,
            Identity::from(&tutor),
            Identity::from(&adopter),
        )
    }

    #[tokio::test]
    async fn participant_joins_outsider_is_denied() {
        let (store, conversation_id, tutor, _) = setup().await;
        let outsider = store.create_user("out@x.com", None, "h").await.unwrap();
        let dispatcher = Dispatcher::new();
        let manager = MembershipManager::new(&store, &dispatcher);

        let _rx = dispatcher.register("conn_t", &tutor.id);
        let mut session = GatewaySession::new("conn_t".into(), tutor);
        manager.join_conversation(&mut session, &conversation_id).await.unwrap();
        assert!(dispatcher
            .rooms_of("conn_t")
            .contains(&Room::conversation(&conversation_id)));

        let _rx = dispatcher.register("conn_o", &outsider.id);
        let mut session = GatewaySession::new("conn_o".into(), Identity::from(&outsider));
        for _ in 0..2 {
            let err = manager
                .join_conversation(&mut session, &conversation_id)
                .await
                .unwrap_err();
            assert!(matches!(err, JoinError::AccessDenied));
        }
        assert_eq!(dispatcher.rooms_of("conn_o").len(), 1);
    }

    #[tokio::test]
    async fn leave_is_idempotent() {
        let (store, conversation_id, _, adopter) = setup().await;
        let dispatcher = Dispatcher::new();
        let manager = MembershipManager::new(&store, &dispatcher);

        let _rx = dispatcher.register("conn_a", &adopter.id);
        let mut session = GatewaySession::new("conn_a".into(), adopter);
        manager.leave_conversation(&mut session, &conversation_id);

        manager.join_conversation(&mut session, &conversation_id).await.unwrap();
        manager.leave_conversation(&mut session, &conversation_id);
        manager.leave_conversation(&mut session, &conversation_id);
        assert_eq!(dispatcher.conversation_count("conn_a"), 0);
    }
}
