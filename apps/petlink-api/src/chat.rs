//! Conversation and message operations shared by the REST routes.
//!
//! Every broadcast happens after the corresponding write returned, so a
//! client never sees `message:new` or `conversation:new` for something that
//! is not stored.

use crate::db::store::{ChatStore, Page, SortOrder};
use crate::error::{ApiError, ACCESS_DENIED_MESSAGE};
use crate::gateway::fanout::Dispatcher;
use crate::models::conversation::{Conversation, ConversationSummary};
use crate::models::message::Message;

/// Where the two sides of a new conversation come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationSubject {
    /// Tutor is the pet's owner, adopter is the caller.
    Pet(String),
    /// Tutor is the pet's owner, adopter is the process applicant.
    AdoptionProcess(String),
}

pub struct ChatService<'a> {
    store: &'a dyn ChatStore,
    dispatcher: &'a Dispatcher,
}

impl<'a> ChatService<'a> {
    pub fn new(store: &'a dyn ChatStore, dispatcher: &'a Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// Find the tutor/adopter conversation for `subject`, creating it when
    /// needed, and optionally append `initial_message` from the caller.
    pub async fn create_or_get_conversation(
        &self,
        caller_id: &str,
        subject: ConversationSubject,
        initial_message: Option<&str>,
    ) -> Result<Conversation, ApiError> {
        let (tutor_id, adopter_id) = match subject {
            ConversationSubject::Pet(pet_id) => {
                let owner = self
                    .store
                    .find_pet_owner(&pet_id)
                    .await?
                    .ok_or_else(|| ApiError::not_found("pet não encontrado"))?;
                (owner, caller_id.to_string())
            }
            ConversationSubject::AdoptionProcess(process_id) => {
                let parties = self
                    .store
                    .find_adoption_parties(&process_id)
                    .await?
                    .ok_or_else(|| ApiError::not_found("processo de adoção não encontrado"))?;
                (parties.tutor_id, parties.adopter_id)
            }
        };

        if tutor_id == adopter_id {
            return Err(ApiError::bad_request(
                "tutor e adotante não podem ser o mesmo",
            ));
        }

        let (conversation, created) = self
            .store
            .find_or_create_conversation(&tutor_id, &adopter_id)
            .await?;

        if created {
            let notified = self.dispatcher.emit_conversation_new(&conversation);
            tracing::info!(
                conversation_id = %conversation.id,
                %tutor_id,
                %adopter_id,
                notified,
                "conversation created"
            );
        }

        if let Some(content) = initial_message {
            let message = self
                .store
                .append_message(&conversation.id, caller_id, content)
                .await?;
            self.dispatcher.emit_message_new(&message);
        }

        Ok(conversation)
    }

    pub async fn list_my_conversations(
        &self,
        user_id: &str,
        page: Page,
    ) -> Result<(i64, Vec<ConversationSummary>), ApiError> {
        Ok(self.store.list_conversations(user_id, page).await?)
    }

    pub async fn assert_participant(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<(), ApiError> {
        if self.store.is_participant(conversation_id, user_id).await? {
            Ok(())
        } else {
            Err(ApiError::forbidden(ACCESS_DENIED_MESSAGE))
        }
    }

    pub async fn get_messages(
        &self,
        conversation_id: &str,
        user_id: &str,
        page: Page,
        order: SortOrder,
    ) -> Result<(i64, Vec<Message>), ApiError> {
        self.assert_participant(conversation_id, user_id).await?;
        Ok(self.store.list_messages(conversation_id, page, order).await?)
    }

    /// Append a message from a participant and broadcast it to the
    /// conversation room.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<Message, ApiError> {
        self.assert_participant(conversation_id, user_id).await?;

        let message = self
            .store
            .append_message(conversation_id, user_id, content)
            .await?;

        let recipients = self.dispatcher.emit_message_new(&message);
        tracing::debug!(
            %conversation_id,
            message_id = %message.id,
            recipients,
            "message stored and broadcast"
        );
        Ok(message)
    }
}
