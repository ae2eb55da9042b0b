//! In-memory [`ChatStore`] used by tests and by local runs without `DATABASE_URL`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use petlink_common::id::{prefix, prefixed_ulid};

use crate::db::store::{AdoptionParties, ChatStore, Page, SortOrder, StoreError};
use crate::models::conversation::{
    Conversation, ConversationRow, ConversationSummary, ParticipantProfile,
};
use crate::models::message::Message;
use crate::models::user::{Identity, UserRecord};

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserRecord>,
    /// pet id -> owner id
    pets: HashMap<String, String>,
    /// process id -> (pet id, applicant id)
    adoptions: HashMap<String, (String, String)>,
    conversations: HashMap<String, ConversationRow>,
    /// conversation id -> participant ids in join order
    participants: HashMap<String, Vec<String>>,
    /// insertion order is chronological order
    messages: Vec<Message>,
}

impl Tables {
    fn conversation(&self, id: &str) -> Option<Conversation> {
        let row = self.conversations.get(id)?.clone();
        let ids = self.participants.get(id).cloned().unwrap_or_default();
        Some(Conversation::from_row(row, ids))
    }
}

pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Register a pet listing owned by `owner_id`.
    pub fn insert_pet(&self, pet_id: &str, owner_id: &str) {
        self.tables
            .lock()
            .pets
            .insert(pet_id.to_string(), owner_id.to_string());
    }

    /// Register an adoption process of `pet_id` opened by `adopter_id`.
    pub fn insert_adoption_process(&self, process_id: &str, pet_id: &str, adopter_id: &str) {
        self.tables.lock().adoptions.insert(
            process_id.to_string(),
            (pet_id.to_string(), adopter_id.to_string()),
        );
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn find_identity(&self, user_id: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self.tables.lock().users.get(user_id).map(Identity::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .tables
            .lock()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: &str,
    ) -> Result<UserRecord, StoreError> {
        let mut tables = self.tables.lock();
        if tables.users.values().any(|u| u.email == email) {
            return Err(StoreError::Conflict("Email"));
        }
        let now = Utc::now();
        let user = UserRecord {
            id: prefixed_ulid(prefix::USER),
            email: email.to_string(),
            name: name.map(str::to_string),
            password_hash: password_hash.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn find_pet_owner(&self, pet_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.tables.lock().pets.get(pet_id).cloned())
    }

    async fn find_adoption_parties(
        &self,
        process_id: &str,
    ) -> Result<Option<AdoptionParties>, StoreError> {
        let tables = self.tables.lock();
        let Some((pet_id, adopter_id)) = tables.adoptions.get(process_id) else {
            return Ok(None);
        };
        let tutor_id = tables
            .pets
            .get(pet_id)
            .ok_or(StoreError::MissingReference("pet"))?;
        Ok(Some(AdoptionParties {
            tutor_id: tutor_id.clone(),
            adopter_id: adopter_id.clone(),
        }))
    }

    async fn find_or_create_conversation(
        &self,
        tutor_id: &str,
        adopter_id: &str,
    ) -> Result<(Conversation, bool), StoreError> {
        let mut tables = self.tables.lock();

        let existing = tables
            .participants
            .iter()
            .find(|(_, ids)| ids.iter().any(|id| id == tutor_id) && ids.iter().any(|id| id == adopter_id))
            .map(|(id, _)| id.clone());
        if let Some(id) = existing {
            if let Some(conversation) = tables.conversation(&id) {
                return Ok((conversation, false));
            }
        }

        for user_id in [tutor_id, adopter_id] {
            if !tables.users.contains_key(user_id) {
                return Err(StoreError::MissingReference("user"));
            }
        }

        let now = Utc::now();
        let id = prefixed_ulid(prefix::CONVERSATION);
        tables.conversations.insert(
            id.clone(),
            ConversationRow {
                id: id.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        tables
            .participants
            .insert(id.clone(), vec![tutor_id.to_string(), adopter_id.to_string()]);

        let conversation = tables
            .conversation(&id)
            .ok_or_else(|| StoreError::Unavailable("conversation vanished".into()))?;
        Ok((conversation, true))
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<Message, StoreError> {
        let mut tables = self.tables.lock();
        let now = Utc::now();
        let row = tables
            .conversations
            .get_mut(conversation_id)
            .ok_or(StoreError::MissingReference("conversation"))?;
        row.updated_at = now;

        let message = Message {
            id: prefixed_ulid(prefix::MESSAGE),
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            created_at: now,
        };
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn is_participant(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .lock()
            .participants
            .get(conversation_id)
            .is_some_and(|ids| ids.iter().any(|id| id == user_id)))
    }

    async fn list_conversations(
        &self,
        user_id: &str,
        page: Page,
    ) -> Result<(i64, Vec<ConversationSummary>), StoreError> {
        let tables = self.tables.lock();

        let mut rows: Vec<&ConversationRow> = tables
            .participants
            .iter()
            .filter(|(_, ids)| ids.iter().any(|id| id == user_id))
            .filter_map(|(id, _)| tables.conversations.get(id))
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| b.id.cmp(&a.id)));

        let total = rows.len() as i64;
        let summaries = rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .map(|row| {
                let participants = tables
                    .participants
                    .get(&row.id)
                    .into_iter()
                    .flatten()
                    .filter_map(|id| tables.users.get(id))
                    .map(|user| ParticipantProfile {
                        user_id: user.id.clone(),
                        user: Identity::from(user),
                    })
                    .collect();
                let last_message = tables
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.conversation_id == row.id)
                    .cloned();
                ConversationSummary {
                    id: row.id.clone(),
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                    participants,
                    last_message,
                }
            })
            .collect();

        Ok((total, summaries))
    }

    async fn list_messages(
        &self,
        conversation_id: &str,
        page: Page,
        order: SortOrder,
    ) -> Result<(i64, Vec<Message>), StoreError> {
        let tables = self.tables.lock();
        let mut messages: Vec<&Message> = tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .collect();
        if order == SortOrder::Desc {
            messages.reverse();
        }

        let total = messages.len() as i64;
        let page = messages
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok((total, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn two_users(store: &MemoryStore) -> (String, String) {
        let tutor = store.create_user("tutor@example.com", Some("Tutor"), "h").await.unwrap();
        let adopter = store.create_user("adopter@example.com", None, "h").await.unwrap();
        (tutor.id, adopter.id)
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryStore::new();
        store.create_user("a@example.com", None, "h").await.unwrap();
        let err = store.create_user("a@example.com", None, "h").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict("Email")));
    }

    #[tokio::test]
    async fn user_lookups_by_id_and_email() {
        let store = MemoryStore::new();
        let user = store.create_user("me@example.com", Some("Me"), "h").await.unwrap();

        let identity = store.find_identity(&user.id).await.unwrap().unwrap();
        assert_eq!(identity, Identity::from(&user));
        assert!(store.find_identity("usr_missing").await.unwrap().is_none());

        let record = store.find_user_by_email("me@example.com").await.unwrap().unwrap();
        assert_eq!(record.password_hash, "h");
    }

    #[tokio::test]
    async fn find_or_create_reuses_existing_conversation() {
        let store = MemoryStore::new();
        let (tutor, adopter) = two_users(&store).await;

        let (first, created) = store.find_or_create_conversation(&tutor, &adopter).await.unwrap();
        assert!(created);
        assert_eq!(first.participants.len(), 2);

        // Order of the pair does not matter.
        let (second, created) = store.find_or_create_conversation(&adopter, &tutor).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn participation_is_per_pair() {
        let store = MemoryStore::new();
        let (tutor, adopter) = two_users(&store).await;
        let outsider = store.create_user("o@example.com", None, "h").await.unwrap();
        let (conversation, _) = store.find_or_create_conversation(&tutor, &adopter).await.unwrap();

        assert!(store.is_participant(&conversation.id, &tutor).await.unwrap());
        assert!(store.is_participant(&conversation.id, &adopter).await.unwrap());
        assert!(!store.is_participant(&conversation.id, &outsider.id).await.unwrap());
        assert!(!store.is_participant("conv_missing", &tutor).await.unwrap());
    }

    #[tokio::test]
    async fn messages_are_paged_in_requested_order() {
        let store = MemoryStore::new();
        let (tutor, adopter) = two_users(&store).await;
        let (conversation, _) = store.find_or_create_conversation(&tutor, &adopter).await.unwrap();

        for i in 0..5 {
            store
                .append_message(&conversation.id, &tutor, &format!("m{i}"))
                .await
                .unwrap();
        }

        let (total, asc) = store
            .list_messages(&conversation.id, Page::new(1, 2), SortOrder::Asc)
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(asc.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(), ["m0", "m1"]);

        let (_, desc) = store
            .list_messages(&conversation.id, Page::new(2, 2), SortOrder::Desc)
            .await
            .unwrap();
        assert_eq!(desc.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(), ["m2", "m1"]);
    }

    #[tokio::test]
    async fn append_to_unknown_conversation_fails() {
        let store = MemoryStore::new();
        let err = store.append_message("conv_nope", "usr_x", "hi").await.unwrap_err();
        assert!(matches!(err, StoreError::MissingReference("conversation")));
    }

    #[tokio::test]
    async fn inbox_includes_profiles_and_last_message() {
        let store = MemoryStore::new();
        let (tutor, adopter) = two_users(&store).await;
        let (conversation, _) = store.find_or_create_conversation(&tutor, &adopter).await.unwrap();
        store.append_message(&conversation.id, &adopter, "first").await.unwrap();
        store.append_message(&conversation.id, &tutor, "latest").await.unwrap();

        let (total, inbox) = store.list_conversations(&adopter, Page::new(1, 10)).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(inbox[0].participants.len(), 2);
        assert_eq!(inbox[0].participants[0].user.email, "tutor@example.com");
        assert_eq!(inbox[0].last_message.as_ref().unwrap().content, "latest");
    }

    #[tokio::test]
    async fn adoption_parties_resolve_through_pet_owner() {
        let store = MemoryStore::new();
        store.insert_pet("pet_1", "usr_tutor");
        store.insert_adoption_process("adp_1", "pet_1", "usr_adopter");

        let parties = store.find_adoption_parties("adp_1").await.unwrap().unwrap();
        assert_eq!(parties.tutor_id, "usr_tutor");
        assert_eq!(parties.adopter_id, "usr_adopter");
        assert!(store.find_adoption_parties("adp_2").await.unwrap().is_none());
    }
}
