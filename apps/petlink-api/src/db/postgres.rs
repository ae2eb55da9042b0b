//! PostgreSQL-backed [`ChatStore`] built on diesel-async.

use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use petlink_common::id::{prefix, prefixed_ulid};
use scoped_futures::ScopedFutureExt;

use crate::db::pool::DbPool;
use crate::db::schema::{adoption_processes, conversation_participants, conversations, messages, pets, users};
use crate::db::store::{AdoptionParties, ChatStore, Page, SortOrder, StoreError};
use crate::models::conversation::{
    Conversation, ConversationRow, ConversationSummary, NewConversation, NewParticipant,
    ParticipantProfile,
};
use crate::models::message::{Message, NewMessage};
use crate::models::user::{Identity, NewUser, UserRecord};

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

async fn load_conversation(
    conn: &mut AsyncPgConnection,
    conversation_id: &str,
) -> Result<Conversation, StoreError> {
    let row: ConversationRow = conversations::table
        .find(conversation_id)
        .select(ConversationRow::as_select())
        .get_result(conn)
        .await?;

    let participant_ids: Vec<String> = conversation_participants::table
        .filter(conversation_participants::conversation_id.eq(conversation_id))
        .order(conversation_participants::joined_at.asc())
        .select(conversation_participants::user_id)
        .load(conn)
        .await?;

    Ok(Conversation::from_row(row, participant_ids))
}

/// Id of a conversation both users already take part in.
fn shared_conversation_query<'a>(
    tutor_id: &'a str,
    adopter_id: &'a str,
) -> conversation_participants::BoxedQuery<'a, Pg, Text> {
    let tutor_side = diesel::alias!(conversation_participants as tutor_side);
    let tutor_conversations = tutor_side
        .filter(tutor_side.field(conversation_participants::user_id).eq(tutor_id))
        .select(tutor_side.field(conversation_participants::conversation_id));

    conversation_participants::table
        .filter(conversation_participants::user_id.eq(adopter_id))
        .filter(conversation_participants::conversation_id.eq_any(tutor_conversations))
        .select(conversation_participants::conversation_id)
        .into_boxed()
}

fn map_unique_violation(err: diesel::result::Error, field: &'static str) -> StoreError {
    match err {
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        ) => StoreError::Conflict(field),
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::ForeignKeyViolation,
            _,
        ) => StoreError::MissingReference("user"),
        other => StoreError::Database(other),
    }
}

#[async_trait]
impl ChatStore for PgStore {
    async fn find_identity(&self, user_id: &str) -> Result<Option<Identity>, StoreError> {
        let mut conn = self.pool.get().await?;
        let identity = users::table
            .find(user_id)
            .select(Identity::as_select())
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(identity)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let mut conn = self.pool.get().await?;
        let user = users::table
            .filter(users::email.eq(email))
            .select(UserRecord::as_select())
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(user)
    }

    async fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: &str,
    ) -> Result<UserRecord, StoreError> {
        let mut conn = self.pool.get().await?;
        let id = prefixed_ulid(prefix::USER);
        let now = Utc::now();

        diesel::insert_into(users::table)
            .values(NewUser {
                id: &id,
                email,
                name,
                password_hash,
                created_at: now,
                updated_at: now,
            })
            .returning(UserRecord::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|e| map_unique_violation(e, "Email"))
    }

    async fn find_pet_owner(&self, pet_id: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.pool.get().await?;
        let owner = pets::table
            .find(pet_id)
            .select(pets::owner_id)
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(owner)
    }

    async fn find_adoption_parties(
        &self,
        process_id: &str,
    ) -> Result<Option<AdoptionParties>, StoreError> {
        let mut conn = self.pool.get().await?;
        let parties: Option<(String, String)> = adoption_processes::table
            .inner_join(pets::table)
            .filter(adoption_processes::id.eq(process_id))
            .select((pets::owner_id, adoption_processes::user_id))
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(parties.map(|(tutor_id, adopter_id)| AdoptionParties {
            tutor_id,
            adopter_id,
        }))
    }

    async fn find_or_create_conversation(
        &self,
        tutor_id: &str,
        adopter_id: &str,
    ) -> Result<(Conversation, bool), StoreError> {
        let mut conn = self.pool.get().await?;
        let tutor_id = tutor_id.to_string();
        let adopter_id = adopter_id.to_string();

        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let existing: Option<String> = shared_conversation_query(&tutor_id, &adopter_id)
                    .first(conn)
                    .await
                    .optional()?;

                if let Some(id) = existing {
                    let conversation = load_conversation(conn, &id).await?;
                    return Ok((conversation, false));
                }

                let id = prefixed_ulid(prefix::CONVERSATION);
                let now = Utc::now();

                diesel::insert_into(conversations::table)
                    .values(NewConversation {
                        id: &id,
                        created_at: now,
                        updated_at: now,
                    })
                    .execute(conn)
                    .await?;

                diesel::insert_into(conversation_participants::table)
                    .values(vec![
                        NewParticipant {
                            conversation_id: &id,
                            user_id: &tutor_id,
                            joined_at: now,
                        },
                        NewParticipant {
                            conversation_id: &id,
                            user_id: &adopter_id,
                            joined_at: now,
                        },
                    ])
                    .execute(conn)
                    .await
                    .map_err(|e| map_unique_violation(e, "Participant"))?;

                let conversation = load_conversation(conn, &id).await?;
                Ok((conversation, true))
            }
            .scope_boxed()
        })
        .await
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<Message, StoreError> {
        let mut conn = self.pool.get().await?;
        let conversation_id = conversation_id.to_string();
        let sender_id = sender_id.to_string();
        let content = content.to_string();

        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let id = prefixed_ulid(prefix::MESSAGE);
                let now = Utc::now();

                let touched = diesel::update(conversations::table.find(&conversation_id))
                    .set(conversations::updated_at.eq(now))
                    .execute(conn)
                    .await?;
                if touched == 0 {
                    return Err(StoreError::MissingReference("conversation"));
                }

                let message = diesel::insert_into(messages::table)
                    .values(NewMessage {
                        id: &id,
                        conversation_id: &conversation_id,
                        sender_id: &sender_id,
                        content: &content,
                        created_at: now,
                    })
                    .returning(Message::as_returning())
                    .get_result(conn)
                    .await?;

                Ok(message)
            }
            .scope_boxed()
        })
        .await
    }

    async fn is_participant(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;
        let found: Option<String> = conversation_participants::table
            .find((conversation_id, user_id))
            .select(conversation_participants::user_id)
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(found.is_some())
    }

    async fn list_conversations(
        &self,
        user_id: &str,
        page: Page,
    ) -> Result<(i64, Vec<ConversationSummary>), StoreError> {
        let mut conn = self.pool.get().await?;

        let total: i64 = conversation_participants::table
            .filter(conversation_participants::user_id.eq(user_id))
            .count()
            .get_result(&mut conn)
            .await?;

        let mine = conversation_participants::table
            .filter(conversation_participants::user_id.eq(user_id))
            .select(conversation_participants::conversation_id);

        let rows: Vec<ConversationRow> = conversations::table
            .filter(conversations::id.eq_any(mine))
            .order((conversations::updated_at.desc(), conversations::id.desc()))
            .offset(page.offset())
            .limit(page.limit)
            .select(ConversationRow::as_select())
            .load(&mut conn)
            .await?;

        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();

        let profiles: Vec<(String, Identity)> = conversation_participants::table
            .inner_join(users::table)
            .filter(conversation_participants::conversation_id.eq_any(&ids))
            .order(conversation_participants::joined_at.asc())
            .select((conversation_participants::conversation_id, Identity::as_select()))
            .load(&mut conn)
            .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let last_message: Option<Message> = messages::table
                .filter(messages::conversation_id.eq(&row.id))
                .order((messages::created_at.desc(), messages::id.desc()))
                .select(Message::as_select())
                .first(&mut conn)
                .await
                .optional()?;

            let participants = profiles
                .iter()
                .filter(|(conversation_id, _)| *conversation_id == row.id)
                .map(|(_, user)| ParticipantProfile {
                    user_id: user.id.clone(),
                    user: user.clone(),
                })
                .collect();

            summaries.push(ConversationSummary {
                id: row.id,
                created_at: row.created_at,
                updated_at: row.updated_at,
                participants,
                last_message,
            });
        }

        Ok((total, summaries))
    }

    async fn list_messages(
        &self,
        conversation_id: &str,
        page: Page,
        order: SortOrder,
    ) -> Result<(i64, Vec<Message>), StoreError> {
        let mut conn = self.pool.get().await?;

        let total: i64 = messages::table
            .filter(messages::conversation_id.eq(conversation_id))
            .count()
            .get_result(&mut conn)
            .await?;

        let mut query = messages::table
            .filter(messages::conversation_id.eq(conversation_id))
            .select(Message::as_select())
            .into_boxed();
        query = match order {
            SortOrder::Asc => query.order((messages::created_at.asc(), messages::id.asc())),
            SortOrder::Desc => query.order((messages::created_at.desc(), messages::id.desc())),
        };

        let data: Vec<Message> = query
            .offset(page.offset())
            .limit(page.limit)
            .load(&mut conn)
            .await?;

        Ok((total, data))
    }
}
