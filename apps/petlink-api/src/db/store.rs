//! Persistence-facing operations the chat routes and the realtime gateway call into.

use async_trait::async_trait;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::models::conversation::{Conversation, ConversationSummary};
use crate::models::message::Message;
use crate::models::user::{Identity, UserRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique field (named here) is already taken.
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error("referenced {0} does not exist")]
    MissingReference(&'static str),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for StoreError {
    fn from(err: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// One-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    pub fn new(page: i64, limit: i64) -> Self {
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0) * self.limit
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Both sides of an adoption process: the pet's tutor and the applicant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdoptionParties {
    pub tutor_id: String,
    pub adopter_id: String,
}

/// Abstraction over the relational store backing accounts and chat.
///
/// Backed by PostgreSQL in production and an in-memory map in tests and
/// local development.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn find_identity(&self, user_id: &str) -> Result<Option<Identity>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: &str,
    ) -> Result<UserRecord, StoreError>;

    /// Owner (tutor) of a pet listing.
    async fn find_pet_owner(&self, pet_id: &str) -> Result<Option<String>, StoreError>;

    async fn find_adoption_parties(
        &self,
        process_id: &str,
    ) -> Result<Option<AdoptionParties>, StoreError>;

    /// Return the conversation shared by the two users, creating it when none
    /// exists. The flag is `true` when a new conversation was created.
    async fn find_or_create_conversation(
        &self,
        tutor_id: &str,
        adopter_id: &str,
    ) -> Result<(Conversation, bool), StoreError>;

    /// Record a message with a server-assigned id and timestamp and bump the
    /// conversation's `updated_at`.
    async fn append_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<Message, StoreError>;

    async fn is_participant(&self, conversation_id: &str, user_id: &str)
        -> Result<bool, StoreError>;

    /// Conversations the user takes part in, most recently active first.
    async fn list_conversations(
        &self,
        user_id: &str,
        page: Page,
    ) -> Result<(i64, Vec<ConversationSummary>), StoreError>;

    async fn list_messages(
        &self,
        conversation_id: &str,
        page: Page,
        order: SortOrder,
    ) -> Result<(i64, Vec<Message>), StoreError>;
}
