use super::commands::StoreCommand;
use super::{AccountSession, Conversation};
use crate::error::StoreResult;
use async_trait::async_trait;

/// Read side used to build the shortcut set.
#[async_trait]
pub trait ConversationQuery: Send + Sync {
    /// Pinned conversations, most recent first.
    async fn get_pinned_conversations(&self) -> StoreResult<Vec<Conversation>>;
    /// Conversations that are not archived, pinned first and then most recent first.
    async fn get_unarchived_conversations(&self) -> StoreResult<Vec<Conversation>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn active_session(&self) -> StoreResult<Option<AccountSession>>;

    /// Drop the session, cached credentials and all synced data.
    ///
    /// Returns `false` when there was no session to clear. Calling it again is a no-op.
    async fn clear_session(&self) -> StoreResult<bool>;
}

#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Run one mutation while holding the session.
    ///
    /// Returns `Ok(false)` without touching anything when the session is already cleared,
    /// so a late apply can never bring back data of a reset account.
    async fn execute(&self, command: StoreCommand) -> StoreResult<bool>;
}

// Everything the push pipeline needs from durable state.
pub trait Backend: ConversationQuery + SessionStore + SyncStore {}

impl<T> Backend for T where T: ConversationQuery + SessionStore + SyncStore {}
