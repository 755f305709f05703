use super::commands::{StoreCommand, SyncedData, apply_command};
use super::traits::{ConversationQuery, SessionStore, SyncStore};
use super::{AccountSession, Conversation, Message};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryState {
    session: Option<AccountSession>,
    data: SyncedData,
}

/// In-memory backend. The session and the data it owns sit behind one lock, so a reset and
/// an apply are serialized against each other.
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            available: AtomicBool::new(true),
        }
    }

    pub fn with_session(session: AccountSession) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                session: Some(session),
                data: SyncedData::default(),
            }),
            available: AtomicBool::new(true),
        }
    }

    pub async fn sign_in(&self, session: AccountSession) {
        self.state.write().await.session = Some(session);
    }

    /// Simulate the storage layer going away; every call fails with `Unavailable` until
    /// it is switched back on.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store switched off".to_string()))
        }
    }

    /// Every conversation, most recent first.
    pub async fn conversations(&self) -> Vec<Conversation> {
        let state = self.state.read().await;
        let mut all: Vec<Conversation> = state.data.conversations.values().cloned().collect();
        sort_by_recency(&mut all);
        all
    }

    pub async fn conversation(&self, id: i64) -> Option<Conversation> {
        self.state.read().await.data.conversations.get(&id).cloned()
    }

    /// Messages of a conversation, oldest first.
    pub async fn messages(&self, conversation_id: i64) -> Vec<Message> {
        let state = self.state.read().await;
        let mut messages: Vec<Message> = state
            .data
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| (m.timestamp, m.id));
        messages
    }

    pub async fn setting(&self, key: &str) -> Option<serde_json::Value> {
        self.state.read().await.data.settings.get(key).cloned()
    }
}

fn sort_by_recency(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl ConversationQuery for MemoryStore {
    async fn get_pinned_conversations(&self) -> StoreResult<Vec<Conversation>> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut pinned: Vec<Conversation> = state
            .data
            .conversations
            .values()
            .filter(|c| c.pinned)
            .cloned()
            .collect();
        sort_by_recency(&mut pinned);
        Ok(pinned)
    }

    async fn get_unarchived_conversations(&self) -> StoreResult<Vec<Conversation>> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut unarchived: Vec<Conversation> = state
            .data
            .conversations
            .values()
            .filter(|c| !c.archived)
            .cloned()
            .collect();
        sort_by_recency(&mut unarchived);
        // Stable sort keeps recency order inside each group.
        unarchived.sort_by_key(|c| !c.pinned);
        Ok(unarchived)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn active_session(&self) -> StoreResult<Option<AccountSession>> {
        self.check_available()?;
        Ok(self.state.read().await.session.clone())
    }

    async fn clear_session(&self) -> StoreResult<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let had_session = state.session.take().is_some();
        state.data.clear();
        if had_session {
            debug!(target: "Push/Store", "Session and synced data cleared");
        }
        Ok(had_session)
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn execute(&self, command: StoreCommand) -> StoreResult<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if state.session.is_none() {
            debug!(
                target: "Push/Store",
                "No active session, ignoring {}",
                command.tag()
            );
            return Ok(false);
        }
        apply_command(&mut state.data, command)?;
        Ok(true)
    }
}
