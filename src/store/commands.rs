use super::{Conversation, Message};
use crate::error::{StoreError, StoreResult};
use serde::Deserialize;
use std::collections::HashMap;

/// Partial update of a conversation; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConversationPatch {
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub timestamp: Option<i64>,
    pub pinned: Option<bool>,
    pub archived: Option<bool>,
    pub read: Option<bool>,
    pub muted: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessagePatch {
    pub message_type: Option<i32>,
    pub timestamp: Option<i64>,
    pub read: Option<bool>,
    pub seen: Option<bool>,
}

// Enum defining all mutations a push can make to synced data
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCommand {
    UpsertConversation(Conversation),
    UpdateConversation { id: i64, patch: ConversationPatch },
    RemoveConversation(i64),
    InsertMessage(Message),
    UpdateMessage { id: i64, patch: MessagePatch },
    RemoveMessage(i64),
    /// Delete every message older than the timestamp.
    CleanupMessages { before: i64 },
    PutSetting { key: String, value: serde_json::Value },
    /// Wipe synced data but keep the session.
    ClearData,
}

impl StoreCommand {
    /// Log-safe command tag (never includes message contents).
    pub fn tag(&self) -> &'static str {
        match self {
            StoreCommand::UpsertConversation(_) => "UpsertConversation",
            StoreCommand::UpdateConversation { .. } => "UpdateConversation",
            StoreCommand::RemoveConversation(_) => "RemoveConversation",
            StoreCommand::InsertMessage(_) => "InsertMessage",
            StoreCommand::UpdateMessage { .. } => "UpdateMessage",
            StoreCommand::RemoveMessage(_) => "RemoveMessage",
            StoreCommand::CleanupMessages { .. } => "CleanupMessages",
            StoreCommand::PutSetting { .. } => "PutSetting",
            StoreCommand::ClearData => "ClearData",
        }
    }
}

/// Conversations, messages and settings received through sync.
#[derive(Debug, Clone, Default)]
pub struct SyncedData {
    pub conversations: HashMap<i64, Conversation>,
    pub messages: HashMap<i64, Message>,
    pub settings: HashMap<String, serde_json::Value>,
}

impl SyncedData {
    pub fn clear(&mut self) {
        self.conversations.clear();
        self.messages.clear();
        self.settings.clear();
    }
}

// Apply the command to the data set.
// Intended to be called by a store while it holds the session.
pub fn apply_command(data: &mut SyncedData, command: StoreCommand) -> StoreResult<()> {
    match command {
        StoreCommand::UpsertConversation(conversation) => {
            data.conversations.insert(conversation.id, conversation);
        }
        StoreCommand::UpdateConversation { id, patch } => {
            let conversation = data
                .conversations
                .get_mut(&id)
                .ok_or(StoreError::NotFound {
                    kind: "conversation",
                    id,
                })?;
            apply_conversation_patch(conversation, patch);
        }
        StoreCommand::RemoveConversation(id) => {
            data.conversations.remove(&id);
            data.messages.retain(|_, m| m.conversation_id != id);
        }
        StoreCommand::InsertMessage(message) => {
            if let Some(conversation) = data.conversations.get_mut(&message.conversation_id)
                && message.timestamp >= conversation.timestamp
            {
                conversation.timestamp = message.timestamp;
                conversation.read = message.read;
                if message.is_text() {
                    conversation.snippet = message.data.clone();
                }
            }
            data.messages.insert(message.id, message);
        }
        StoreCommand::UpdateMessage { id, patch } => {
            let message = data
                .messages
                .get_mut(&id)
                .ok_or(StoreError::NotFound { kind: "message", id })?;
            if let Some(message_type) = patch.message_type {
                message.message_type = message_type;
            }
            if let Some(timestamp) = patch.timestamp {
                message.timestamp = timestamp;
            }
            if let Some(read) = patch.read {
                message.read = read;
            }
            if let Some(seen) = patch.seen {
                message.seen = seen;
            }
        }
        StoreCommand::RemoveMessage(id) => {
            data.messages.remove(&id);
        }
        StoreCommand::CleanupMessages { before } => {
            data.messages.retain(|_, m| m.timestamp >= before);
        }
        StoreCommand::PutSetting { key, value } => {
            data.settings.insert(key, value);
        }
        StoreCommand::ClearData => data.clear(),
    }
    Ok(())
}

fn apply_conversation_patch(conversation: &mut Conversation, patch: ConversationPatch) {
    if let Some(title) = patch.title {
        conversation.title = title;
    }
    if let Some(snippet) = patch.snippet {
        conversation.snippet = snippet;
    }
    if let Some(timestamp) = patch.timestamp {
        conversation.timestamp = timestamp;
    }
    if let Some(pinned) = patch.pinned {
        conversation.pinned = pinned;
    }
    if let Some(archived) = patch.archived {
        conversation.archived = archived;
    }
    if let Some(read) = patch.read {
        conversation.read = read;
    }
    if let Some(muted) = patch.muted {
        conversation.muted = muted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(id: i64, timestamp: i64) -> Conversation {
        Conversation {
            id,
            title: format!("Conversation {id}"),
            snippet: String::new(),
            timestamp,
            pinned: false,
            archived: false,
            read: true,
            muted: false,
        }
    }

    fn message(id: i64, conversation_id: i64, timestamp: i64) -> Message {
        Message {
            id,
            conversation_id,
            message_type: 0,
            data: format!("message {id}"),
            mime_type: "text/plain".to_string(),
            timestamp,
            read: false,
            seen: false,
        }
    }

    #[test]
    fn new_message_updates_conversation_snippet() {
        let mut data = SyncedData::default();
        apply_command(&mut data, StoreCommand::UpsertConversation(conversation(1, 100))).unwrap();
        apply_command(&mut data, StoreCommand::InsertMessage(message(10, 1, 200))).unwrap();

        let c = &data.conversations[&1];
        assert_eq!(c.snippet, "message 10");
        assert_eq!(c.timestamp, 200);
        assert!(!c.read);
    }

    #[test]
    fn older_message_leaves_snippet_alone() {
        let mut data = SyncedData::default();
        apply_command(&mut data, StoreCommand::UpsertConversation(conversation(1, 500))).unwrap();
        apply_command(&mut data, StoreCommand::InsertMessage(message(10, 1, 200))).unwrap();

        let c = &data.conversations[&1];
        assert_eq!(c.snippet, "");
        assert_eq!(c.timestamp, 500);
        assert!(data.messages.contains_key(&10));
    }

    #[test]
    fn removing_conversation_removes_its_messages() {
        let mut data = SyncedData::default();
        apply_command(&mut data, StoreCommand::UpsertConversation(conversation(1, 0))).unwrap();
        apply_command(&mut data, StoreCommand::UpsertConversation(conversation(2, 0))).unwrap();
        apply_command(&mut data, StoreCommand::InsertMessage(message(10, 1, 1))).unwrap();
        apply_command(&mut data, StoreCommand::InsertMessage(message(11, 2, 1))).unwrap();

        apply_command(&mut data, StoreCommand::RemoveConversation(1)).unwrap();

        assert!(!data.conversations.contains_key(&1));
        assert!(!data.messages.contains_key(&10));
        assert!(data.messages.contains_key(&11));
    }

    #[test]
    fn update_of_missing_conversation_is_not_found() {
        let mut data = SyncedData::default();
        let err = apply_command(
            &mut data,
            StoreCommand::UpdateConversation {
                id: 7,
                patch: ConversationPatch::default(),
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotFound {
                kind: "conversation",
                id: 7
            }
        ));
    }

    #[test]
    fn cleanup_keeps_recent_messages() {
        let mut data = SyncedData::default();
        apply_command(&mut data, StoreCommand::InsertMessage(message(1, 1, 100))).unwrap();
        apply_command(&mut data, StoreCommand::InsertMessage(message(2, 1, 300))).unwrap();

        apply_command(&mut data, StoreCommand::CleanupMessages { before: 200 }).unwrap();

        assert_eq!(data.messages.len(), 1);
        assert!(data.messages.contains_key(&2));
    }
}
