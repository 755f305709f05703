use bytes::Bytes;
use std::fmt;

/// Closed set of push operations the client understands.
///
/// Anything the backend sends that is not listed here becomes [`Operation::Unknown`] and is
/// applied as a no-op, so a newer backend never breaks an older client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    // Conversations
    AddedConversation,
    UpdatedConversation,
    UpdateConversationSnippet,
    UpdateConversationTitle,
    RemovedConversation,
    ReadConversation,
    ArchiveConversation,

    // Messages
    AddedMessage,
    UpdatedMessage,
    UpdateMessageType,
    RemovedMessage,
    CleanupMessages,

    // Settings
    UpdateSetting,

    // Account
    CleanedAccount,
    RemovedAccount,

    Unknown(String),
}

impl Operation {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "added_conversation" => Operation::AddedConversation,
            "updated_conversation" => Operation::UpdatedConversation,
            "update_conversation_snippet" => Operation::UpdateConversationSnippet,
            "update_conversation_title" => Operation::UpdateConversationTitle,
            "removed_conversation" => Operation::RemovedConversation,
            "read_conversation" => Operation::ReadConversation,
            "archive_conversation" => Operation::ArchiveConversation,
            "added_message" => Operation::AddedMessage,
            "updated_message" => Operation::UpdatedMessage,
            "update_message_type" => Operation::UpdateMessageType,
            "removed_message" => Operation::RemovedMessage,
            "cleanup_messages" => Operation::CleanupMessages,
            "update_setting" => Operation::UpdateSetting,
            "cleaned_account" => Operation::CleanedAccount,
            "removed_account" => Operation::RemovedAccount,
            other => Operation::Unknown(other.to_string()),
        }
    }

    /// Wire name of the operation. Unknown operations report a fixed tag; use
    /// [`OperationPayload::raw_operation`] for the original string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::AddedConversation => "added_conversation",
            Operation::UpdatedConversation => "updated_conversation",
            Operation::UpdateConversationSnippet => "update_conversation_snippet",
            Operation::UpdateConversationTitle => "update_conversation_title",
            Operation::RemovedConversation => "removed_conversation",
            Operation::ReadConversation => "read_conversation",
            Operation::ArchiveConversation => "archive_conversation",
            Operation::AddedMessage => "added_message",
            Operation::UpdatedMessage => "updated_message",
            Operation::UpdateMessageType => "update_message_type",
            Operation::RemovedMessage => "removed_message",
            Operation::CleanupMessages => "cleanup_messages",
            Operation::UpdateSetting => "update_setting",
            Operation::CleanedAccount => "cleaned_account",
            Operation::RemovedAccount => "removed_account",
            Operation::Unknown(_) => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Operation::Unknown(_))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Unknown(raw) => write!(f, "unknown({raw:?})"),
            known => f.write_str(known.as_str()),
        }
    }
}

/// One push event as received from the transport. Immutable once built.
#[derive(Debug, Clone)]
pub struct OperationPayload {
    operation: Operation,
    data: Bytes,
}

impl OperationPayload {
    pub fn new(operation: &str, data: impl Into<Bytes>) -> Self {
        Self {
            operation: Operation::parse(operation),
            data: data.into(),
        }
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn raw_operation(&self) -> &str {
        match &self.operation {
            Operation::Unknown(raw) => raw,
            known => known.as_str(),
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_operations() {
        assert_eq!(
            Operation::parse("added_message"),
            Operation::AddedMessage
        );
        assert_eq!(
            Operation::parse("archive_conversation"),
            Operation::ArchiveConversation
        );
        assert_eq!(Operation::parse("removed_account").as_str(), "removed_account");
    }

    #[test]
    fn unknown_operation_keeps_raw_string() {
        let payload = OperationPayload::new("added_sticker_pack", "{}");
        assert_eq!(
            payload.operation(),
            &Operation::Unknown("added_sticker_pack".to_string())
        );
        assert_eq!(payload.raw_operation(), "added_sticker_pack");
        assert!(!payload.operation().is_known());
    }

    #[test]
    fn empty_operation_is_unknown() {
        let payload = OperationPayload::new("", Bytes::new());
        assert!(!payload.operation().is_known());
        assert!(payload.data().is_empty());
        assert_eq!(payload.operation().to_string(), "unknown(\"\")");
    }
}
