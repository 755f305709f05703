use crate::error::{ApplyError, DecodeError};
use crate::operation::{Operation, OperationPayload};
use crate::store::commands::{ConversationPatch, MessagePatch, StoreCommand};
use crate::store::traits::Backend;
use crate::store::{Conversation, Message};
use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Applies one push operation to durable state.
///
/// Called from a single dedicated worker, one payload at a time. Implementations own their
/// consistency; the caller adds no locking.
///
/// Contract:
/// - unknown operations succeed without touching state;
/// - a recognized operation with malformed data fails with [`ApplyError::Decode`].
#[async_trait]
pub trait SyncApplier: Send + Sync {
    async fn apply(&self, payload: &OperationPayload) -> Result<(), ApplyError>;
}

#[derive(Deserialize)]
struct IdPayload {
    id: i64,
}

#[derive(Deserialize)]
struct ConversationUpdatePayload {
    id: i64,
    #[serde(flatten)]
    patch: ConversationPatch,
}

#[derive(Deserialize)]
struct SnippetPayload {
    id: i64,
    snippet: String,
    timestamp: i64,
    #[serde(default)]
    read: Option<bool>,
}

#[derive(Deserialize)]
struct TitlePayload {
    id: i64,
    title: String,
}

#[derive(Deserialize)]
struct ArchivePayload {
    id: i64,
    archive: bool,
}

#[derive(Deserialize)]
struct MessageUpdatePayload {
    id: i64,
    #[serde(flatten)]
    patch: MessagePatch,
}

#[derive(Deserialize)]
struct MessageTypePayload {
    id: i64,
    message_type: i32,
}

#[derive(Deserialize)]
struct CleanupPayload {
    timestamp: i64,
}

#[derive(Deserialize)]
struct SettingPayload {
    pref: String,
    value: serde_json::Value,
}

fn decode<T: DeserializeOwned>(operation: &Operation, data: &[u8]) -> Result<T, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::Empty {
            operation: operation.as_str(),
        });
    }
    serde_json::from_slice(data).map_err(|source| DecodeError::Malformed {
        operation: operation.as_str(),
        source,
    })
}

/// Turn a recognized operation into the store mutation it stands for.
///
/// Returns `Ok(None)` for operations that carry no store command.
pub fn decode_command(payload: &OperationPayload) -> Result<Option<StoreCommand>, DecodeError> {
    let op = payload.operation();
    let data = payload.data().as_ref();

    let command = match op {
        Operation::AddedConversation => {
            StoreCommand::UpsertConversation(decode::<Conversation>(op, data)?)
        }
        Operation::UpdatedConversation => {
            let p: ConversationUpdatePayload = decode(op, data)?;
            StoreCommand::UpdateConversation {
                id: p.id,
                patch: p.patch,
            }
        }
        Operation::UpdateConversationSnippet => {
            let p: SnippetPayload = decode(op, data)?;
            StoreCommand::UpdateConversation {
                id: p.id,
                patch: ConversationPatch {
                    snippet: Some(p.snippet),
                    timestamp: Some(p.timestamp),
                    read: p.read,
                    ..Default::default()
                },
            }
        }
        Operation::UpdateConversationTitle => {
            let p: TitlePayload = decode(op, data)?;
            StoreCommand::UpdateConversation {
                id: p.id,
                patch: ConversationPatch {
                    title: Some(p.title),
                    ..Default::default()
                },
            }
        }
        Operation::RemovedConversation => {
            StoreCommand::RemoveConversation(decode::<IdPayload>(op, data)?.id)
        }
        Operation::ReadConversation => {
            let p: IdPayload = decode(op, data)?;
            StoreCommand::UpdateConversation {
                id: p.id,
                patch: ConversationPatch {
                    read: Some(true),
                    ..Default::default()
                },
            }
        }
        Operation::ArchiveConversation => {
            let p: ArchivePayload = decode(op, data)?;
            StoreCommand::UpdateConversation {
                id: p.id,
                patch: ConversationPatch {
                    archived: Some(p.archive),
                    ..Default::default()
                },
            }
        }
        Operation::AddedMessage => StoreCommand::InsertMessage(decode::<Message>(op, data)?),
        Operation::UpdatedMessage => {
            let p: MessageUpdatePayload = decode(op, data)?;
            StoreCommand::UpdateMessage {
                id: p.id,
                patch: p.patch,
            }
        }
        Operation::UpdateMessageType => {
            let p: MessageTypePayload = decode(op, data)?;
            StoreCommand::UpdateMessage {
                id: p.id,
                patch: MessagePatch {
                    message_type: Some(p.message_type),
                    ..Default::default()
                },
            }
        }
        Operation::RemovedMessage => StoreCommand::RemoveMessage(decode::<IdPayload>(op, data)?.id),
        Operation::CleanupMessages => StoreCommand::CleanupMessages {
            before: decode::<CleanupPayload>(op, data)?.timestamp,
        },
        Operation::UpdateSetting => {
            let p: SettingPayload = decode(op, data)?;
            StoreCommand::PutSetting {
                key: p.pref,
                value: p.value,
            }
        }
        Operation::CleanedAccount => StoreCommand::ClearData,
        Operation::RemovedAccount | Operation::Unknown(_) => return Ok(None),
    };
    Ok(Some(command))
}

/// [`SyncApplier`] backed by a [`Backend`].
pub struct StoreSyncApplier {
    backend: Arc<dyn Backend>,
}

impl StoreSyncApplier {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl SyncApplier for StoreSyncApplier {
    async fn apply(&self, payload: &OperationPayload) -> Result<(), ApplyError> {
        match payload.operation() {
            Operation::Unknown(raw) => {
                debug!(target: "Push/Applier", "Ignoring unsupported operation {raw:?}");
                return Ok(());
            }
            Operation::RemovedAccount => {
                let cleared = self.backend.clear_session().await?;
                info!(target: "Push/Applier", "Account removed remotely (cleared: {cleared})");
                return Ok(());
            }
            _ => {}
        }

        let Some(command) = decode_command(payload)? else {
            return Ok(());
        };
        let tag = command.tag();
        if self.backend.execute(command).await? {
            debug!(target: "Push/Applier", "Applied {} as {tag}", payload.operation());
        } else {
            debug!(
                target: "Push/Applier",
                "Session already cleared, dropped {}",
                payload.operation()
            );
        }
        Ok(())
    }
}
