pub mod commands;
pub mod memory;
pub mod traits;

pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    /// Time of the latest message, in milliseconds since the epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub muted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    #[serde(default)]
    pub message_type: i32,
    #[serde(default)]
    pub data: String,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    pub timestamp: i64,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub seen: bool,
}

pub(crate) fn default_mime_type() -> String {
    "text/plain".to_string()
}

impl Message {
    pub fn is_text(&self) -> bool {
        self.mime_type == "text/plain"
    }
}

/// Signed-in state of this device. Absent once the account is reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSession {
    pub account_id: String,
    pub device_id: Option<i64>,
    /// Cached credentials used to talk to the backend.
    pub credentials: Option<String>,
}
