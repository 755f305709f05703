use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::BufRead;

/// A message as delivered by the platform push transport.
///
/// A message with no operation is the transport telling us the registration was
/// invalidated server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InboundPush {
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

impl InboundPush {
    pub fn message(operation: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            data: Some(data.into()),
        }
    }

    pub fn registration_invalidated() -> Self {
        Self::default()
    }
}

/// Receives push transport callbacks. Both methods must return without blocking.
pub trait PushMessageHandler: Send + Sync {
    fn handle_message(&self, operation: &str, data: &str);

    fn handle_delete(&self);

    /// Route a raw transport message to the right callback.
    fn route(&self, push: InboundPush) {
        match push.operation {
            Some(operation) => self.handle_message(&operation, push.data.as_deref().unwrap_or("")),
            None => self.handle_delete(),
        }
    }
}

/// Parse a JSON-lines push log. Blank lines are skipped.
pub fn read_push_log<R: BufRead>(reader: R) -> Result<Vec<InboundPush>> {
    let mut pushes = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading push log line {}", index + 1))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let push: InboundPush = serde_json::from_str(line)
            .with_context(|| format!("malformed push on line {}", index + 1))?;
        pushes.push(push);
    }
    Ok(pushes)
}
