use thiserror::Error;

/// A push payload could not be interpreted for an operation we recognize.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload for '{operation}' is empty")]
    Empty { operation: &'static str },
    #[error("malformed payload for '{operation}': {source}")]
    Malformed {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failure of a single push apply. Terminal: logged and dropped by the dispatcher.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("task host is shut down")]
    HostShutDown,
    #[error("task host rejected the task: {0}")]
    Rejected(String),
}
