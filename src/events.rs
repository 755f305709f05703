use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

// The size of the broadcast channel buffer.
const CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct ApplyCompleted {
    pub operation: String,
}

#[derive(Debug, Clone)]
pub struct ApplyFailed {
    pub operation: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct ResetCompleted {
    /// `false` when there was no active session to clear.
    pub cleared: bool,
}

#[derive(Debug, Clone)]
pub struct ResetFailed {
    pub error: String,
}

/// The guaranteed reset task could not be started. Local data of a deleted account may
/// still be on the device.
#[derive(Debug, Clone)]
pub struct SchedulingFailure {
    pub task: &'static str,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct ShortcutsPublished {
    pub conversation_ids: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Headless,
    UnsupportedPlatform,
    FirstStart,
    AlreadyScheduled,
}

#[derive(Debug, Clone)]
pub struct ShortcutRefreshSkipped {
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct ShortcutRefreshFailed {
    pub error: String,
}

// Macro to generate EventBus fields and constructor
macro_rules! define_event_bus {
    ($(($field:ident, $type:ty)),* $(,)?) => {
        /// Typed event bus with a broadcast channel per outcome type.
        ///
        /// Background work never returns errors to its caller; it reports here instead so
        /// failures stay observable.
        #[derive(Debug)]
        pub struct EventBus {
            $(
                pub $field: broadcast::Sender<$type>,
            )*
        }

        impl EventBus {
            pub fn new() -> Self {
                Self {
                    $(
                        $field: broadcast::channel(CHANNEL_CAPACITY).0,
                    )*
                }
            }
        }
    };
}

define_event_bus! {
    // Dispatcher
    (apply_completed, Arc<ApplyCompleted>),
    (apply_failed, Arc<ApplyFailed>),

    // Account reset
    (reset_completed, Arc<ResetCompleted>),
    (reset_failed, Arc<ResetFailed>),
    (scheduling_failure, Arc<SchedulingFailure>),

    // Shortcuts
    (shortcuts_published, Arc<ShortcutsPublished>),
    (shortcut_refresh_skipped, Arc<ShortcutRefreshSkipped>),
    (shortcut_refresh_failed, Arc<ShortcutRefreshFailed>),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Send without caring whether anyone is subscribed.
    pub(crate) fn emit<T>(sender: &broadcast::Sender<Arc<T>>, event: T) {
        let _ = sender.send(Arc::new(event));
    }
}

/// Take everything still buffered on `receiver` without waiting.
///
/// Returns the events read and how many were overwritten before they could be read.
pub fn drain_pending<T: Clone>(receiver: &mut broadcast::Receiver<T>) -> (Vec<T>, u64) {
    let mut events = Vec::new();
    let mut missed = 0;
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(n)) => missed += n,
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    (events, missed)
}
