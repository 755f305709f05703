use crate::config::PushConfig;
use crate::events::{
    EventBus, ShortcutRefreshFailed, ShortcutRefreshSkipped, ShortcutsPublished, SkipReason,
};
use crate::platform::{PlatformInfo, StartupState};
use crate::store::Conversation;
use crate::store::traits::ConversationQuery;
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Launcher entry that opens one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortcut {
    pub id: String,
    pub conversation_id: i64,
    pub label: String,
}

impl Shortcut {
    pub fn for_conversation(conversation: &Conversation) -> Self {
        Self {
            id: format!("conversation-{}", conversation.id),
            conversation_id: conversation.id,
            label: conversation.title.clone(),
        }
    }
}

/// Ordered shortcuts, published as a whole. Each publish replaces the previous set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShortcutSet {
    shortcuts: Vec<Shortcut>,
}

impl ShortcutSet {
    /// Keep the first `max` conversations, in order.
    pub fn build(conversations: &[Conversation], max: usize) -> Self {
        Self {
            shortcuts: conversations
                .iter()
                .take(max)
                .map(Shortcut::for_conversation)
                .collect(),
        }
    }

    pub fn shortcuts(&self) -> &[Shortcut] {
        &self.shortcuts
    }

    pub fn conversation_ids(&self) -> Vec<i64> {
        self.shortcuts.iter().map(|s| s.conversation_id).collect()
    }

    pub fn len(&self) -> usize {
        self.shortcuts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shortcuts.is_empty()
    }
}

/// OS shell that shows the shortcuts.
#[async_trait]
pub trait ShortcutPublisher: Send + Sync {
    /// Most shortcuts the platform will show.
    fn max_shortcut_count(&self) -> usize;

    /// Replace every published shortcut with `set`.
    async fn publish_shortcuts(&self, set: &ShortcutSet) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Waiting,
    Running,
}

impl SchedulerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => SchedulerState::Waiting,
            2 => SchedulerState::Running,
            _ => SchedulerState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SchedulerState::Idle => 0,
            SchedulerState::Waiting => 1,
            SchedulerState::Running => 2,
        }
    }
}

/// Rebuilds launcher shortcuts some time after startup.
///
/// The refresh waits [`PushConfig::shortcut_refresh_delay`] so it does not compete with
/// initial sync traffic, then publishes the pinned conversations, or the unarchived ones
/// when nothing is pinned. It is skipped on headless hosts, on platforms without shortcut
/// support and on the very first start. Failures are logged and never reach the caller.
pub struct ShortcutRefreshScheduler {
    runtime: Handle,
    conversations: Arc<dyn ConversationQuery>,
    publisher: Arc<dyn ShortcutPublisher>,
    events: Arc<EventBus>,
    platform: PlatformInfo,
    startup: StartupState,
    config: PushConfig,
    state: Arc<AtomicU8>,
}

impl ShortcutRefreshScheduler {
    pub fn new(
        runtime: Handle,
        conversations: Arc<dyn ConversationQuery>,
        publisher: Arc<dyn ShortcutPublisher>,
        events: Arc<EventBus>,
        platform: PlatformInfo,
        startup: StartupState,
        config: PushConfig,
    ) -> Self {
        Self {
            runtime,
            conversations,
            publisher,
            events,
            platform,
            startup,
            config,
            state: Arc::new(AtomicU8::new(SchedulerState::Idle.as_u8())),
        }
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn skip_reason(&self) -> Option<SkipReason> {
        if self.platform.headless {
            Some(SkipReason::Headless)
        } else if !self.platform.supports_shortcuts() {
            Some(SkipReason::UnsupportedPlatform)
        } else if self.startup.first_start {
            Some(SkipReason::FirstStart)
        } else {
            None
        }
    }

    fn skip(&self, reason: SkipReason) -> Option<JoinHandle<()>> {
        debug!(target: "Push/Shortcuts", "Skipping shortcut refresh: {reason:?}");
        EventBus::emit(
            &self.events.shortcut_refresh_skipped,
            ShortcutRefreshSkipped { reason },
        );
        None
    }

    /// Schedule one delayed refresh. Returns the background task, or `None` when a guard
    /// kept the scheduler idle or the runtime could no longer run the task.
    pub fn schedule_refresh(&self) -> Option<JoinHandle<()>> {
        if let Some(reason) = self.skip_reason() {
            return self.skip(reason);
        }
        if self
            .state
            .compare_exchange(
                SchedulerState::Idle.as_u8(),
                SchedulerState::Waiting.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return self.skip(SkipReason::AlreadyScheduled);
        }

        let delay = self.config.shortcut_refresh_delay;
        let cap = self.config.max_shortcuts;
        let conversations = self.conversations.clone();
        let publisher = self.publisher.clone();
        let events = self.events.clone();
        let state = self.state.clone();
        let runtime = self.runtime.clone();

        // Moved into the future, so a refresh the runtime drops unpolled still goes idle.
        let idle = scopeguard::guard(state.clone(), |state| {
            state.store(SchedulerState::Idle.as_u8(), Ordering::SeqCst);
        });
        let started = Arc::new(AtomicBool::new(false));
        let started_in_task = started.clone();

        let handle = self.runtime.spawn(async move {
            let _idle = idle;
            started_in_task.store(true, Ordering::SeqCst);

            debug!(target: "Push/Shortcuts", "Shortcut refresh in {delay:?}");
            tokio::time::sleep(delay).await;
            state.store(SchedulerState::Running.as_u8(), Ordering::SeqCst);

            // Separate task so a panic in a collaborator is contained here.
            let work = runtime.spawn(async move {
                refresh_shortcuts(conversations.as_ref(), publisher.as_ref(), cap).await
            });

            let error = match work.await {
                Ok(Ok(set)) => {
                    info!(
                        target: "Push/Shortcuts",
                        "Published {} shortcut(s)",
                        set.len()
                    );
                    EventBus::emit(
                        &events.shortcuts_published,
                        ShortcutsPublished {
                            conversation_ids: set.conversation_ids(),
                        },
                    );
                    return;
                }
                Ok(Err(e)) => e.to_string(),
                Err(join_error) => format!("refresh task aborted: {join_error}"),
            };
            warn!(target: "Push/Shortcuts", "Shortcut refresh failed: {error}");
            EventBus::emit(
                &events.shortcut_refresh_failed,
                ShortcutRefreshFailed { error },
            );
        });

        if handle.is_finished() && !started.load(Ordering::SeqCst) {
            let error = "runtime shut down before the refresh could start".to_string();
            warn!(target: "Push/Shortcuts", "Shortcut refresh failed: {error}");
            EventBus::emit(
                &self.events.shortcut_refresh_failed,
                ShortcutRefreshFailed { error },
            );
            return None;
        }
        Some(handle)
    }
}

async fn refresh_shortcuts(
    conversations: &dyn ConversationQuery,
    publisher: &dyn ShortcutPublisher,
    cap: Option<usize>,
) -> anyhow::Result<ShortcutSet> {
    let mut relevant = conversations.get_pinned_conversations().await?;
    if relevant.is_empty() {
        relevant = conversations.get_unarchived_conversations().await?;
    }

    let max = cap.map_or(publisher.max_shortcut_count(), |cap| {
        cap.min(publisher.max_shortcut_count())
    });
    let set = ShortcutSet::build(&relevant, max);
    publisher.publish_shortcuts(&set).await?;
    Ok(set)
}
