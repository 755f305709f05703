use async_trait::async_trait;
use messenger_push::config::PushConfig;
use messenger_push::events::{EventBus, SkipReason};
use messenger_push::platform::{PlatformInfo, StartupState};
use messenger_push::shortcuts::{
    SchedulerState, ShortcutPublisher, ShortcutRefreshScheduler, ShortcutSet,
};
use messenger_push::store::commands::StoreCommand;
use messenger_push::store::traits::SyncStore;
use messenger_push::store::{AccountSession, Conversation, MemoryStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;

#[derive(Default)]
struct RecordingPublisher {
    max: usize,
    published: Mutex<Vec<Vec<i64>>>,
    fail: bool,
    panic: bool,
}

impl RecordingPublisher {
    fn with_max(max: usize) -> Self {
        Self {
            max,
            ..Default::default()
        }
    }

    fn published(&self) -> Vec<Vec<i64>> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShortcutPublisher for RecordingPublisher {
    fn max_shortcut_count(&self) -> usize {
        self.max
    }

    async fn publish_shortcuts(&self, set: &ShortcutSet) -> anyhow::Result<()> {
        if self.panic {
            panic!("launcher crashed");
        }
        if self.fail {
            anyhow::bail!("launcher refused shortcuts");
        }
        self.published.lock().unwrap().push(set.conversation_ids());
        Ok(())
    }
}

fn conversation(id: i64, timestamp: i64, pinned: bool, archived: bool) -> Conversation {
    Conversation {
        id,
        title: format!("Conversation {id}"),
        snippet: String::new(),
        timestamp,
        pinned,
        archived,
        read: true,
        muted: false,
    }
}

async fn store_with(conversations: Vec<Conversation>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::with_session(AccountSession {
        account_id: "account-1".to_string(),
        device_id: None,
        credentials: None,
    }));
    for c in conversations {
        store
            .execute(StoreCommand::UpsertConversation(c))
            .await
            .unwrap();
    }
    store
}

fn no_delay() -> PushConfig {
    PushConfig {
        shortcut_refresh_delay: Duration::ZERO,
        max_shortcuts: None,
    }
}

fn build_scheduler(
    store: Arc<MemoryStore>,
    publisher: Arc<RecordingPublisher>,
    events: Arc<EventBus>,
    platform: PlatformInfo,
    startup: StartupState,
    config: PushConfig,
) -> ShortcutRefreshScheduler {
    ShortcutRefreshScheduler::new(
        Handle::current(),
        store,
        publisher,
        events,
        platform,
        startup,
        config,
    )
}

#[tokio::test]
async fn first_start_publishes_nothing() {
    let store = store_with(vec![conversation(1, 10, true, false)]).await;
    let publisher = Arc::new(RecordingPublisher::with_max(5));
    let events = Arc::new(EventBus::new());
    let mut skipped = events.shortcut_refresh_skipped.subscribe();
    let scheduler = build_scheduler(
        store,
        publisher.clone(),
        events.clone(),
        PlatformInfo::new(30),
        StartupState { first_start: true },
        no_delay(),
    );

    assert!(scheduler.schedule_refresh().is_none());
    assert_eq!(skipped.recv().await.unwrap().reason, SkipReason::FirstStart);
    assert!(publisher.published().is_empty());
    assert_eq!(scheduler.state(), SchedulerState::Idle);
}

#[tokio::test]
async fn unsupported_and_headless_platforms_are_skipped() {
    let store = store_with(vec![conversation(1, 10, true, false)]).await;
    let publisher = Arc::new(RecordingPublisher::with_max(5));
    let events = Arc::new(EventBus::new());
    let mut skipped = events.shortcut_refresh_skipped.subscribe();

    for platform in [PlatformInfo::new(24), PlatformInfo::headless(30)] {
        let scheduler = build_scheduler(
            store.clone(),
            publisher.clone(),
            events.clone(),
            platform,
            StartupState::default(),
            no_delay(),
        );
        assert!(scheduler.schedule_refresh().is_none());
    }

    assert_eq!(
        skipped.recv().await.unwrap().reason,
        SkipReason::UnsupportedPlatform
    );
    assert_eq!(skipped.recv().await.unwrap().reason, SkipReason::Headless);
    assert!(publisher.published().is_empty());
}

#[tokio::test]
async fn pinned_conversations_are_preferred() {
    let store = store_with(vec![
        conversation(1, 100, false, false),
        conversation(2, 200, true, false),
        conversation(3, 300, true, false),
    ])
    .await;
    let publisher = Arc::new(RecordingPublisher::with_max(5));
    let events = Arc::new(EventBus::new());
    let scheduler = build_scheduler(
        store,
        publisher.clone(),
        events,
        PlatformInfo::new(30),
        StartupState::default(),
        no_delay(),
    );

    scheduler.schedule_refresh().unwrap().await.unwrap();

    assert_eq!(publisher.published(), vec![vec![3, 2]]);
}

#[tokio::test]
async fn falls_back_to_unarchived_in_order() {
    let store = store_with(vec![
        conversation(1, 300, false, false),
        conversation(2, 200, false, false),
        conversation(3, 100, false, false),
        conversation(4, 400, false, true),
    ])
    .await;
    let publisher = Arc::new(RecordingPublisher::with_max(5));
    let events = Arc::new(EventBus::new());
    let mut published = events.shortcuts_published.subscribe();
    let scheduler = build_scheduler(
        store,
        publisher.clone(),
        events.clone(),
        PlatformInfo::new(30),
        StartupState::default(),
        no_delay(),
    );

    scheduler.schedule_refresh().unwrap().await.unwrap();

    assert_eq!(publisher.published(), vec![vec![1, 2, 3]]);
    assert_eq!(published.recv().await.unwrap().conversation_ids, vec![1, 2, 3]);
    assert_eq!(scheduler.state(), SchedulerState::Idle);
}

#[tokio::test]
async fn published_set_is_capped() {
    let store = store_with((1..=8).map(|id| conversation(id, id * 10, false, false)).collect())
        .await;

    let publisher = Arc::new(RecordingPublisher::with_max(4));
    let scheduler_at_platform_max = build_scheduler(
        store.clone(),
        publisher.clone(),
        Arc::new(EventBus::new()),
        PlatformInfo::new(30),
        StartupState::default(),
        no_delay(),
    );
    scheduler_at_platform_max
        .schedule_refresh()
        .unwrap()
        .await
        .unwrap();
    assert_eq!(publisher.published(), vec![vec![8, 7, 6, 5]]);

    let publisher = Arc::new(RecordingPublisher::with_max(4));
    let scheduler_with_config_cap = build_scheduler(
        store,
        publisher.clone(),
        Arc::new(EventBus::new()),
        PlatformInfo::new(30),
        StartupState::default(),
        PushConfig {
            shortcut_refresh_delay: Duration::ZERO,
            max_shortcuts: Some(2),
        },
    );
    scheduler_with_config_cap
        .schedule_refresh()
        .unwrap()
        .await
        .unwrap();
    assert_eq!(publisher.published(), vec![vec![8, 7]]);
}

#[tokio::test]
async fn refresh_waits_for_the_delay() {
    let store = store_with(vec![conversation(1, 10, true, false)]).await;
    let publisher = Arc::new(RecordingPublisher::with_max(5));
    let events = Arc::new(EventBus::new());
    let mut skipped = events.shortcut_refresh_skipped.subscribe();
    let scheduler = build_scheduler(
        store,
        publisher.clone(),
        events.clone(),
        PlatformInfo::new(30),
        StartupState::default(),
        PushConfig {
            shortcut_refresh_delay: Duration::from_millis(200),
            max_shortcuts: None,
        },
    );

    let handle = scheduler.schedule_refresh().unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Waiting);
    assert!(publisher.published().is_empty());

    // Already waiting: a second call is refused.
    assert!(scheduler.schedule_refresh().is_none());
    assert_eq!(
        skipped.recv().await.unwrap().reason,
        SkipReason::AlreadyScheduled
    );

    handle.await.unwrap();
    assert_eq!(publisher.published(), vec![vec![1]]);
    assert_eq!(scheduler.state(), SchedulerState::Idle);

    // Back to idle, so the next start can refresh again.
    scheduler.schedule_refresh().unwrap().await.unwrap();
    assert_eq!(publisher.published().len(), 2);
}

#[tokio::test]
async fn publisher_errors_are_swallowed() {
    let store = store_with(vec![conversation(1, 10, true, false)]).await;
    let publisher = Arc::new(RecordingPublisher {
        max: 5,
        fail: true,
        ..Default::default()
    });
    let events = Arc::new(EventBus::new());
    let mut failed = events.shortcut_refresh_failed.subscribe();
    let scheduler = build_scheduler(
        store,
        publisher,
        events.clone(),
        PlatformInfo::new(30),
        StartupState::default(),
        no_delay(),
    );

    scheduler.schedule_refresh().unwrap().await.unwrap();

    assert!(failed.recv().await.unwrap().error.contains("refused"));
    assert_eq!(scheduler.state(), SchedulerState::Idle);
}

#[tokio::test]
async fn publisher_panic_is_contained() {
    let store = store_with(vec![conversation(1, 10, true, false)]).await;
    let publisher = Arc::new(RecordingPublisher {
        max: 5,
        panic: true,
        ..Default::default()
    });
    let events = Arc::new(EventBus::new());
    let mut failed = events.shortcut_refresh_failed.subscribe();
    let scheduler = build_scheduler(
        store,
        publisher,
        events.clone(),
        PlatformInfo::new(30),
        StartupState::default(),
        no_delay(),
    );

    // The scheduler's own task finishes normally.
    scheduler.schedule_refresh().unwrap().await.unwrap();

    assert!(failed.recv().await.unwrap().error.contains("aborted"));
    assert_eq!(scheduler.state(), SchedulerState::Idle);
}

#[tokio::test]
async fn unavailable_store_is_swallowed() {
    let store = store_with(vec![conversation(1, 10, true, false)]).await;
    store.set_available(false);
    let publisher = Arc::new(RecordingPublisher::with_max(5));
    let events = Arc::new(EventBus::new());
    let mut failed = events.shortcut_refresh_failed.subscribe();
    let scheduler = build_scheduler(
        store,
        publisher.clone(),
        events.clone(),
        PlatformInfo::new(30),
        StartupState::default(),
        no_delay(),
    );

    scheduler.schedule_refresh().unwrap().await.unwrap();

    assert!(failed.recv().await.unwrap().error.contains("unavailable"));
    assert!(publisher.published().is_empty());
}

#[test]
fn refresh_on_shut_down_runtime_returns_to_idle() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let shut_down = runtime.handle().clone();
    runtime.shutdown_background();

    let publisher = Arc::new(RecordingPublisher::with_max(5));
    let events = Arc::new(EventBus::new());
    let mut failed = events.shortcut_refresh_failed.subscribe();
    let mut skipped = events.shortcut_refresh_skipped.subscribe();
    let scheduler = ShortcutRefreshScheduler::new(
        shut_down,
        Arc::new(MemoryStore::new()),
        publisher.clone(),
        events.clone(),
        PlatformInfo::new(30),
        StartupState::default(),
        no_delay(),
    );

    for _ in 0..2 {
        assert!(scheduler.schedule_refresh().is_none());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(failed.try_recv().unwrap().error.contains("runtime shut down"));
    }
    assert!(skipped.try_recv().is_err());
    assert!(publisher.published().is_empty());
}
