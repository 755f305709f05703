use crate::error::SchedulingError;
use crate::events::{EventBus, ResetCompleted, ResetFailed, SchedulingFailure};
use crate::platform::PlatformInfo;
use crate::store::traits::SessionStore;
use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, error, info, warn};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub const RESET_TASK: &str = "account_reset";

pub type GuaranteedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskHostKind {
    Foreground,
    Background,
}

/// Starts units of work that must not be lost when the host is about to be suspended.
#[async_trait]
pub trait GuaranteedTaskHost: Send + Sync {
    fn kind(&self) -> TaskHostKind;

    /// Start `task` without waiting for it.
    fn start(&self, name: &'static str, task: GuaranteedTask) -> Result<(), SchedulingError>;

    /// Wait for the tasks this host guarantees. Called before the process goes away.
    async fn drain(&self);

    /// Refuse new tasks from now on.
    fn close(&self);
}

/// Host for platforms that let work outlive backgrounding only as foreground work.
///
/// Every task is tracked until it finishes, and [`GuaranteedTaskHost::drain`] holds the
/// process until all of them are done.
pub struct ForegroundTaskHost {
    runtime: Handle,
    in_flight: Arc<DashMap<u64, &'static str>>,
    next_id: AtomicU64,
    idle: Arc<Notify>,
    closed: AtomicBool,
}

impl ForegroundTaskHost {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            in_flight: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
            idle: Arc::new(Notify::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

/// A task that is already finished without having started was dropped by a runtime that
/// is shutting down. The host stops accepting work from then on.
fn check_spawned(
    closed: &AtomicBool,
    name: &'static str,
    handle: &JoinHandle<()>,
    started: &AtomicBool,
) -> Result<(), SchedulingError> {
    if handle.is_finished() && !started.load(Ordering::SeqCst) {
        closed.store(true, Ordering::SeqCst);
        warn!(target: "Push/TaskHost", "Runtime dropped task '{name}' before it started");
        return Err(SchedulingError::Rejected(format!(
            "runtime shut down before '{name}' could start"
        )));
    }
    Ok(())
}

#[async_trait]
impl GuaranteedTaskHost for ForegroundTaskHost {
    fn kind(&self) -> TaskHostKind {
        TaskHostKind::Foreground
    }

    fn start(&self, name: &'static str, task: GuaranteedTask) -> Result<(), SchedulingError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SchedulingError::HostShutDown);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.in_flight.insert(id, name);
        debug!(target: "Push/TaskHost", "Starting foreground task '{name}' (#{id})");

        let in_flight = self.in_flight.clone();
        let idle = self.idle.clone();
        // Owned by the future, so it also fires on unwind and when the runtime drops the
        // task unpolled.
        let release = scopeguard::guard((), move |_| {
            in_flight.remove(&id);
            if in_flight.is_empty() {
                idle.notify_waiters();
            }
        });
        let started = Arc::new(AtomicBool::new(false));
        let started_in_task = started.clone();
        let handle = self.runtime.spawn(async move {
            let _release = release;
            started_in_task.store(true, Ordering::SeqCst);
            task.await;
        });
        check_spawned(&self.closed, name, &handle, &started)
    }

    async fn drain(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight.is_empty() {
                return;
            }
            notified.await;
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Plain background work for older platforms: spawned and not waited for.
pub struct BackgroundTaskHost {
    runtime: Handle,
    closed: AtomicBool,
}

impl BackgroundTaskHost {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl GuaranteedTaskHost for BackgroundTaskHost {
    fn kind(&self) -> TaskHostKind {
        TaskHostKind::Background
    }

    fn start(&self, name: &'static str, task: GuaranteedTask) -> Result<(), SchedulingError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SchedulingError::HostShutDown);
        }
        debug!(target: "Push/TaskHost", "Starting background task '{name}'");
        let started = Arc::new(AtomicBool::new(false));
        let started_in_task = started.clone();
        let handle = self.runtime.spawn(async move {
            started_in_task.store(true, Ordering::SeqCst);
            task.await;
        });
        check_spawned(&self.closed, name, &handle, &started)
    }

    /// Returns at once: background work is best effort and nothing is tracked to wait on.
    async fn drain(&self) {}

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Pick the task host once, from the probed platform capabilities.
pub fn select_task_host(platform: &PlatformInfo, runtime: Handle) -> Arc<dyn GuaranteedTaskHost> {
    if platform.supports_foreground_tasks() {
        Arc::new(ForegroundTaskHost::new(runtime))
    } else {
        Arc::new(BackgroundTaskHost::new(runtime))
    }
}

/// Reacts to the transport reporting that this client's registration was invalidated
/// server-side (account deleted, device unregistered).
///
/// Only wipes local state; it never re-authenticates or touches server data.
pub struct AccountResetHandler {
    host: Arc<dyn GuaranteedTaskHost>,
    sessions: Arc<dyn SessionStore>,
    events: Arc<EventBus>,
}

impl AccountResetHandler {
    pub fn new(
        host: Arc<dyn GuaranteedTaskHost>,
        sessions: Arc<dyn SessionStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            host,
            sessions,
            events,
        }
    }

    pub fn host(&self) -> &Arc<dyn GuaranteedTaskHost> {
        &self.host
    }

    /// Schedule the reset. Returns immediately; failures only reach the log and the
    /// event bus.
    pub fn handle_delete(&self) {
        let sessions = self.sessions.clone();
        let events = self.events.clone();
        let task: GuaranteedTask = Box::pin(async move {
            match sessions.clear_session().await {
                Ok(true) => {
                    info!(target: "Push/Reset", "Registration invalidated, local account cleared");
                    EventBus::emit(&events.reset_completed, ResetCompleted { cleared: true });
                }
                Ok(false) => {
                    debug!(target: "Push/Reset", "Registration invalidated, no active session");
                    EventBus::emit(&events.reset_completed, ResetCompleted { cleared: false });
                }
                Err(e) => {
                    error!(target: "Push/Reset", "Failed to clear local account: {e}");
                    EventBus::emit(
                        &events.reset_failed,
                        ResetFailed {
                            error: e.to_string(),
                        },
                    );
                }
            }
        });

        if let Err(e) = self.host.start(RESET_TASK, task) {
            error!(
                target: "Push/Reset",
                "Could not start {:?} reset task, deleted account data may remain: {e}",
                self.host.kind()
            );
            EventBus::emit(
                &self.events.scheduling_failure,
                SchedulingFailure {
                    task: RESET_TASK,
                    error: e.to_string(),
                },
            );
        }
    }
}
