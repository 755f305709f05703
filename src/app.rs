use crate::applier::{StoreSyncApplier, SyncApplier};
use crate::config::PushConfig;
use crate::dispatcher::PushDispatcher;
use crate::events::EventBus;
use crate::handler::PushMessageHandler;
use crate::platform::{PlatformInfo, StartupState};
use crate::reset::{AccountResetHandler, GuaranteedTaskHost, select_task_host};
use crate::shortcuts::{SchedulerState, ShortcutPublisher, ShortcutRefreshScheduler};
use crate::store::traits::Backend;
use anyhow::{Result, anyhow};
use log::{debug, info};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// The push side of the messenger: routes transport callbacks to the dispatcher or the
/// reset handler and owns the post-startup shortcut refresh.
pub struct PushApp {
    dispatcher: PushDispatcher,
    reset: AccountResetHandler,
    shortcuts: ShortcutRefreshScheduler,
    events: Arc<EventBus>,
}

impl PushApp {
    pub fn builder() -> PushAppBuilder {
        PushAppBuilder::new()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn dispatcher(&self) -> &PushDispatcher {
        &self.dispatcher
    }

    pub fn reset_handler(&self) -> &AccountResetHandler {
        &self.reset
    }

    /// Call once after startup has completed.
    pub fn refresh_dynamic_shortcuts(&self) -> Option<JoinHandle<()>> {
        self.shortcuts.schedule_refresh()
    }

    pub fn shortcut_state(&self) -> SchedulerState {
        self.shortcuts.state()
    }

    /// Drain queued pushes and guaranteed tasks before the process goes away.
    pub async fn shutdown(&self) {
        debug!(target: "Push/App", "Shutting down push pipeline");
        self.dispatcher.shutdown().await;
        let host = self.reset.host();
        host.close();
        host.drain().await;
        info!(target: "Push/App", "Push pipeline stopped");
    }
}

impl PushMessageHandler for PushApp {
    fn handle_message(&self, operation: &str, data: &str) {
        self.dispatcher.dispatch(operation, data.to_owned());
    }

    fn handle_delete(&self) {
        self.reset.handle_delete();
    }
}

#[derive(Default)]
pub struct PushAppBuilder {
    backend: Option<Arc<dyn Backend>>,
    applier: Option<Arc<dyn SyncApplier>>,
    publisher: Option<Arc<dyn ShortcutPublisher>>,
    task_host: Option<Arc<dyn GuaranteedTaskHost>>,
    events: Option<Arc<EventBus>>,
    platform: Option<PlatformInfo>,
    startup: StartupState,
    config: PushConfig,
    runtime: Option<Handle>,
}

impl PushAppBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Durable state read by the shortcut refresh and cleared by the reset handler. Also
    /// the target of the default applier.
    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Replace the default [`StoreSyncApplier`].
    pub fn with_applier(mut self, applier: Arc<dyn SyncApplier>) -> Self {
        self.applier = Some(applier);
        self
    }

    pub fn with_shortcut_publisher(mut self, publisher: Arc<dyn ShortcutPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Replace the host picked from the platform capabilities.
    pub fn with_task_host(mut self, host: Arc<dyn GuaranteedTaskHost>) -> Self {
        self.task_host = Some(host);
        self
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_platform(mut self, platform: PlatformInfo) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_startup_state(mut self, startup: StartupState) -> Self {
        self.startup = startup;
        self
    }

    pub fn with_config(mut self, config: PushConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<PushApp> {
        let backend = self
            .backend
            .ok_or_else(|| anyhow!("A backend is required to build the push app"))?;
        let publisher = self
            .publisher
            .ok_or_else(|| anyhow!("A shortcut publisher is required to build the push app"))?;
        let platform = self
            .platform
            .ok_or_else(|| anyhow!("Platform capabilities must be probed before startup"))?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current()
                .map_err(|e| anyhow!("No tokio runtime to run the push pipeline on: {e}"))?,
        };

        let events = self.events.unwrap_or_default();
        let applier: Arc<dyn SyncApplier> = match self.applier {
            Some(applier) => applier,
            None => Arc::new(StoreSyncApplier::new(backend.clone())),
        };
        let task_host = self
            .task_host
            .unwrap_or_else(|| select_task_host(&platform, runtime.clone()));
        info!(
            target: "Push/App",
            "Starting push pipeline (api level {}, {:?} task host)",
            platform.api_level,
            task_host.kind()
        );

        let dispatcher = PushDispatcher::start(&runtime, applier, events.clone());
        let reset = AccountResetHandler::new(task_host, backend.clone(), events.clone());
        let shortcuts = ShortcutRefreshScheduler::new(
            runtime,
            backend,
            publisher,
            events.clone(),
            platform,
            self.startup,
            self.config,
        );

        Ok(PushApp {
            dispatcher,
            reset,
            shortcuts,
            events,
        })
    }
}
