use crate::applier::SyncApplier;
use crate::events::{ApplyCompleted, ApplyFailed, EventBus};
use crate::operation::OperationPayload;
use bytes::Bytes;
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::runtime::Handle;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Hands push payloads to a single serialized worker.
///
/// `dispatch` only enqueues, so it is safe to call from the transport's delivery callback.
/// The worker applies payloads strictly in submission order: `apply(A)` finishes before
/// `apply(B)` starts. A failed apply is logged, reported on the event bus and dropped; a
/// later full sync is expected to reconcile it.
pub struct PushDispatcher {
    sender: std::sync::Mutex<Option<mpsc::UnboundedSender<OperationPayload>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    pending: Arc<AtomicUsize>,
}

impl PushDispatcher {
    /// Start the worker on `runtime`.
    pub fn start(runtime: &Handle, applier: Arc<dyn SyncApplier>, events: Arc<EventBus>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<OperationPayload>();
        let pending = Arc::new(AtomicUsize::new(0));

        let worker_pending = pending.clone();
        let worker = runtime.spawn(async move {
            while let Some(payload) = rx.recv().await {
                worker_pending.fetch_sub(1, Ordering::SeqCst);
                match applier.apply(&payload).await {
                    Ok(()) => {
                        EventBus::emit(
                            &events.apply_completed,
                            ApplyCompleted {
                                operation: payload.raw_operation().to_string(),
                            },
                        );
                    }
                    Err(e) => {
                        warn!(
                            target: "Push/Dispatcher",
                            "Dropping push '{}' after failed apply: {e}",
                            payload.operation()
                        );
                        EventBus::emit(
                            &events.apply_failed,
                            ApplyFailed {
                                operation: payload.raw_operation().to_string(),
                                error: e.to_string(),
                            },
                        );
                    }
                }
            }
            info!(target: "Push/Dispatcher", "Push worker shutting down.");
        });

        Self {
            sender: std::sync::Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            pending,
        }
    }

    /// Queue one push for background apply. Never blocks.
    pub fn dispatch(&self, operation: &str, data: impl Into<Bytes>) {
        let payload = OperationPayload::new(operation, data);
        if operation.is_empty() {
            warn!(target: "Push/Dispatcher", "Push without operation, forwarding anyway");
        } else if !payload.operation().is_known() {
            debug!(target: "Push/Dispatcher", "Forwarding unrecognized operation {operation:?}");
        }
        self.submit(payload);
    }

    pub fn submit(&self, payload: OperationPayload) {
        let guard = match self.sender.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        let Some(sender) = guard.as_ref() else {
            warn!(
                target: "Push/Dispatcher",
                "Dispatcher shut down, dropping push '{}'",
                payload.operation()
            );
            return;
        };

        self.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::error::SendError(payload)) = sender.send(payload) {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            warn!(
                target: "Push/Dispatcher",
                "Push worker is gone, dropping push '{}'",
                payload.operation()
            );
        }
    }

    /// Payloads queued but not yet picked up by the worker.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Stop accepting pushes, let the worker finish what is already queued and wait for it.
    pub async fn shutdown(&self) {
        {
            let mut guard = match self.sender.lock() {
                Ok(g) => g,
                Err(poison) => poison.into_inner(),
            };
            guard.take();
        }

        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker
            && let Err(e) = worker.await
        {
            warn!(target: "Push/Dispatcher", "Push worker ended abnormally: {e}");
        }
    }
}
