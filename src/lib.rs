// Push-driven sync pipeline of the messenger client
pub mod app;
pub mod applier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod handler;
pub mod operation;
pub mod platform;
pub mod reset;
pub mod shortcuts;
pub mod store;

pub use app::{PushApp, PushAppBuilder};
pub use applier::{StoreSyncApplier, SyncApplier};
pub use dispatcher::PushDispatcher;
pub use handler::{InboundPush, PushMessageHandler};
pub use operation::{Operation, OperationPayload};
pub use reset::AccountResetHandler;
pub use shortcuts::ShortcutRefreshScheduler;
