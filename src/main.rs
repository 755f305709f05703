use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use clap::Parser;
use log::{error, info};
use messenger_push::config::PushConfig;
use messenger_push::events::drain_pending;
use messenger_push::handler::read_push_log;
use messenger_push::platform::{PlatformInfo, StartupState};
use messenger_push::shortcuts::{ShortcutPublisher, ShortcutSet};
use messenger_push::store::{AccountSession, MemoryStore};
use messenger_push::{PushApp, PushMessageHandler};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// Replays a JSON-lines push log through the sync pipeline against an in-memory store.
//
// Usage:
//   cargo run -- --input pushes.jsonl
//   cat pushes.jsonl | cargo run -- --api-level 24
//   cargo run -- -i pushes.jsonl --first-start      # no shortcut refresh
//
// Each line is `{"operation": "...", "data": "..."}`; a line without an operation
// stands for the transport reporting an invalidated registration.

#[derive(Parser, Debug)]
#[command(name = "messenger-push", about = "Replay a push log through the sync pipeline")]
struct Args {
    /// Push log to replay; stdin when omitted.
    #[arg(short, long)]
    input: Option<PathBuf>,

    #[arg(long, default_value_t = 34)]
    api_level: u32,

    /// Behave like the very first launch after install.
    #[arg(long)]
    first_start: bool,

    #[arg(long)]
    headless: bool,

    #[arg(long, default_value_t = 0)]
    shortcut_delay_secs: u64,

    #[arg(long)]
    max_shortcuts: Option<usize>,

    /// Start without a signed-in account.
    #[arg(long)]
    signed_out: bool,
}

/// Stands in for the launcher: logs what would be published.
struct LogShortcutPublisher;

#[async_trait]
impl ShortcutPublisher for LogShortcutPublisher {
    fn max_shortcut_count(&self) -> usize {
        5
    }

    async fn publish_shortcuts(&self, set: &ShortcutSet) -> anyhow::Result<()> {
        for shortcut in set.shortcuts() {
            info!(target: "Launcher", "Shortcut {} -> {}", shortcut.id, shortcut.label);
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{:<5}] [{}] - {}",
                Local::now().format("%H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let pushes = match &args.input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("opening push log {}", path.display()))?;
            read_push_log(BufReader::new(file))?
        }
        None => read_push_log(std::io::stdin().lock())?,
    };
    info!("Loaded {} push(es)", pushes.len());

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    rt.block_on(async {
        let store = Arc::new(MemoryStore::new());
        if !args.signed_out {
            store
                .sign_in(AccountSession {
                    account_id: "local".to_string(),
                    device_id: None,
                    credentials: None,
                })
                .await;
        }

        let platform = PlatformInfo {
            api_level: args.api_level,
            headless: args.headless,
        };
        let config = PushConfig {
            shortcut_refresh_delay: Duration::from_secs(args.shortcut_delay_secs),
            max_shortcuts: args.max_shortcuts,
        };

        let app = PushApp::builder()
            .with_backend(store.clone())
            .with_shortcut_publisher(Arc::new(LogShortcutPublisher))
            .with_platform(platform)
            .with_startup_state(StartupState {
                first_start: args.first_start,
            })
            .with_config(config)
            .build()?;

        let mut failures = app.events().apply_failed.subscribe();

        for push in pushes {
            app.route(push);
        }
        app.shutdown().await;

        let (dropped, missed) = drain_pending(&mut failures);
        for failure in &dropped {
            error!("Push '{}' was dropped: {}", failure.operation, failure.error);
        }
        if missed > 0 {
            error!("{missed} more push(es) were dropped and not listed");
        }

        if let Some(refresh) = app.refresh_dynamic_shortcuts() {
            refresh.await.context("shortcut refresh task")?;
        }

        let conversations = store.conversations().await;
        println!("{}", serde_json::to_string_pretty(&conversations)?);
        Ok::<(), anyhow::Error>(())
    })
}
