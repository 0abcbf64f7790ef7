//! arena-chat – terminal front-end for the AI chat.
//!
//! Startup order:
//! 1. Parse CLI arguments and configuration from environment variables.
//! 2. Initialise tracing (file when `ARENA_LOG_DIR` is set, stderr otherwise).
//! 3. Open the transcript store lazily and seed the secure store.
//! 4. Run the requested command, or the interactive chat loop.

mod repl;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use arena_chat_core::{
    AuthGate, ChatConfig, ChatError, ChatSession, ChatStore, HttpInferenceClient,
    MemorySecretStore, TranscriptStore, TurnOutcome,
};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

#[derive(Debug, Parser)]
#[command(name = "arena-chat", version, about = "Chat with the arena assistant")]
struct Cli {
    /// API base URL (overrides ARENA_BASE_URL).
    #[arg(long)]
    base_url: Option<String>,

    /// Transcript database file (overrides ARENA_DATABASE_PATH).
    #[arg(long)]
    database: Option<PathBuf>,

    /// Bearer token; falls back to ARENA_TOKEN.
    #[arg(long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat (default).
    Chat,
    /// Send one message and print the reply.
    Send { text: String },
    /// Print the stored conversation.
    History,
    /// Erase the stored conversation.
    Clear,
    /// Delete the database file.
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cli = Cli::parse();
    let mut cfg = ChatConfig::from_env();
    if let Some(base_url) = cli.base_url {
        cfg.base_url = base_url;
    }
    if let Some(database) = cli.database {
        cfg.database_path = database;
    }

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let _log_guard = init_tracing(&cfg);
    info!(version = env!("CARGO_PKG_VERSION"), "arena-chat starting");

    // ── 3. Store and credentials ───────────────────────────────────────────────
    let store = Arc::new(TranscriptStore::new(cfg.database_path.clone()));
    let gate = AuthGate::new(Arc::new(MemorySecretStore::new()), cfg.credential_key.clone());
    if let Some(token) = cli.token.or_else(|| std::env::var("ARENA_TOKEN").ok()) {
        gate.sign_in(&token).context("failed to store credential")?;
    }

    // ── 4. Command ─────────────────────────────────────────────────────────────
    match cli.command.unwrap_or(Command::Chat) {
        Command::History => {
            for turn in store.load_all().await {
                println!("[{}] {}: {}", turn.id, turn.sender, turn.message);
            }
        }
        Command::Clear => {
            store.clear().await;
            println!("Chat history cleared.");
        }
        Command::Reset => {
            store.destroy().await;
            println!("Deleted {}", store.path().display());
        }
        Command::Send { text } => {
            let client = HttpInferenceClient::from_config(&cfg)?;
            let session = ChatSession::start(client, store, gate).await;
            match session.send_turn(&text).await {
                Ok(TurnOutcome::NothingToPersist) => {}
                Ok(_) => {
                    if let Some(reply) = session.transcript().last() {
                        println!("{}", reply.text);
                    }
                }
                Err(ChatError::Unauthenticated) => {
                    anyhow::bail!("not signed in: pass --token or set ARENA_TOKEN")
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Chat => {
            let client = HttpInferenceClient::from_config(&cfg)?;
            let session = ChatSession::start(client, store, gate).await;
            repl::run(&session).await?;
        }
    }

    info!("arena-chat stopped");
    Ok(())
}

/// Install the global subscriber. The returned guard flushes file logs on drop.
fn init_tracing(cfg: &ChatConfig) -> Option<WorkerGuard> {
    // Build the log-level filter, warning loudly if the configured value is
    // not a valid tracing filter expression.
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: ARENA_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    match cfg.log_dir.as_deref().and_then(file_appender) {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let subscriber = subscriber.with_writer(writer).with_ansi(false);
            if cfg.log_json {
                subscriber.json().init();
            } else {
                subscriber.init();
            }
            Some(guard)
        }
        None => {
            let subscriber = subscriber.with_writer(std::io::stderr);
            if cfg.log_json {
                subscriber.json().init();
            } else {
                subscriber.init();
            }
            None
        }
    }
}

/// Log file appender in `dir`, or `None` (with a warning) when the directory
/// or file cannot be created. Callers fall back to stderr.
fn file_appender(dir: &Path) -> Option<RollingFileAppender> {
    match RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix("arena-chat.log")
        .build(dir)
    {
        Ok(appender) => Some(appender),
        Err(e) => {
            eprintln!(
                "WARN: cannot log to {} ({e}); logging to stderr instead",
                dir.display()
            );
            None
        }
    }
}
