//! CLI entry point for chatdock

use anyhow::{Context, Result};
use chatdock_core::config::{Config, ConfigLoader};
use chatdock_core::conversation::{next_turn, transcript_line};
use chatdock_core::history::{
    ChatSession, FileAttachment, FileStore, Message, SessionStore, StoreSettings,
};
use chatdock_core::logging::init_logging;
use chatdock_core::utils::{expand_tilde, relative_day_label};
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::Confirm;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "chatdock")]
#[command(about = "Chat session history for the dashboard chat widget")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new chat and make it active
    New,
    /// List saved chats, newest first
    List,
    /// Make a saved chat active
    Select {
        /// Chat id
        id: String,
    },
    /// Send a message in the active chat
    Send {
        /// Message text
        message: Option<String>,
        /// Attach a file (repeatable)
        #[arg(short, long = "attach")]
        attachments: Vec<PathBuf>,
    },
    /// Print a chat transcript (the active chat by default)
    Show {
        /// Chat id
        id: Option<String>,
    },
    /// Delete a chat
    Delete {
        /// Chat id
        id: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Interactive chat on stdin
    Chat,
    /// Show configuration and storage status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };
    let config = config_loader
        .load()
        .with_context(|| format!("loading {}", config_loader.config_path().display()))?;
    let _log_guard = init_logging(&config.logging);

    let mut store = open_store(&config).await;

    let outcome = match cli.command {
        Commands::New => run_new(&mut store),
        Commands::List => run_list(&store),
        Commands::Select { id } => run_select(&mut store, &id),
        Commands::Send {
            message,
            attachments,
        } => run_send(&mut store, &config, message.as_deref(), &attachments),
        Commands::Show { id } => run_show(&store, id.as_deref()),
        Commands::Delete { id, yes } => run_delete(&mut store, &id, yes),
        Commands::Chat => run_chat(&mut store, &config).await,
        Commands::Status => run_status(&store, &config, &config_loader),
    };

    if let Err(e) = store.shutdown().await {
        warn!("Chat history was not saved: {}", e);
    }
    outcome
}

async fn open_store(config: &Config) -> SessionStore {
    let dir = expand_tilde(&config.history.storage_dir);
    info!("Using chat history storage at {}", dir.display());
    let storage = Arc::new(FileStore::new(dir));
    SessionStore::open(storage, StoreSettings::from(&config.history)).await
}

fn run_new(store: &mut SessionStore) -> Result<()> {
    let id = store.create_session();
    println!("{} {}", style("Started new chat").green(), id);
    Ok(())
}

fn run_list(store: &SessionStore) -> Result<()> {
    if store.sessions().is_empty() {
        println!("No chat history yet");
        return Ok(());
    }

    let now = chrono::Utc::now();
    for session in store.sessions() {
        print_session_row(session, store.active_id(), now);
    }
    Ok(())
}

fn print_session_row(session: &ChatSession, active_id: &str, now: chrono::DateTime<chrono::Utc>) {
    let marker = if session.id == active_id { "*" } else { " " };
    println!(
        "{} {}  {}  {}",
        marker,
        style(&session.id).cyan(),
        style(relative_day_label(session.timestamp, now)).dim(),
        session.title
    );
    if !session.preview.is_empty() {
        println!("    {}", style(&session.preview).dim());
    }
}

fn run_select(store: &mut SessionStore, id: &str) -> Result<()> {
    store.require_session(id)?;
    store.select_session(id);
    println!("Switched to {}", style(id).cyan());
    Ok(())
}

fn run_send(
    store: &mut SessionStore,
    config: &Config,
    message: Option<&str>,
    attachment_paths: &[PathBuf],
) -> Result<()> {
    let attachments = attachment_paths
        .iter()
        .map(|path| describe_attachment(path))
        .collect::<Result<Vec<_>>>()?;

    let Some(messages) = next_turn(
        store.messages(),
        message.unwrap_or_default(),
        attachments,
        &config.history,
    ) else {
        println!("Nothing to send: provide a message or --attach a file");
        return Ok(());
    };

    store.append_messages(messages)?;
    print_last_turn(store.messages());
    Ok(())
}

fn print_last_turn(messages: &[Message]) {
    let start = messages.len().saturating_sub(2);
    for message in &messages[start..] {
        println!("{}", transcript_line(message));
    }
}

/// Reference a local file as an attachment; the file itself is not copied
fn describe_attachment(path: &Path) -> Result<FileAttachment> {
    let metadata =
        std::fs::metadata(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let mut attachment = FileAttachment::new(name, metadata.len(), mime_for(path));
    attachment.url = Some(path.display().to_string());
    Ok(attachment)
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("txt" | "log") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

fn run_show(store: &SessionStore, id: Option<&str>) -> Result<()> {
    let messages = match id {
        Some(id) => store.require_session(id)?.messages.as_slice(),
        None => store.messages(),
    };

    if messages.is_empty() {
        println!("(empty chat)");
    }
    for message in messages {
        println!("{}", transcript_line(message));
    }
    Ok(())
}

fn run_delete(store: &mut SessionStore, id: &str, yes: bool) -> Result<()> {
    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete chat {}?", id))
            .default(false)
            .interact()?;
        if !confirmed {
            return Ok(());
        }
    }

    if store.delete_session(id) {
        println!("Deleted {}", style(id).cyan());
    } else {
        println!("No saved chat with id {}", id);
    }
    Ok(())
}

async fn run_chat(store: &mut SessionStore, config: &Config) -> Result<()> {
    println!(
        "{} active chat {} (/new, /list, /select <id>, /quit)",
        style("chatdock").bold(),
        style(store.active_id()).cyan()
    );
    for message in store.messages() {
        println!("{}", transcript_line(message));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit" | "/exit", _) => break,
            ("/new", _) => run_new(store)?,
            ("/list", _) => run_list(store)?,
            ("/select", id) => {
                if let Err(e) = run_select(store, id.trim()) {
                    println!("{}", style(e).red());
                } else {
                    run_show(store, None)?;
                }
            }
            _ => run_send(store, config, Some(line), &[])?,
        }
    }
    Ok(())
}

fn run_status(store: &SessionStore, config: &Config, loader: &ConfigLoader) -> Result<()> {
    let status = serde_json::json!({
        "config_file": loader.config_path().display().to_string(),
        "storage_dir": expand_tilde(&config.history.storage_dir).display().to_string(),
        "durable": store.is_durable(),
        "sessions": store.sessions().len(),
        "active_id": store.active_id(),
        "active_saved": store.active_session().is_some(),
        "debounce_ms": config.history.debounce_ms,
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
